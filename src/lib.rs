//! FlowGuard - Policy Enforcement Engine
//!
//! FlowGuard evaluates declarative policies against data records. A policy
//! is an ordered set of rules; each rule pairs a condition with a
//! remediation action and a severity. Enforcement classifies the record,
//! matches rules, resolves per-field conflicts, applies the winning
//! actions, and appends every decision to an immutable audit trail before
//! the call returns.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Engine                              │
//! │                                                            │
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────────────┐  │
//! │  │ Classifier │──▶│  Evaluator  │──▶│ Action Resolver  │  │
//! │  │ (findings) │   │ (conflicts) │   │ (transforms,     │  │
//! │  └────────────┘   └─────────────┘   │  delegation)     │  │
//! │        ▲                 ▲          └────────┬─────────┘  │
//! │        │                 │                   │            │
//! │   data record      ┌───────────┐      ┌───────────────┐   │
//! │                    │ Rule Store│      │ Audit Recorder│   │
//! │                    │ (snapshot)│      │ (fail-closed) │   │
//! │                    └───────────┘      └───────┬───────┘   │
//! └───────────────────────────────────────────────┼───────────┘
//!                                                 │ replay
//!                                        ┌────────▼─────────┐
//!                                        │ Compliance Scorer│
//!                                        └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Evaluation is deterministic: same policy set, same record, same
//!   decisions.
//! - Readers always see a complete policy snapshot; reload swaps the set
//!   atomically and a malformed document leaves the previous version in
//!   force.
//! - Every decision is durably audited before the call returns; if the
//!   audit write fails, the call fails.
//! - Raw records never reach the audit trail, only fingerprints.
//!
//! ## Modules
//!
//! - [`classifier`]: Rule-based content classification (PII categories)
//! - [`policy`]: Policy model, condition trees, loading, and the rule store
//! - [`engine`]: The evaluator and its decision types
//! - [`actions`]: Remediation action resolver and external delegation seams
//! - [`audit`]: Immutable, ordered audit trail
//! - [`compliance`]: Compliance scoring by replaying the audit trail
//! - [`server`]: HTTP API
//! - [`config`]: Configuration management

pub mod actions;
pub mod audit;
pub mod classifier;
pub mod compliance;
pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod record;
pub mod server;

pub use config::FlowGuardConfig;
pub use engine::{ActorContext, Engine, EnforcementOutcome};
pub use error::{Error, Result};
pub use record::Record;
