//! Policy model, condition trees, loading, and the rule store
//!
//! Policies are declarative documents (see `loader`) compiled once into an
//! indexed, immutable form (`store`) that the evaluator reads as atomic
//! snapshots.

pub mod condition;
pub mod loader;
pub mod store;
pub mod types;

pub use condition::{Condition, IndexKey};
pub use loader::{load_policy_file, parse_policy, validate_policy};
pub use store::{CompiledPolicy, PolicySet, PolicyStore};
pub use types::{Action, EnforcementMode, Policy, Rule};
