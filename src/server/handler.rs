//! HTTP handlers for the enforcement API
//!
//! - GET  /health
//! - GET  /api/v1/policies                 — list loaded policies
//! - GET  /api/v1/policies/:id             — one policy document
//! - POST /api/v1/enforce                  — evaluate a record
//! - POST /api/v1/policies/reload          — reload policy documents
//! - GET  /api/v1/audit?since=             — audit entries after a sequence
//! - GET  /api/v1/compliance/score         — compliance score (filterable)
//! - GET  /api/v1/compliance/dashboard     — dashboard rollup

use crate::audit::AuditEntry;
use crate::compliance::{ComplianceScore, ComplianceScorer, DashboardSummary, ScoreFilter};
use crate::engine::{ActorContext, Decision, Engine};
use crate::error::Error;
use crate::policy::{EnforcementMode, Policy};
use crate::record::Record;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state for the API handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Directory `POST /policies/reload` re-reads
    pub policies_dir: PathBuf,
}

/// Create the API router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/policies", get(list_policies))
        .route("/api/v1/policies/:id", get(get_policy))
        .route("/api/v1/policies/reload", post(reload_policies))
        .route("/api/v1/enforce", post(enforce))
        .route("/api/v1/audit", get(read_audit))
        .route("/api/v1/compliance/score", get(compliance_score))
        .route("/api/v1/compliance/dashboard", get(compliance_dashboard))
        .with_state(state)
}

// =============================================================================
// Request / Response types
// =============================================================================

/// JSON error body returned on all failure paths
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn response(err: Error) -> Response {
        let (status, label) = match &err {
            Error::PolicyNotFound(_) => (StatusCode::NOT_FOUND, "policy-not-found"),
            Error::InvalidRecord(_) => (StatusCode::BAD_REQUEST, "invalid-record"),
            Error::AuditWriteFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "audit-write-failed"),
            Error::Policy(_) | Error::Classifier(_) | Error::Config(_) => {
                (StatusCode::BAD_REQUEST, "invalid-request")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        (
            status,
            Json(ApiError {
                error: label.to_string(),
                message: err.to_string(),
            }),
        )
            .into_response()
    }

    fn bad_request(message: impl Into<String>) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: "invalid-request".to_string(),
                message: message.into(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    policies: usize,
    audit_entries: usize,
}

/// Summary of one loaded policy
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyInfo {
    id: String,
    name: String,
    frameworks: Vec<String>,
    enforcement_mode: EnforcementMode,
    rule_count: usize,
    active: bool,
}

impl From<&Policy> for PolicyInfo {
    fn from(p: &Policy) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            frameworks: p.frameworks.clone(),
            enforcement_mode: p.enforcement_mode,
            rule_count: p.rules.len(),
            active: p.active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnforceRequest {
    policy_id: String,
    record: serde_json::Value,
    caller_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnforceResponse {
    policy_id: String,
    mode: EnforcementMode,
    decisions: Vec<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transformed_record: Option<Record>,
    quarantined: bool,
    /// The caller must hold the operation (binding pre-decision result)
    blocked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReloadResponse {
    loaded: usize,
    policies: usize,
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    since: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditResponse {
    entries: Vec<AuditEntry>,
}

#[derive(Debug, Deserialize)]
struct ScoreQuery {
    framework: Option<String>,
    /// RFC 3339 timestamps
    since: Option<String>,
    until: Option<String>,
}

impl ScoreQuery {
    fn into_filter(self) -> std::result::Result<ScoreFilter, String> {
        let parse = |label: &str, value: Option<String>| {
            value
                .map(|v| {
                    chrono::DateTime::parse_from_rfc3339(&v)
                        .map(|t| t.with_timezone(&chrono::Utc))
                        .map_err(|e| format!("invalid {} timestamp: {}", label, e))
                })
                .transpose()
        };
        Ok(ScoreFilter {
            framework: self.framework,
            since: parse("since", self.since)?,
            until: parse("until", self.until)?,
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.engine.store().snapshot().await;
    Json(HealthResponse {
        status: "ok",
        policies: snapshot.len(),
        audit_entries: state.engine.recorder().len().await,
    })
}

async fn list_policies(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.engine.store().snapshot().await;
    let policies: Vec<PolicyInfo> = snapshot
        .all()
        .iter()
        .map(|c| PolicyInfo::from(&c.policy))
        .collect();
    Json(policies)
}

async fn get_policy(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let snapshot = state.engine.store().snapshot().await;
    match snapshot.get(&id) {
        Some(compiled) => Json(compiled.policy.clone()).into_response(),
        None => ApiError::response(Error::PolicyNotFound(id)),
    }
}

async fn enforce(
    State(state): State<AppState>,
    Json(request): Json<EnforceRequest>,
) -> Response {
    let record = match Record::from_value(request.record) {
        Ok(record) => record,
        Err(e) => return ApiError::response(e),
    };
    let actor = match request.caller_id {
        Some(caller_id) => ActorContext::new(caller_id),
        None => ActorContext::default(),
    };

    match state.engine.enforce(&request.policy_id, &record, actor).await {
        Ok(outcome) => {
            let blocked = outcome.blocks_caller();
            Json(EnforceResponse {
                policy_id: outcome.policy_id,
                mode: outcome.mode,
                decisions: outcome.decisions,
                transformed_record: outcome.transformed_record,
                quarantined: outcome.quarantined,
                blocked,
            })
            .into_response()
        }
        Err(e) => ApiError::response(e),
    }
}

async fn reload_policies(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = state.engine.store().reload_dir(&state.policies_dir).await;
    let policies = state.engine.store().snapshot().await.len();
    tracing::info!(loaded, policies, "policy reload complete");
    Json(ReloadResponse { loaded, policies })
}

async fn read_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    let entries = state
        .engine
        .recorder()
        .read_since(query.since.unwrap_or(0))
        .await;
    Json(AuditResponse { entries })
}

async fn compliance_score(
    State(state): State<AppState>,
    Query(query): Query<ScoreQuery>,
) -> Response {
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(message) => return ApiError::bad_request(message),
    };
    let scorer = ComplianceScorer::new(Arc::clone(state.engine.recorder()));
    let score: ComplianceScore = scorer.score(&filter).await;
    Json(score).into_response()
}

async fn compliance_dashboard(
    State(state): State<AppState>,
    Query(query): Query<ScoreQuery>,
) -> Response {
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(message) => return ApiError::bad_request(message),
    };
    let scorer = ComplianceScorer::new(Arc::clone(state.engine.recorder()));
    let dashboard: DashboardSummary = scorer.dashboard(&filter).await;
    Json(dashboard).into_response()
}
