//! HTTP surface for the scoring and distribution operation groups.
//!
//! Every handler resolves a correlation id (the `x-correlation-id` request
//! header, or a fresh UUID) and threads it into the engine call. Failures are
//! mapped through `InterfaceError` so callers get a stable status code, an
//! error class and a user-safe message.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use leadflow_core::distribution::RouteDecision;
use leadflow_core::domain::distribution::{
    DistributionRule, DistributionRuleDraft, DistributionRuleId,
};
use leadflow_core::domain::lead::{AssigneeId, LeadId};
use leadflow_core::domain::scoring::{LeadScore, ScoringRule, ScoringRuleDraft, ScoringRuleId};
use leadflow_core::errors::{ApplicationError, InterfaceError};
use leadflow_core::scoring::DefaultScoringRule;
use leadflow_core::workload::WorkloadEntry;
use leadflow_engine::{
    AssignmentOutcome, BulkAssignReport, BulkCalculateRequest, BulkScoreReport,
    DistributionStats, RoutingEngine,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    engine: Arc<RoutingEngine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable class, e.g. `not_found` or `no_rules_configured`.
    pub error: String,
    pub message: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiRejection = (StatusCode, Json<ApiError>);
type ApiResult<T> = Result<Json<T>, ApiRejection>;

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct HotLeadsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub assignee_id: AssigneeId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkAssignRequest {
    pub lead_ids: Vec<LeadId>,
    pub assignee_id: AssigneeId,
}

pub fn router(engine: Arc<RoutingEngine>) -> Router {
    Router::new()
        .route("/scoring/rules", get(list_scoring_rules).post(create_scoring_rule))
        .route(
            "/scoring/rules/{id}",
            get(get_scoring_rule).put(update_scoring_rule).delete(delete_scoring_rule),
        )
        .route("/scoring/rules/{id}/toggle", post(toggle_scoring_rule))
        .route("/scoring/defaults", get(default_scoring_rules))
        .route("/scoring/leads/{lead_id}", get(get_lead_score).post(calculate_lead_score))
        .route("/scoring/bulk", post(bulk_calculate))
        .route("/scoring/hot", get(hot_leads))
        .route("/distribution/rules", get(list_distribution_rules).post(create_distribution_rule))
        .route(
            "/distribution/rules/{id}",
            get(get_distribution_rule)
                .put(update_distribution_rule)
                .delete(delete_distribution_rule),
        )
        .route("/distribution/rules/{id}/toggle", post(toggle_distribution_rule))
        .route("/distribution/leads/{lead_id}/assign", post(auto_assign))
        .route("/distribution/leads/{lead_id}/reassign", post(reassign))
        .route("/distribution/bulk-assign", post(bulk_assign))
        .route("/distribution/workload", get(workload))
        .route("/distribution/stats", get(stats))
        .with_state(ApiState { engine })
}

// Scoring

async fn list_scoring_rules(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Vec<ScoringRule>> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.scoring.get_rules().await, &correlation_id)
}

async fn create_scoring_rule(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(draft): Json<ScoringRuleDraft>,
) -> Result<(StatusCode, Json<ScoringRule>), ApiRejection> {
    let correlation_id = correlation_id(&headers);
    let rule = respond(state.engine.scoring.create_rule(draft).await, &correlation_id)?;
    Ok((StatusCode::CREATED, rule))
}

async fn get_scoring_rule(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<ScoringRule> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.scoring.get_rule(&ScoringRuleId(id)).await, &correlation_id)
}

async fn update_scoring_rule(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(draft): Json<ScoringRuleDraft>,
) -> ApiResult<ScoringRule> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.scoring.update_rule(&ScoringRuleId(id), draft).await, &correlation_id)
}

async fn delete_scoring_rule(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<DeleteResponse> {
    let correlation_id = correlation_id(&headers);
    let deleted = state.engine.scoring.delete_rule(&ScoringRuleId(id)).await;
    respond(deleted.map(|deleted| DeleteResponse { deleted }), &correlation_id)
}

async fn toggle_scoring_rule(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<ScoringRule> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.scoring.toggle_rule(&ScoringRuleId(id)).await, &correlation_id)
}

async fn default_scoring_rules(State(state): State<ApiState>) -> Json<Vec<DefaultScoringRule>> {
    Json(state.engine.scoring.default_rules())
}

async fn get_lead_score(
    Path(lead_id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<LeadScore> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.scoring.get_score(&LeadId(lead_id)).await, &correlation_id)
}

async fn calculate_lead_score(
    Path(lead_id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<LeadScore> {
    let correlation_id = correlation_id(&headers);
    let score = state.engine.scoring.calculate_score(&LeadId(lead_id), &correlation_id).await;
    respond(score, &correlation_id)
}

async fn bulk_calculate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<BulkCalculateRequest>,
) -> ApiResult<BulkScoreReport> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.scoring.bulk_calculate(request, &correlation_id).await, &correlation_id)
}

async fn hot_leads(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<HotLeadsQuery>,
) -> ApiResult<Vec<LeadScore>> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.scoring.get_hot_leads(query.limit).await, &correlation_id)
}

// Distribution

async fn list_distribution_rules(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Vec<DistributionRule>> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.distribution.get_rules().await, &correlation_id)
}

async fn create_distribution_rule(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(draft): Json<DistributionRuleDraft>,
) -> Result<(StatusCode, Json<DistributionRule>), ApiRejection> {
    let correlation_id = correlation_id(&headers);
    let rule = respond(state.engine.distribution.create_rule(draft).await, &correlation_id)?;
    Ok((StatusCode::CREATED, rule))
}

async fn get_distribution_rule(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<DistributionRule> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.distribution.get_rule(&DistributionRuleId(id)).await, &correlation_id)
}

async fn update_distribution_rule(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(draft): Json<DistributionRuleDraft>,
) -> ApiResult<DistributionRule> {
    let correlation_id = correlation_id(&headers);
    let rule = state.engine.distribution.update_rule(&DistributionRuleId(id), draft).await;
    respond(rule, &correlation_id)
}

async fn delete_distribution_rule(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<DeleteResponse> {
    let correlation_id = correlation_id(&headers);
    let deleted = state.engine.distribution.delete_rule(&DistributionRuleId(id)).await;
    respond(deleted.map(|deleted| DeleteResponse { deleted }), &correlation_id)
}

async fn toggle_distribution_rule(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<DistributionRule> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.distribution.toggle_rule(&DistributionRuleId(id)).await, &correlation_id)
}

async fn auto_assign(
    Path(lead_id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<RouteDecision> {
    let correlation_id = correlation_id(&headers);
    let decision = state.engine.distribution.auto_assign(&LeadId(lead_id), &correlation_id).await;
    respond(decision, &correlation_id)
}

async fn reassign(
    Path(lead_id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<ReassignRequest>,
) -> ApiResult<AssignmentOutcome> {
    let correlation_id = correlation_id(&headers);
    let outcome = state
        .engine
        .distribution
        .reassign(&LeadId(lead_id), request.assignee_id, request.reason, &correlation_id)
        .await;
    respond(outcome, &correlation_id)
}

async fn bulk_assign(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<BulkAssignRequest>,
) -> ApiResult<BulkAssignReport> {
    let correlation_id = correlation_id(&headers);
    let report = state
        .engine
        .distribution
        .bulk_assign(request.lead_ids, request.assignee_id, &correlation_id)
        .await;
    respond(report, &correlation_id)
}

async fn workload(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Vec<WorkloadEntry>> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.distribution.get_workload().await, &correlation_id)
}

async fn stats(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<DistributionStats> {
    let correlation_id = correlation_id(&headers);
    respond(state.engine.distribution.get_stats().await, &correlation_id)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn respond<T>(result: Result<T, ApplicationError>, correlation_id: &str) -> ApiResult<T> {
    result.map(Json).map_err(|error| reject(error, correlation_id))
}

fn reject(error: ApplicationError, correlation_id: &str) -> ApiRejection {
    let class = error.class();
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(
            event_name = "api.request_failed",
            correlation_id = %correlation_id,
            error_class = class,
            error = %interface,
            "request failed"
        );
    } else {
        info!(
            event_name = "api.request_rejected",
            correlation_id = %correlation_id,
            error_class = class,
            error = %interface,
            "request rejected"
        );
    }

    (
        status,
        Json(ApiError {
            error: class.to_string(),
            message: interface.user_message().to_string(),
            detail: interface.to_string(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}
