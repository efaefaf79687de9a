// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! The HTTP control-plane daemon (spec §6): wires the provider registry,
//! fallback manager, executor, tool/skill registries, and receipt store
//! into an Axum router.

/// Request-id, request-logging, bearer-auth, rate-limiter, and CORS
/// middleware.
pub mod middleware;

use atlas_config::AtlasConfig;
use atlas_core::{IntentType, Receipt, ReceiptStatus, RiskLevel, RoutingProfile, ToolCallStatus};
use atlas_executor::Executor;
use atlas_receipt_store::ReceiptStore;
use atlas_registry::ProviderRegistry;
use atlas_skills::SkillRegistry;
use atlas_tools::ToolRegistry;
use axum::{
    Json, Router,
    extract::{Path as AxPath, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shared state handed to every route handler.
pub struct AppState {
    /// Loaded environment configuration.
    pub config: Arc<AtlasConfig>,
    /// Intent classification + skill dispatch.
    pub executor: Arc<Executor>,
    /// Registered tools, used directly by undo/resume handlers.
    pub tools: Arc<ToolRegistry>,
    /// Registered skills, surfaced by `/v1/skills`.
    pub skills: Arc<SkillRegistry>,
    /// Registered model providers, surfaced by `/v1/providers`.
    pub providers: Arc<ProviderRegistry>,
    /// Persistent receipt storage.
    pub receipts: Arc<ReceiptStore>,
    /// When this process started, for uptime reporting.
    pub started_at: DateTime<Utc>,
}

/// Structured API error, serialized as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Build an error with an explicit status code.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// 404 — resource not found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 400 — the request was malformed or invalid.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 500 — unexpected internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Build the Axum router with every daemon route, CORS, request-id,
/// request-logging, rate-limiting, and (on `/v1/*`) bearer-token auth.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = middleware::CorsConfig { allowed_origins: state.config.cors_origins.clone() }.to_cors_layer();
    let rate_limiter = middleware::RateLimiter::new(120, Duration::from_secs(60));

    let v1 = Router::new()
        .route("/execute", post(cmd_execute))
        .route("/receipts", get(cmd_list_receipts))
        .route("/receipts/{id}", get(cmd_get_receipt))
        .route("/receipts/{id}/undo", post(cmd_undo_receipt))
        .route("/receipts/{id}/resume", post(cmd_resume_receipt))
        .route("/providers", get(cmd_providers))
        .route("/skills", get(cmd_skills))
        .route("/tools", get(cmd_tools))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .route("/health", get(cmd_health))
        .route("/version", get(cmd_version))
        .route("/api/status", get(cmd_status))
        .nest("/v1", v1)
        .layer(cors)
        .layer(rate_limiter.into_layer())
        .layer(axum::middleware::from_fn(middleware::request_logger_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .with_state(state)
}

async fn cmd_health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "time": Utc::now().to_rfc3339() }))
}

#[derive(Serialize)]
struct VersionResponse {
    contract_version: &'static str,
    crate_version: &'static str,
}

async fn cmd_version() -> Json<VersionResponse> {
    Json(VersionResponse { contract_version: atlas_core::CONTRACT_VERSION, crate_version: env!("CARGO_PKG_VERSION") })
}

#[derive(Serialize)]
struct StatusResponse {
    app_name: String,
    debug: bool,
    uptime_seconds: u64,
    contract_version: &'static str,
    receipt_count: usize,
    provider_count: usize,
    skill_count: usize,
    tool_count: usize,
}

async fn cmd_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        app_name: state.config.app_name.clone(),
        debug: state.config.debug,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds().max(0) as u64,
        contract_version: atlas_core::CONTRACT_VERSION,
        receipt_count: state.receipts.count(None).await,
        provider_count: state.providers.list_providers().await.len(),
        skill_count: state.skills.list_skills().await.len(),
        tool_count: state.tools.list_tools().await.len(),
    })
}

/// Body of `POST /v1/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// The natural-language request to classify and execute.
    pub text: String,
    /// Which routing profile selects the model chain. Defaults to `Balanced`.
    #[serde(default)]
    pub profile: RoutingProfile,
    /// Optional caller-supplied profile id, recorded on the receipt.
    #[serde(default)]
    pub profile_id: Option<String>,
}

async fn cmd_execute(State(state): State<Arc<AppState>>, Json(req): Json<ExecuteRequest>) -> Result<Json<Receipt>, ApiError> {
    let receipt = state.executor.execute(req.text, req.profile, req.profile_id).await;
    state.receipts.create(receipt.clone()).await.map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(receipt))
}

/// Query parameters for `GET /v1/receipts`.
#[derive(Debug, Deserialize)]
pub struct ReceiptListQuery {
    /// Maximum number of receipts to return. Clamped to 1..=200, defaults to 50.
    pub limit: Option<usize>,
    /// Number of newest-first receipts to skip.
    pub offset: Option<usize>,
    /// Restrict to receipts with this status.
    pub status: Option<ReceiptStatus>,
}

#[derive(Serialize, Deserialize)]
struct ReceiptListResponse {
    receipts: Vec<Receipt>,
    total: usize,
}

async fn cmd_list_receipts(Query(q): Query<ReceiptListQuery>, State(state): State<Arc<AppState>>) -> Json<ReceiptListResponse> {
    let limit = q.limit.unwrap_or(50).clamp(1, 200);
    let offset = q.offset.unwrap_or(0);
    let receipts = state.receipts.list(limit, offset, q.status).await;
    let total = state.receipts.count(q.status).await;
    Json(ReceiptListResponse { receipts, total })
}

async fn cmd_get_receipt(AxPath(id): AxPath<Uuid>, State(state): State<Arc<AppState>>) -> Result<Json<Receipt>, ApiError> {
    state.receipts.get(id).await.map(Json).ok_or_else(|| ApiError::not_found(format!("receipt {id} not found")))
}

/// Recomputes overall receipt status from its tool calls, mirroring
/// `atlas_executor`'s post-dispatch finalization (spec §4.6): any
/// `PENDING_CONFIRM` call wins, else a mix of `OK`/`FAILED` is `PARTIAL`,
/// all-`OK` is `SUCCESS`, all-`FAILED` is `FAILED`.
fn finalize_tool_call_status(receipt: &mut Receipt) {
    let has_pending = receipt.tool_calls.iter().any(|tc| tc.status == ToolCallStatus::PendingConfirm);
    let has_failed = receipt.tool_calls.iter().any(|tc| tc.status == ToolCallStatus::Failed);
    let has_ok = receipt.tool_calls.iter().any(|tc| tc.status == ToolCallStatus::Ok);

    receipt.status = if has_pending {
        ReceiptStatus::PendingConfirm
    } else if has_failed {
        if has_ok { ReceiptStatus::Partial } else { ReceiptStatus::Failed }
    } else {
        ReceiptStatus::Success
    };
}

async fn cmd_undo_receipt(AxPath(id): AxPath<Uuid>, State(state): State<Arc<AppState>>) -> Result<Json<Receipt>, ApiError> {
    let original = state.receipts.get(id).await.ok_or_else(|| ApiError::not_found(format!("receipt {id} not found")))?;
    if original.undo.is_empty() {
        return Err(ApiError::invalid_request("receipt has no undo steps"));
    }

    let mut undo_receipt = Receipt::open(format!("undo of receipt {id}"), original.profile_id.clone());
    undo_receipt.source_receipt_id = Some(original.receipt_id);

    for step in original.undo.iter().rev() {
        let (call, result) = state.tools.execute(&step.tool_name, step.args.clone(), true).await;
        if let Some(result) = result.filter(|r| r.success) {
            undo_receipt.changes.extend(result.changes);
            undo_receipt.undo.extend(result.undo_steps);
        }
        undo_receipt.tool_calls.push(call);
    }

    finalize_tool_call_status(&mut undo_receipt);
    state.receipts.create(undo_receipt.clone()).await.map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(undo_receipt))
}

/// Body of `POST /v1/receipts/{id}/resume`.
#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    /// Indices into the receipt's `tool_calls` that the caller confirms
    /// should now run. Indices that are out of range or not currently
    /// `PENDING_CONFIRM` are ignored.
    pub approved_indices: Vec<usize>,
}

async fn cmd_resume_receipt(
    AxPath(id): AxPath<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let mut receipt = state.receipts.get(id).await.ok_or_else(|| ApiError::not_found(format!("receipt {id} not found")))?;

    for &idx in &req.approved_indices {
        let Some(call) = receipt.tool_calls.get(idx) else { continue };
        if call.status != ToolCallStatus::PendingConfirm {
            continue;
        }
        let tool_name = call.tool_name.clone();
        let args = call.args.clone();
        let (new_call, result) = state.tools.execute(&tool_name, args, true).await;
        if let Some(result) = result.filter(|r| r.success) {
            receipt.changes.extend(result.changes);
            receipt.undo.extend(result.undo_steps);
        }
        receipt.tool_calls[idx] = new_call;
    }

    finalize_tool_call_status(&mut receipt);
    state.receipts.update(receipt.clone()).await.map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(receipt))
}

#[derive(Serialize)]
struct ProviderStatusDto {
    registered: bool,
    status: String,
    last_check: Option<DateTime<Utc>>,
    latency_ms: Option<u64>,
    error: Option<String>,
}

async fn cmd_providers(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, ProviderStatusDto>> {
    let summary = state.providers.get_status_summary().await;
    let out = summary
        .into_iter()
        .map(|(name, s)| {
            (
                name,
                ProviderStatusDto {
                    registered: s.registered,
                    status: s.status.to_string(),
                    last_check: s.last_check,
                    latency_ms: s.latency_ms,
                    error: s.error,
                },
            )
        })
        .collect();
    Json(out)
}

#[derive(Serialize)]
struct SkillInfoDto {
    name: String,
    description: String,
    intent_types: Vec<IntentType>,
    risk_level: RiskLevel,
}

async fn cmd_skills(State(state): State<Arc<AppState>>) -> Json<Vec<SkillInfoDto>> {
    let infos = state.skills.get_skill_info().await;
    Json(
        infos
            .into_iter()
            .map(|i| SkillInfoDto { name: i.name, description: i.description, intent_types: i.intent_types, risk_level: i.risk_level })
            .collect(),
    )
}

#[derive(Serialize)]
struct ToolInfoDto {
    name: String,
    description: String,
    risk_level: RiskLevel,
    requires_confirmation: bool,
}

async fn cmd_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfoDto>> {
    let infos = state.tools.get_tool_info().await;
    Json(
        infos
            .into_iter()
            .map(|i| ToolInfoDto {
                name: i.name,
                description: i.description,
                risk_level: i.risk_level,
                requires_confirmation: i.requires_confirmation,
            })
            .collect(),
    )
}
