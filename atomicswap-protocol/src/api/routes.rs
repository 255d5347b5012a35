//! Control-plane routes.
//!
//! - `POST /atomic-swaps` — initiate a swap
//! - `GET  /atomic-swaps/:id` — current swap record
//! - `POST /atomic-swaps/:id/lock` — adapter reports a confirmed lock
//! - `POST /atomic-swaps/:id/unlock` — adapter reports a confirmed unlock
//! - `POST /atomic-swaps/:id/lock-failure` — adapter reports a failed lock
//! - `POST /atomic-swaps/:id/unlock-failure` — adapter reports a failed unlock
//! - `POST /atomic-swaps/:id/abort` — operator abort (forces the expiry path)
//! - `GET  /identity/:identifier?chain=X` — resolve identifier to address

use crate::api::error::AppError;
use crate::api::state::AppState;
use crate::coordinator::InitiateRequest;
use crate::data_structures::{AssetSpec, SwapRecord, SwapState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/atomic-swaps", post(initiate_swap))
        .route("/atomic-swaps/:id", get(get_swap))
        .route("/atomic-swaps/:id/lock", post(report_lock))
        .route("/atomic-swaps/:id/unlock", post(report_unlock))
        .route("/atomic-swaps/:id/lock-failure", post(report_lock_failure))
        .route("/atomic-swaps/:id/unlock-failure", post(report_unlock_failure))
        .route("/atomic-swaps/:id/abort", post(abort_swap))
        .route("/identity/:identifier", get(resolve_identity))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateSwapRequest {
    pub initiator: String,
    pub responder: String,
    pub initiator_asset: AssetSpec,
    pub responder_asset: AssetSpec,
    /// Seconds until the swap expires; server default applies when omitted.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Client retry key; requests with the same key map to the same swap.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateSwapResponse {
    pub swap_id: String,
    pub state: SwapState,
    pub expires_at: DateTime<Utc>,
}

/// Body of the lock/unlock callbacks. The chain names which leg the
/// report is for; the adapter does not need to know leg roles.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofReport {
    pub chain: String,
    pub tx_ref: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub chain: String,
    pub reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AbortRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub swap_id: String,
    pub state: SwapState,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub chain: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub identifier: String,
    pub chain: String,
    pub address: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn initiate_swap(
    State(state): State<AppState>,
    Json(body): Json<InitiateSwapRequest>,
) -> Result<(StatusCode, Json<InitiateSwapResponse>), AppError> {
    let request = InitiateRequest {
        initiator: body.initiator,
        responder: body.responder,
        initiator_asset: body.initiator_asset,
        responder_asset: body.responder_asset,
        timeout: body.timeout_secs.map(Duration::from_secs),
        idempotency_key: body.idempotency_key,
    };
    let swap_id = state.coordinator.initiate(request)?;
    let record = state
        .coordinator
        .get_swap(&swap_id)
        .ok_or_else(|| AppError::Internal(format!("swap {} vanished after creation", swap_id)))?;
    Ok((
        StatusCode::CREATED,
        Json(InitiateSwapResponse {
            swap_id,
            state: record.state,
            expires_at: record.expires_at,
        }),
    ))
}

async fn get_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SwapRecord>, AppError> {
    state
        .coordinator
        .get_swap(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("swap '{}' not found", id)))
}

async fn report_lock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ProofReport>,
) -> Result<Json<ReportResponse>, AppError> {
    let leg = state.coordinator.leg_for_chain(&id, &body.chain)?;
    let new_state = state.coordinator.report_lock(&id, leg, body.tx_ref)?;
    Ok(Json(ReportResponse {
        swap_id: id,
        state: new_state,
    }))
}

async fn report_unlock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ProofReport>,
) -> Result<Json<ReportResponse>, AppError> {
    let leg = state.coordinator.leg_for_chain(&id, &body.chain)?;
    let new_state = state.coordinator.report_unlock(&id, leg, body.tx_ref)?;
    Ok(Json(ReportResponse {
        swap_id: id,
        state: new_state,
    }))
}

async fn report_lock_failure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FailureReport>,
) -> Result<Json<ReportResponse>, AppError> {
    let leg = state.coordinator.leg_for_chain(&id, &body.chain)?;
    let new_state = state
        .coordinator
        .report_lock_failure(&id, leg, &body.reason)?;
    Ok(Json(ReportResponse {
        swap_id: id,
        state: new_state,
    }))
}

async fn report_unlock_failure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FailureReport>,
) -> Result<Json<ReportResponse>, AppError> {
    let leg = state.coordinator.leg_for_chain(&id, &body.chain)?;
    let new_state = state
        .coordinator
        .report_unlock_failure(&id, leg, &body.reason)?;
    Ok(Json(ReportResponse {
        swap_id: id,
        state: new_state,
    }))
}

async fn abort_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AbortRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    let reason = body.reason.as_deref().unwrap_or("requested by operator");
    let new_state = state.coordinator.abort(&id, reason)?;
    Ok(Json(ReportResponse {
        swap_id: id,
        state: new_state,
    }))
}

async fn resolve_identity(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, AppError> {
    let address = state
        .coordinator
        .resolver()
        .resolve(&identifier, &query.chain)?;
    Ok(Json(ResolveResponse {
        identifier,
        chain: query.chain,
        address,
    }))
}
