//! REST API handlers
//!
//! `POST /api/analyze-python` runs one CV through the processing chain;
//! `GET /api/health` reports pool occupancy.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde_json::json;
use shared::{process_debug, process_error, process_info, process_warn, OptimizationResult, ProcessId, API_VERSION};
use std::time::Instant;

use crate::core::{choose_route, resolve_tier, validate, Route, ValidatedRequest};
use crate::error::{ApiError, MSG_INVALID_BODY, MSG_METHOD_NOT_ALLOWED};
use crate::state::AppState;
use crate::types::{AnalyzeRequest, ErrorEnvelope, ErrorMetadata, HealthResponse, SuccessEnvelope, UserAccount};

pub async fn analyze_cv(State(state): State<AppState>, payload: Result<Json<AnalyzeRequest>, JsonRejection>) -> Response {
    let started = Instant::now();
    match process(&state, payload, started).await {
        Ok(result) => (StatusCode::OK, Json(SuccessEnvelope::new(result))).into_response(),
        Err(err) => error_response(&state, &err, started),
    }
}

async fn process(
    state: &AppState,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
    started: Instant,
) -> Result<OptimizationResult, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        process_debug!(ProcessId::current(), "Rejected request body: {}", rejection.body_text());
        ApiError::validation(MSG_INVALID_BODY)
    })?;
    let ValidatedRequest { job, requested_tier } = validate(request, state.config.max_cv_length)?;

    let account = find_account(state, &job.email).await;
    let tier = resolve_tier(requested_tier, account.as_ref());
    let job = job.with_plan(tier);
    let route = choose_route(&state.config, tier);

    process_info!(
        ProcessId::current(),
        "📄 Processing CV for {} ({} plan, {} chars, {:?})",
        job.email,
        tier,
        job.current_cv.chars().count(),
        route
    );

    let outcome = match route {
        Route::FullChain => state.orchestrator.optimize(&job, tier, &job.template).await,
        Route::RemoteOnly => state.orchestrator.optimize_remote(&job, tier, &job.template).await,
    };
    let mut result = outcome?;

    if let Some(account) = &account {
        record_usage(state, account).await;
    }

    let metadata = &mut result.metadata;
    metadata.total_processing_time = Some(elapsed_ms(started));
    metadata.api_version = Some(API_VERSION.to_string());
    metadata.timestamp = Some(Utc::now());
    metadata.python_enabled = Some(state.config.enable_python_processing);
    if let Some(account) = &account {
        metadata.user_plan = account.plan.clone();
        metadata.remaining_uses = account.remaining_after_use();
    }

    Ok(result)
}

async fn find_account(state: &AppState, email: &str) -> Option<UserAccount> {
    let ledger = state.ledger.as_ref()?;
    match ledger.find_account(email).await {
        Ok(account) => account,
        Err(err) => {
            process_warn!(ProcessId::current(), "⚠️ Usage ledger lookup failed: {}", err);
            None
        }
    }
}

async fn record_usage(state: &AppState, account: &UserAccount) {
    let Some(ledger) = state.ledger.as_ref() else {
        return;
    };
    if let Err(err) = ledger.record_usage(account).await {
        process_warn!(ProcessId::current(), "⚠️ Usage ledger update failed: {}", err);
    }
}

fn error_response(state: &AppState, err: &ApiError, started: Instant) -> Response {
    match err {
        ApiError::Validation(message) => {
            process_debug!(ProcessId::current(), "Validation failed: {}", message);
        }
        other => {
            process_error!(ProcessId::current(), "❌ CV processing failed: {}", other);
        }
    }

    let details = if state.config.production {
        None
    } else {
        err.detail().map(str::to_string)
    };
    let body = ErrorEnvelope {
        success: false,
        error: err.message().to_string(),
        details,
        metadata: ErrorMetadata {
            processing_time: elapsed_ms(started),
            timestamp: Utc::now(),
            error_type: err.kind().to_string(),
        },
    };
    (err.status(), Json(body)).into_response()
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: API_VERSION.to_string(),
        python_enabled: state.config.enable_python_processing,
        uptime_seconds: state.uptime_seconds(),
        pool: state.orchestrator.pool().stats(),
    })
}

/// Bare `OPTIONS` without CORS preflight headers
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "success": false, "error": MSG_METHOD_NOT_ALLOWED })),
    )
        .into_response()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
