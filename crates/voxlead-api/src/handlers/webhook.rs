//! Webhook ingestion handler.
//!
//! The HTTP entry point for call-completed notifications. Glues the
//! signature verifier, payload normalizer and pipeline together and maps
//! the outcome to the acknowledgment contract: `{success, ...}` with a
//! processing time on success, an error string otherwise. Any exception
//! escaping the pipeline is captured here and reported as a failed
//! acknowledgment rather than a server crash.

use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use voxlead_ingest::{IngestError, MAX_PAYLOAD_SIZE};

use crate::AppState;

/// Header carrying the provider's `t=...,v0=...` signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Acknowledgment for a processed notification.
#[derive(Debug, Serialize)]
pub struct SuccessAck {
    /// Always true.
    pub success: bool,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Acknowledgment for a rejected or failed notification.
#[derive(Debug, Serialize)]
pub struct ErrorAck {
    /// Always false.
    pub success: bool,
    /// Human-readable error description.
    pub error: String,
}

/// Handles a call-completed notification from the voice provider.
///
/// Verification and normalization failures, and the two fatal pipeline
/// errors, all surface as failed acknowledgments. Side-effect
/// degradation inside the pipeline is invisible here; the provider only
/// ever sees processed or failed.
#[instrument(name = "call_completed_webhook", skip(state, headers, body))]
pub async fn call_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();

    if body.len() > MAX_PAYLOAD_SIZE {
        warn!(payload_size = body.len(), "payload exceeds size limit");
        return error_ack(
            StatusCode::PAYLOAD_TOO_LARGE,
            &IngestError::PayloadTooLarge { size_bytes: body.len() }.to_string(),
        );
    }

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let verification = voxlead_ingest::verify_signature(
        &body,
        signature,
        state.webhook_secret.as_deref(),
        state.clock.unix_seconds(),
    );

    if !verification.is_valid {
        let reason = verification
            .failure
            .map(|f| f.to_string())
            .unwrap_or_else(|| "verification failed".to_string());
        warn!(reason = %reason, "rejecting webhook with invalid signature");
        return error_ack(StatusCode::UNAUTHORIZED, &IngestError::InvalidSignature.to_string());
    }

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "webhook body is not valid JSON");
            return error_ack(
                StatusCode::INTERNAL_SERVER_ERROR,
                &IngestError::MalformedPayload { reason: "request body is not JSON".to_string() }
                    .to_string(),
            );
        },
    };

    let payload = match voxlead_ingest::normalize::normalize(&raw) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "webhook payload failed normalization");
            return error_ack(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        },
    };

    match state.pipeline.process(payload).await {
        Ok(report) => {
            let processing_time_ms = started.elapsed().as_millis() as u64;
            info!(
                processing_id = %report.processing_id,
                conversation_id = %report.conversation_id,
                call_id = %report.call_id,
                failed_steps = report.failed_steps().len(),
                processing_time_ms,
                "webhook processed"
            );
            (StatusCode::OK, Json(SuccessAck { success: true, processing_time_ms }))
                .into_response()
        },
        Err(e) => {
            error!(error = %e, "webhook processing failed");
            error_ack(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        },
    }
}

fn error_ack(status: StatusCode, error: &str) -> Response {
    (status, Json(ErrorAck { success: false, error: error.to_string() })).into_response()
}
