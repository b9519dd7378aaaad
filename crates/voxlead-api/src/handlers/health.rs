//! Health check handler.
//!
//! Returns a static healthy acknowledgment with no side effects; the
//! voice provider and the load balancer both probe it.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"`; the process answering is the signal.
    pub status: &'static str,
    /// Timestamp when the health check was answered.
    pub timestamp: DateTime<Utc>,
    /// Service version information.
    pub version: &'static str,
}

/// Static health check endpoint.
///
/// Performs no I/O and touches no state, so it stays responsive even
/// when the database is degraded.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
