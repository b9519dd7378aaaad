//! Error types for webhook ingestion.
//!
//! Defines the coded error taxonomy for the pipeline. Only the variants
//! here abort processing; per-step side-effect failures are captured in
//! the processing report instead and never surface as errors.

use thiserror::Error;
use voxlead_core::CoreError;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal ingestion errors with codes matching the error taxonomy.
///
/// Application errors (E1xxx) mean the notification itself is
/// unprocessable; system errors (E3xxx) mean infrastructure failed before
/// the call record could be written.
#[derive(Debug, Error)]
pub enum IngestError {
    /// HMAC signature validation failed with a secret configured (E1001).
    #[error("[E1001] Invalid signature: HMAC validation failed")]
    InvalidSignature,

    /// Payload exceeds the size limit (E1002).
    #[error("[E1002] Payload too large: size {size_bytes} bytes exceeds 10MB limit")]
    PayloadTooLarge {
        /// Size of the payload in bytes.
        size_bytes: usize,
    },

    /// Request body is not JSON, or no known notification shape matches
    /// (E1003).
    #[error("[E1003] Malformed payload: {reason}")]
    MalformedPayload {
        /// Which required field or shape probe failed.
        reason: String,
    },

    /// The provider agent id does not resolve to a known agent (E1004).
    ///
    /// The one business error that aborts the pipeline before side
    /// effects: without an owning user there is nothing to bill or
    /// attribute data to.
    #[error("[E1004] Agent not found: no agent registered for provider id {provider_agent_id}")]
    AgentNotFound {
        /// The provider agent id that failed to resolve.
        provider_agent_id: String,
    },

    /// The mandatory call upsert failed (E3001).
    #[error("[E3001] Storage unavailable: {0}")]
    Storage(#[from] CoreError),
}

impl IngestError {
    /// The stable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "E1001",
            Self::PayloadTooLarge { .. } => "E1002",
            Self::MalformedPayload { .. } => "E1003",
            Self::AgentNotFound { .. } => "E1004",
            Self::Storage(_) => "E3001",
        }
    }
}
