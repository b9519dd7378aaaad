//! Payload normalization across historical notification shapes.
//!
//! The voice provider has shipped several webhook formats over time. This
//! module probes the raw JSON tree with a tagged-union discriminant and
//! collapses whichever shape arrived into one [`CanonicalWebhookPayload`];
//! all downstream code depends only on that shape.
//!
//! Supported shapes:
//! - **Legacy flat**: top-level `conversation_id`, `duration_seconds`,
//!   `phone_number`, optional `transcript` and `analysis.value`.
//! - **New wrapped**: a `data` object with `conversation_id`,
//!   `metadata.call_duration_secs`, a transcript array of
//!   `{role, message, time_in_call_secs}` and nested
//!   `analysis.data_collection_results.default.value`.
//!
//! Missing optional fields never fail normalization; only when the
//! identity, status or duration fields are absent in every known shape is
//! [`IngestError::MalformedPayload`] returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IngestError, Result};

/// Provider-reported outcome of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    /// Conversation finished successfully. The only billable status.
    Done,
    /// Provider-side error ended the conversation.
    Error,
    /// Conversation failed, or the status string was unrecognized.
    Failed,
}

impl NotificationStatus {
    /// Maps the wire status string.
    ///
    /// Anything other than `done` or `error` collapses to `Failed`.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "done" => Self::Done,
            "error" => Self::Error,
            _ => Self::Failed,
        }
    }

    /// Whether the conversation completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// One turn of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Speaker role (`agent`, `user`, ...).
    pub role: String,
    /// What was said.
    pub message: String,
    /// Seconds into the call when the turn started.
    pub time_in_call_secs: Option<f64>,
}

/// The single normalized in-memory shape all downstream logic operates
/// on, regardless of which historical wire format arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalWebhookPayload {
    /// The provider's conversation identifier.
    pub conversation_id: String,
    /// The provider's agent identifier.
    pub agent_provider_id: String,
    /// Reported conversation outcome.
    pub status: NotificationStatus,
    /// Conversation transcript; empty when the shape carried none.
    pub transcript: Vec<TranscriptEntry>,
    /// Call start time, when reported.
    pub started_at: Option<DateTime<Utc>>,
    /// Reported call duration in seconds.
    pub duration_seconds: i32,
    /// Caller phone number, when the telephony provider attached one.
    pub phone_number: Option<String>,
    /// The embedded analytics string, when present.
    pub analysis_raw: Option<String>,
    /// Provider metadata blob carried onto the call record.
    pub provider_metadata: Value,
}

impl CanonicalWebhookPayload {
    /// Number of conversation turns, used by the score-capping rule.
    pub fn conversation_turns(&self) -> usize {
        self.transcript.len()
    }
}

/// Raw notification shape, decided by a discriminant probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawShape {
    /// Flat fields at the document root.
    Legacy,
    /// Everything nested under a `data` wrapper.
    New,
}

impl RawShape {
    fn detect(root: &Value) -> Option<Self> {
        if root.get("data").and_then(|d| d.get("conversation_id")).is_some() {
            return Some(Self::New);
        }
        if root.get("conversation_id").is_some() {
            return Some(Self::Legacy);
        }
        None
    }
}

/// Collapses a raw notification tree into the canonical payload.
///
/// # Errors
///
/// Returns [`IngestError::MalformedPayload`] when no known shape matches
/// or a mandatory identity/status/duration field is missing from the
/// matched shape.
pub fn normalize(root: &Value) -> Result<CanonicalWebhookPayload> {
    let shape = RawShape::detect(root).ok_or_else(|| IngestError::MalformedPayload {
        reason: "no known notification shape matches".to_string(),
    })?;

    match shape {
        RawShape::Legacy => normalize_legacy(root),
        RawShape::New => normalize_new(root),
    }
    .map(|mut payload| {
        payload.analysis_raw = locate_analysis(root);
        payload
    })
}

fn normalize_legacy(root: &Value) -> Result<CanonicalWebhookPayload> {
    let conversation_id = require_str(root, "conversation_id")?;
    let agent_provider_id = require_str(root, "agent_id")?;
    let status = NotificationStatus::from_wire(&require_str(root, "status")?);
    let duration_seconds = require_duration(root.get("duration_seconds"), "duration_seconds")?;

    Ok(CanonicalWebhookPayload {
        conversation_id,
        agent_provider_id,
        status,
        transcript: transcript_entries(root.get("transcript")),
        started_at: unix_time(root.get("start_time_unix_secs")),
        duration_seconds,
        phone_number: optional_str(root, "phone_number"),
        analysis_raw: None,
        provider_metadata: metadata_blob(root.get("metadata")),
    })
}

fn normalize_new(root: &Value) -> Result<CanonicalWebhookPayload> {
    let data = root.get("data").unwrap_or(&Value::Null);
    let metadata = data.get("metadata").unwrap_or(&Value::Null);

    let conversation_id = require_str(data, "conversation_id")?;
    let agent_provider_id = require_str(data, "agent_id")?;
    let status = NotificationStatus::from_wire(&require_str(data, "status")?);
    let duration_seconds =
        require_duration(metadata.get("call_duration_secs"), "metadata.call_duration_secs")?;

    let phone_number = metadata
        .get("phone_call")
        .and_then(|p| p.get("external_number"))
        .and_then(Value::as_str)
        .map(ToString::to_string);

    Ok(CanonicalWebhookPayload {
        conversation_id,
        agent_provider_id,
        status,
        transcript: transcript_entries(data.get("transcript")),
        started_at: unix_time(metadata.get("start_time_unix_secs")),
        duration_seconds,
        phone_number,
        analysis_raw: None,
        provider_metadata: metadata_blob(data.get("metadata")),
    })
}

/// Locates the embedded analytics string, first match wins.
///
/// Probes `data.analysis.data_collection_results.default.value`, then the
/// same path without the `data` wrapper, then the legacy
/// `analysis.value`. Absence is not an error; a call can complete with no
/// lead score.
fn locate_analysis(root: &Value) -> Option<String> {
    let candidates = [
        root.get("data")
            .and_then(|v| v.get("analysis"))
            .and_then(|v| v.get("data_collection_results"))
            .and_then(|v| v.get("default"))
            .and_then(|v| v.get("value")),
        root.get("analysis")
            .and_then(|v| v.get("data_collection_results"))
            .and_then(|v| v.get("default"))
            .and_then(|v| v.get("value")),
        root.get("analysis").and_then(|v| v.get("value")),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string)
}

fn transcript_entries(value: Option<&Value>) -> Vec<TranscriptEntry> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|entry| TranscriptEntry {
            role: entry
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            message: entry
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            time_in_call_secs: entry.get("time_in_call_secs").and_then(Value::as_f64),
        })
        .collect()
}

fn metadata_blob(value: Option<&Value>) -> Value {
    match value {
        Some(v) if v.is_object() => v.clone(),
        _ => Value::Object(serde_json::Map::new()),
    }
}

fn unix_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value.and_then(Value::as_i64).and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn require_str(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| IngestError::MalformedPayload { reason: format!("missing field {key}") })
}

fn optional_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(ToString::to_string)
}

fn require_duration(value: Option<&Value>, field: &str) -> Result<i32> {
    let seconds = value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .ok_or_else(|| IngestError::MalformedPayload {
            reason: format!("missing field {field}"),
        })?;

    Ok(i32::try_from(seconds.max(0)).unwrap_or(i32::MAX))
}
