//! Call record upsert construction and billing math.
//!
//! Translates a canonical payload plus a resolved agent into the atomic
//! upsert input the storage layer executes. Duration is billed in whole
//! minutes rounded up; a 61-second call costs two credits.

use voxlead_core::{models::Agent, CallStatus};
use voxlead_core::storage::calls::CallUpsert;

use crate::normalize::{CanonicalWebhookPayload, NotificationStatus};

/// Billable minutes for a reported duration, rounded up.
pub fn billable_minutes(duration_seconds: i32) -> i32 {
    (duration_seconds.max(0) as u32).div_ceil(60) as i32
}

/// Call status derived from the notification's status field.
///
/// `done` completes the call; `error` and anything unrecognized fail it.
pub fn call_status_for(status: NotificationStatus) -> CallStatus {
    match status {
        NotificationStatus::Done => CallStatus::Completed,
        NotificationStatus::Error | NotificationStatus::Failed => CallStatus::Failed,
    }
}

/// Builds the atomic upsert input for a notification.
///
/// Credits equal billable minutes; the repository's conflict clause takes
/// care of merge semantics for repeat delivery.
pub fn build_call_upsert(agent: &Agent, payload: &CanonicalWebhookPayload) -> CallUpsert {
    let duration_minutes = billable_minutes(payload.duration_seconds);

    CallUpsert {
        conversation_id: payload.conversation_id.clone(),
        agent_id: agent.id,
        user_id: agent.user_id,
        phone_number: payload.phone_number.clone(),
        duration_seconds: payload.duration_seconds,
        duration_minutes,
        credits_used: duration_minutes,
        status: call_status_for(payload.status),
        metadata: payload.provider_metadata.clone(),
    }
}
