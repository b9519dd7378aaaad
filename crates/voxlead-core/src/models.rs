//! Core domain models and strongly-typed identifiers.
//!
//! Defines calls, transcripts, lead analytics, contacts and credit
//! transactions, plus newtype ID wrappers for compile-time type safety.
//! Includes database serialization traits and the call status lifecycle
//! used by the webhook ingestion pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed call identifier.
///
/// Wraps a UUID to prevent mixing with other ID types. The call record is
/// the durable anchor for every side effect produced by the ingestion
/// pipeline, and this ID follows it through its entire lifecycle.
///
/// # Example
///
/// ```
/// use voxlead_core::models::CallId;
/// let call_id = CallId::new();
/// println!("Processing call: {}", call_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Creates a new random call ID.
    ///
    /// Uses UUID v4 for globally unique identifiers without coordination.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CallId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for CallId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for CallId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for CallId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed agent identifier.
///
/// Refers to the internal agent record, not the voice provider's agent id.
/// The mapping between the two is owned by the agent directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Creates a new random agent ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AgentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for AgentId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for AgentId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for AgentId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed user identifier.
///
/// The owning user of an agent. Billing deductions and contacts are scoped
/// to a user, ensuring complete data isolation between customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Creates a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for UserId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for UserId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for UserId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed contact identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub Uuid);

impl ContactId {
    /// Creates a new random contact ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ContactId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for ContactId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for ContactId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for ContactId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Call lifecycle status.
///
/// Calls are created by the first webhook notification for a conversation
/// and mutated in place by subsequent deliveries. The status machine is
/// `in_progress -> {completed | failed}`, with `cancelled` reachable only
/// through an external cancellation path outside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Call is underway; no completion notification received yet.
    InProgress,

    /// Provider reported the conversation finished successfully.
    ///
    /// Terminal state for the pipeline. The only status that triggers
    /// a billing deduction.
    Completed,

    /// Provider reported an error, or the status field was unrecognized.
    ///
    /// Terminal state. Failed calls are never billed.
    Failed,

    /// Cancelled by an external path (user action, scheduled cleanup).
    ///
    /// The ingestion pipeline never sets this status itself.
    Cancelled,
}

impl CallStatus {
    /// Whether this status is terminal for the pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl sqlx::Type<PgDb> for CallStatus {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for CallStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid call status: {s}").into()),
        }
    }
}

/// Durable call record, unique per provider conversation.
///
/// Created on the first webhook notification for a conversation id and
/// mutated (never replaced) by subsequent notifications for the same id.
/// This mutate-in-place behavior is the system's idempotency mechanism
/// under at-least-once webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Call {
    /// Unique identifier for this call.
    pub id: CallId,

    /// The voice provider's conversation identifier.
    ///
    /// Unique across all calls; the idempotency key for webhook delivery.
    pub conversation_id: String,

    /// The agent that handled this call.
    pub agent_id: AgentId,

    /// The user that owns the agent (and pays for the call).
    pub user_id: UserId,

    /// Caller phone number, when the telephony provider reported one.
    pub phone_number: Option<String>,

    /// Caller name extracted from lead analytics, if any.
    pub caller_name: Option<String>,

    /// Caller email extracted from lead analytics, if any.
    pub caller_email: Option<String>,

    /// Call duration in seconds as reported by the provider.
    pub duration_seconds: i32,

    /// Duration rounded up to whole minutes.
    ///
    /// The billing unit: `ceil(duration_seconds / 60)`.
    pub duration_minutes: i32,

    /// Credits deducted for this call.
    pub credits_used: i32,

    /// Current lifecycle status.
    pub status: CallStatus,

    /// Opaque provider metadata blob.
    ///
    /// Merged on repeat delivery: new keys overlay old, previously stored
    /// keys are never dropped.
    pub metadata: sqlx::types::Json<serde_json::Value>,

    /// When the call record was first created.
    pub created_at: DateTime<Utc>,

    /// When the call record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Stored transcript for a call.
///
/// `full_text` is the `"{role}: {message}"` concatenation joined by
/// newlines; `segments` keeps the per-entry detail with in-call timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CallTranscript {
    /// Unique identifier for this transcript.
    pub id: Uuid,

    /// The call this transcript belongs to.
    pub call_id: CallId,

    /// Full conversation text, one `role: message` line per turn.
    pub full_text: String,

    /// Per-turn segments as stored JSON.
    pub segments: sqlx::types::Json<serde_json::Value>,

    /// Number of conversation turns.
    pub turn_count: i32,

    /// When the transcript was stored.
    pub created_at: DateTime<Utc>,
}

/// Persisted lead analytics, one row per call.
///
/// Stores the structured record produced by the tolerant analytics parser.
/// The `UNIQUE(call_id)` constraint guarantees at most one row per call
/// even when a notification is double-processed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeadAnalyticsRecord {
    /// Unique identifier for this analytics row.
    pub id: Uuid,

    /// The call these analytics describe.
    pub call_id: CallId,

    /// Intent level label (e.g. "High").
    pub intent_level: String,
    /// Intent score, 1-3 (0 in the raw-fallback case).
    pub intent_score: i32,
    /// Urgency level label.
    pub urgency_level: String,
    /// Urgency score, 1-3.
    pub urgency_score: i32,
    /// Budget constraint label.
    pub budget_constraint: String,
    /// Budget score, 1-3.
    pub budget_score: i32,
    /// Fit alignment label.
    pub fit_alignment: String,
    /// Fit score, 1-3.
    pub fit_score: i32,
    /// Engagement health label.
    pub engagement_health: String,
    /// Engagement score, 1-3.
    pub engagement_score: i32,

    /// Sum of the five category scores, capped under the low-engagement
    /// rule.
    pub total_score: i32,

    /// Lead classification: Cold, Warm, Hot, or Raw for unparsed payloads.
    pub lead_status_tag: String,

    /// Whether the pricing CTA fired during the conversation.
    pub cta_pricing_clicked: bool,
    /// Whether the demo CTA fired.
    pub cta_demo_clicked: bool,
    /// Whether the follow-up CTA fired.
    pub cta_followup_clicked: bool,
    /// Whether the sample CTA fired.
    pub cta_sample_clicked: bool,
    /// Whether the conversation was escalated to a human.
    pub cta_escalated_to_human: bool,

    /// Extracted caller name, if the model surfaced one.
    pub extracted_name: Option<String>,
    /// Extracted caller email.
    pub extracted_email: Option<String>,
    /// Extracted company name.
    pub company_name: Option<String>,
    /// One-line notification for the dashboard, if generated.
    pub smart_notification: Option<String>,

    /// Normalized demo booking time, fixed at UTC+05:30.
    pub demo_book_datetime: Option<DateTime<Utc>>,

    /// Original analytics string, preserved when parsing fell back to the
    /// raw tier.
    pub raw_analysis_data: Option<String>,

    /// When the analytics row was stored.
    pub created_at: DateTime<Utc>,
}

/// Per-user contact, looked up by phone number.
///
/// Contacts are owned by the user; the pipeline only reads and writes
/// through the create-or-update surface of the contact repository.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    /// Unique identifier for this contact.
    pub id: ContactId,

    /// The owning user.
    pub user_id: UserId,

    /// Contact phone number; unique per user.
    pub phone_number: String,

    /// Contact name, if known.
    pub name: Option<String>,

    /// Contact email, if known.
    pub email: Option<String>,

    /// Company the contact belongs to, if known.
    pub company_name: Option<String>,

    /// Monotonic count of unanswered outbound attempts.
    ///
    /// Maintained by the outbound dialer, never decremented here.
    pub not_connected_count: i32,

    /// Most recent call linked to this contact.
    pub last_call_id: Option<CallId>,

    /// When the contact was first created.
    pub created_at: DateTime<Utc>,

    /// When the contact was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Agent directory entry.
///
/// Agents are managed by the CRUD surface outside this system; the
/// pipeline only resolves the provider's agent id to an owner.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
    /// Internal agent identifier.
    pub id: AgentId,

    /// The user that owns this agent.
    pub user_id: UserId,

    /// The voice provider's identifier for this agent.
    pub provider_agent_id: String,

    /// Human-readable agent name.
    pub name: String,
}

/// A single movement on a user's credit balance.
///
/// Deductions store a negative amount plus the call id as `reference_id`,
/// which carries a partial unique index so a retried webhook can never
/// double-charge the same call.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditTransaction {
    /// Unique identifier for this transaction.
    pub id: Uuid,

    /// The user whose balance moved.
    pub user_id: UserId,

    /// Credit delta; negative for deductions.
    pub amount: i32,

    /// Human-readable description, e.g. `"Call to +15551234 - 3m"`.
    pub description: String,

    /// Idempotency and audit reference; the call id for call billing.
    pub reference_id: Option<Uuid>,

    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_status_formats_for_database_storage() {
        assert_eq!(CallStatus::InProgress.to_string(), "in_progress");
        assert_eq!(CallStatus::Completed.to_string(), "completed");
        assert_eq!(CallStatus::Failed.to_string(), "failed");
        assert_eq!(CallStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn call_status_terminality() {
        assert!(!CallStatus::InProgress.is_terminal());
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(CallStatus::Cancelled.is_terminal());
    }

    #[test]
    fn ids_are_unique_and_display_as_uuid() {
        let a = CallId::new();
        let b = CallId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.0.to_string());
    }

    #[test]
    fn call_id_roundtrips_through_uuid() {
        let uuid = Uuid::new_v4();
        let id = CallId::from(uuid);
        assert_eq!(id.0, uuid);
    }
}
