//! Collaborator interfaces consumed by the ingestion pipeline.
//!
//! The pipeline never talks to concrete services: the agent directory,
//! call persistence, contact service and billing ledger are injected as
//! trait objects at construction time. Production wiring uses the
//! PostgreSQL implementations in [`postgres`]; tests substitute the
//! in-memory backend in [`mock`] for database-free behavior validation.

use async_trait::async_trait;
use uuid::Uuid;
use voxlead_core::{
    models::{Agent, Call, CallId, Contact, UserId},
    storage::{
        calls::CallUpsert, contacts::ContactUpsert, credits::DeductionOutcome,
        lead_analytics::NewLeadAnalytics, transcripts::NewTranscript,
    },
    Result,
};

pub mod mock;
pub mod postgres;

pub use mock::InMemoryBackend;
pub use postgres::PostgresBackend;

/// Resolves provider agent ids to internal agents.
///
/// The agent CRUD surface is an external collaborator; this is the one
/// lookup the pipeline needs from it.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Finds the agent registered under a provider agent id.
    async fn find_by_provider_id(&self, provider_agent_id: &str) -> Result<Option<Agent>>;
}

/// Durable persistence for calls and their dependent rows.
#[async_trait]
pub trait CallPersistence: Send + Sync {
    /// Atomically inserts or updates the call for a conversation.
    async fn upsert_call(&self, input: &CallUpsert) -> Result<Call>;

    /// Stores the transcript; `None` when the call already has one.
    async fn store_transcript(&self, transcript: &NewTranscript) -> Result<Option<Uuid>>;

    /// Stores lead analytics; `None` when the call already has a row.
    async fn store_lead_analytics(
        &self,
        call_id: CallId,
        analytics: &NewLeadAnalytics,
    ) -> Result<Option<Uuid>>;

    /// Fills caller name/email on the call when still unset.
    async fn backfill_caller(
        &self,
        call_id: CallId,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<()>;
}

/// Create-or-update surface for per-user contacts.
#[async_trait]
pub trait ContactService: Send + Sync {
    /// Creates or updates the contact for a phone number.
    async fn upsert_by_phone(&self, input: &ContactUpsert) -> Result<Contact>;
}

/// The billing ledger's narrow deduction contract.
///
/// Must be safely callable once per `reference_id`; idempotency is the
/// ledger's responsibility and both implementations honor it.
#[async_trait]
pub trait BillingLedger: Send + Sync {
    /// Deducts credits from a user, at most once per reference id.
    async fn deduct_credits(
        &self,
        user_id: UserId,
        amount: i32,
        description: &str,
        reference_id: Uuid,
    ) -> Result<DeductionOutcome>;
}
