//! PostgreSQL-backed collaborator implementations.
//!
//! Thin adapters delegating to the repository layer in
//! `voxlead_core::storage`. One backend struct implements all four
//! collaborator traits so production wiring stays a single allocation.

use async_trait::async_trait;
use uuid::Uuid;
use voxlead_core::{
    models::{Agent, Call, CallId, Contact, UserId},
    storage::{
        calls::CallUpsert, contacts::ContactUpsert, credits::DeductionOutcome,
        lead_analytics::NewLeadAnalytics, transcripts::NewTranscript, Storage,
    },
    Result,
};

use super::{AgentDirectory, BillingLedger, CallPersistence, ContactService};

/// Production collaborator backend over the shared storage layer.
#[derive(Clone)]
pub struct PostgresBackend {
    storage: Storage,
}

impl PostgresBackend {
    /// Creates a backend over the given storage layer.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Access to the underlying storage, for wiring health checks.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

#[async_trait]
impl AgentDirectory for PostgresBackend {
    async fn find_by_provider_id(&self, provider_agent_id: &str) -> Result<Option<Agent>> {
        self.storage.agents.find_by_provider_id(provider_agent_id).await
    }
}

#[async_trait]
impl CallPersistence for PostgresBackend {
    async fn upsert_call(&self, input: &CallUpsert) -> Result<Call> {
        self.storage.calls.upsert(input).await
    }

    async fn store_transcript(&self, transcript: &NewTranscript) -> Result<Option<Uuid>> {
        self.storage.transcripts.create(transcript).await
    }

    async fn store_lead_analytics(
        &self,
        call_id: CallId,
        analytics: &NewLeadAnalytics,
    ) -> Result<Option<Uuid>> {
        self.storage.lead_analytics.create(call_id, analytics).await
    }

    async fn backfill_caller(
        &self,
        call_id: CallId,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<()> {
        self.storage.calls.backfill_caller(call_id, name, email).await
    }
}

#[async_trait]
impl ContactService for PostgresBackend {
    async fn upsert_by_phone(&self, input: &ContactUpsert) -> Result<Contact> {
        self.storage.contacts.upsert_by_phone(input).await
    }
}

#[async_trait]
impl BillingLedger for PostgresBackend {
    async fn deduct_credits(
        &self,
        user_id: UserId,
        amount: i32,
        description: &str,
        reference_id: Uuid,
    ) -> Result<DeductionOutcome> {
        self.storage.credits.deduct(user_id, amount, description, reference_id).await
    }
}
