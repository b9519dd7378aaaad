//! In-memory collaborator backend for deterministic testing.
//!
//! Implements all four collaborator traits over tokio-guarded maps,
//! mirroring the merge semantics of the PostgreSQL backend closely enough
//! to validate pipeline behavior without a database. Individual steps can
//! be made to fail on demand for partial-failure tests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;
use voxlead_core::{
    models::{Agent, Call, CallId, Contact, ContactId, UserId},
    storage::{
        calls::CallUpsert, contacts::ContactUpsert, credits::DeductionOutcome,
        lead_analytics::NewLeadAnalytics, transcripts::NewTranscript,
    },
    CoreError, Result,
};

use super::{AgentDirectory, BillingLedger, CallPersistence, ContactService};

/// Recorded billing deduction for assertions.
#[derive(Debug, Clone)]
pub struct RecordedDeduction {
    /// User charged.
    pub user_id: UserId,
    /// Credits deducted.
    pub amount: i32,
    /// Human-readable description.
    pub description: String,
    /// Idempotency reference (the call id).
    pub reference_id: Uuid,
}

/// In-memory implementation of every collaborator trait.
#[derive(Default)]
pub struct InMemoryBackend {
    agents: Mutex<Vec<Agent>>,
    calls: Mutex<HashMap<String, Call>>,
    transcripts: Mutex<HashMap<Uuid, NewTranscript>>,
    analytics: Mutex<HashMap<Uuid, NewLeadAnalytics>>,
    contacts: Mutex<HashMap<(Uuid, String), Contact>>,
    deductions: Mutex<Vec<RecordedDeduction>>,
    balances: Mutex<HashMap<Uuid, i32>>,

    fail_transcripts: AtomicBool,
    fail_analytics: AtomicBool,
    fail_contacts: AtomicBool,
    fail_billing: AtomicBool,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent in the directory.
    pub async fn add_agent(&self, agent: Agent) {
        self.agents.lock().await.push(agent);
    }

    /// Sets a user's starting credit balance.
    pub async fn set_balance(&self, user_id: UserId, credits: i32) {
        self.balances.lock().await.insert(user_id.0, credits);
    }

    /// Makes transcript storage fail until reset.
    pub fn fail_transcripts(&self, fail: bool) {
        self.fail_transcripts.store(fail, Ordering::SeqCst);
    }

    /// Makes analytics storage fail until reset.
    pub fn fail_analytics(&self, fail: bool) {
        self.fail_analytics.store(fail, Ordering::SeqCst);
    }

    /// Makes contact upserts fail until reset.
    pub fn fail_contacts(&self, fail: bool) {
        self.fail_contacts.store(fail, Ordering::SeqCst);
    }

    /// Makes billing deductions fail until reset.
    pub fn fail_billing(&self, fail: bool) {
        self.fail_billing.store(fail, Ordering::SeqCst);
    }

    /// Number of call rows.
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// The call row for a conversation, if any.
    pub async fn call_for(&self, conversation_id: &str) -> Option<Call> {
        self.calls.lock().await.get(conversation_id).cloned()
    }

    /// The stored transcript for a call, if any.
    pub async fn transcript_for(&self, call_id: CallId) -> Option<NewTranscript> {
        self.transcripts.lock().await.get(&call_id.0).cloned()
    }

    /// The stored analytics for a call, if any.
    pub async fn analytics_for(&self, call_id: CallId) -> Option<NewLeadAnalytics> {
        self.analytics.lock().await.get(&call_id.0).cloned()
    }

    /// The contact for a user/phone pair, if any.
    pub async fn contact_for(&self, user_id: UserId, phone: &str) -> Option<Contact> {
        self.contacts.lock().await.get(&(user_id.0, phone.to_string())).cloned()
    }

    /// All recorded deductions.
    pub async fn deductions(&self) -> Vec<RecordedDeduction> {
        self.deductions.lock().await.clone()
    }

    /// A user's current balance, defaulting to zero.
    pub async fn balance(&self, user_id: UserId) -> i32 {
        self.balances.lock().await.get(&user_id.0).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AgentDirectory for InMemoryBackend {
    async fn find_by_provider_id(&self, provider_agent_id: &str) -> Result<Option<Agent>> {
        let agents = self.agents.lock().await;
        Ok(agents.iter().find(|a| a.provider_agent_id == provider_agent_id).cloned())
    }
}

#[async_trait]
impl CallPersistence for InMemoryBackend {
    async fn upsert_call(&self, input: &CallUpsert) -> Result<Call> {
        let mut calls = self.calls.lock().await;
        let now = Utc::now();

        if let Some(existing) = calls.get_mut(&input.conversation_id) {
            if input.phone_number.is_some() {
                existing.phone_number = input.phone_number.clone();
            }
            existing.duration_seconds = input.duration_seconds;
            existing.duration_minutes = input.duration_minutes;
            existing.credits_used = input.credits_used;
            existing.status = input.status;
            merge_metadata(&mut existing.metadata.0, &input.metadata);
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let call = Call {
            id: CallId::new(),
            conversation_id: input.conversation_id.clone(),
            agent_id: input.agent_id,
            user_id: input.user_id,
            phone_number: input.phone_number.clone(),
            caller_name: None,
            caller_email: None,
            duration_seconds: input.duration_seconds,
            duration_minutes: input.duration_minutes,
            credits_used: input.credits_used,
            status: input.status,
            metadata: sqlx::types::Json(input.metadata.clone()),
            created_at: now,
            updated_at: now,
        };
        calls.insert(input.conversation_id.clone(), call.clone());
        Ok(call)
    }

    async fn store_transcript(&self, transcript: &NewTranscript) -> Result<Option<Uuid>> {
        if self.fail_transcripts.load(Ordering::SeqCst) {
            return Err(CoreError::Database("injected transcript failure".to_string()));
        }

        let mut transcripts = self.transcripts.lock().await;
        if transcripts.contains_key(&transcript.call_id.0) {
            return Ok(None);
        }
        transcripts.insert(transcript.call_id.0, transcript.clone());
        Ok(Some(Uuid::new_v4()))
    }

    async fn store_lead_analytics(
        &self,
        call_id: CallId,
        analytics: &NewLeadAnalytics,
    ) -> Result<Option<Uuid>> {
        if self.fail_analytics.load(Ordering::SeqCst) {
            return Err(CoreError::Database("injected analytics failure".to_string()));
        }

        let mut rows = self.analytics.lock().await;
        if rows.contains_key(&call_id.0) {
            return Ok(None);
        }
        rows.insert(call_id.0, analytics.clone());
        Ok(Some(Uuid::new_v4()))
    }

    async fn backfill_caller(
        &self,
        call_id: CallId,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<()> {
        let mut calls = self.calls.lock().await;
        for call in calls.values_mut() {
            if call.id == call_id {
                if call.caller_name.is_none() {
                    call.caller_name = name.map(ToString::to_string);
                }
                if call.caller_email.is_none() {
                    call.caller_email = email.map(ToString::to_string);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContactService for InMemoryBackend {
    async fn upsert_by_phone(&self, input: &ContactUpsert) -> Result<Contact> {
        if self.fail_contacts.load(Ordering::SeqCst) {
            return Err(CoreError::Database("injected contact failure".to_string()));
        }

        let mut contacts = self.contacts.lock().await;
        let key = (input.user_id.0, input.phone_number.clone());
        let now = Utc::now();

        if let Some(existing) = contacts.get_mut(&key) {
            if existing.name.is_none() {
                existing.name = input.name.clone();
            }
            if existing.email.is_none() {
                existing.email = input.email.clone();
            }
            if existing.company_name.is_none() {
                existing.company_name = input.company_name.clone();
            }
            if input.last_call_id.is_some() {
                existing.last_call_id = input.last_call_id;
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let contact = Contact {
            id: ContactId::new(),
            user_id: input.user_id,
            phone_number: input.phone_number.clone(),
            name: input.name.clone(),
            email: input.email.clone(),
            company_name: input.company_name.clone(),
            not_connected_count: 0,
            last_call_id: input.last_call_id,
            created_at: now,
            updated_at: now,
        };
        contacts.insert(key, contact.clone());
        Ok(contact)
    }
}

#[async_trait]
impl BillingLedger for InMemoryBackend {
    async fn deduct_credits(
        &self,
        user_id: UserId,
        amount: i32,
        description: &str,
        reference_id: Uuid,
    ) -> Result<DeductionOutcome> {
        if self.fail_billing.load(Ordering::SeqCst) {
            return Err(CoreError::Database("injected billing failure".to_string()));
        }

        let mut deductions = self.deductions.lock().await;
        if deductions.iter().any(|d| d.reference_id == reference_id) {
            return Ok(DeductionOutcome::AlreadyApplied);
        }

        deductions.push(RecordedDeduction {
            user_id,
            amount,
            description: description.to_string(),
            reference_id,
        });

        let mut balances = self.balances.lock().await;
        let balance = balances.entry(user_id.0).or_insert(0);
        *balance -= amount;

        Ok(DeductionOutcome::Applied { remaining: *balance })
    }
}

/// Overlays new metadata keys onto old ones, like the JSONB `||` merge.
fn merge_metadata(existing: &mut serde_json::Value, incoming: &serde_json::Value) {
    match (existing, incoming) {
        (serde_json::Value::Object(old), serde_json::Value::Object(new)) => {
            for (key, value) in new {
                old.insert(key.clone(), value.clone());
            }
        },
        (existing, incoming) => {
            if !incoming.is_null() {
                *existing = incoming.clone();
            }
        },
    }
}
