//! Side-effect orchestration for call-completed notifications.
//!
//! [`IngestPipeline::process`] runs the mandatory call upsert, then drives
//! the dependent side effects - transcript storage, lead analytics,
//! contact auto-creation, billing - as independent, individually-failable
//! steps. One failing step never prevents the others from running and
//! never rolls back the call record; every outcome lands in the
//! [`ProcessingReport`].
//!
//! Only two things abort processing before side effects: an agent that
//! cannot be resolved and a failed call upsert. Everything else degrades.

use std::{fmt, sync::Arc};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use voxlead_core::{
    events::{CallRecordedEvent, EventHandler, PipelineEvent},
    models::{Call, CallId, CallStatus},
    storage::{contacts::ContactUpsert, transcripts::NewTranscript},
};

use crate::{
    analytics::{self, ParseTier, ParsedAnalytics},
    collaborators::{AgentDirectory, BillingLedger, CallPersistence, ContactService},
    error::{IngestError, Result},
    normalize::CanonicalWebhookPayload,
    upsert::build_call_upsert,
};

/// One of the independently-failable post-upsert actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Transcript storage.
    Transcript,
    /// Lead analytics storage and caller backfill.
    LeadAnalytics,
    /// Contact auto-creation/update.
    Contact,
    /// Credit deduction.
    Billing,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transcript => write!(f, "transcript"),
            Self::LeadAnalytics => write!(f, "lead_analytics"),
            Self::Contact => write!(f, "contact"),
            Self::Billing => write!(f, "billing"),
        }
    }
}

/// Outcome of a single side-effect step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Step ran and its write landed.
    Completed,
    /// Step had nothing to do; carries the reason.
    Skipped(String),
    /// Step failed; carries the error text. Processing continued.
    Failed(String),
}

/// Per-notification processing report.
///
/// The HTTP layer only exposes success or failure; this report is where
/// partial degradation stays observable.
#[derive(Debug, Clone)]
pub struct ProcessingReport {
    /// Unique id for this processing run, used in logs.
    pub processing_id: Uuid,
    /// The call row that was written.
    pub call_id: CallId,
    /// The provider conversation id.
    pub conversation_id: String,
    /// Status the call ended up in.
    pub call_status: CallStatus,
    /// Which parser tier produced the analytics, when any were present.
    pub parse_tier: Option<ParseTier>,
    /// Outcome of every side-effect step, in execution order.
    pub steps: Vec<(Step, StepStatus)>,
}

impl ProcessingReport {
    /// Outcome of a given step, if it was reached.
    pub fn step_status(&self, step: Step) -> Option<&StepStatus> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, status)| status)
    }

    /// Steps that failed during this run.
    pub fn failed_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|(_, status)| matches!(status, StepStatus::Failed(_)))
            .map(|(step, _)| *step)
            .collect()
    }
}

/// The webhook ingestion pipeline.
///
/// Collaborators are injected at construction so tests can substitute the
/// in-memory backend; there are no service singletons.
pub struct IngestPipeline {
    agents: Arc<dyn AgentDirectory>,
    persistence: Arc<dyn CallPersistence>,
    contacts: Arc<dyn ContactService>,
    billing: Arc<dyn BillingLedger>,
    events: Arc<dyn EventHandler>,
}

impl IngestPipeline {
    /// Creates a pipeline over the given collaborators.
    pub fn new(
        agents: Arc<dyn AgentDirectory>,
        persistence: Arc<dyn CallPersistence>,
        contacts: Arc<dyn ContactService>,
        billing: Arc<dyn BillingLedger>,
        events: Arc<dyn EventHandler>,
    ) -> Self {
        Self { agents, persistence, contacts, billing, events }
    }

    /// Processes one normalized notification.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::AgentNotFound`] when the provider agent id
    /// resolves to nothing, or [`IngestError::Storage`] when the
    /// mandatory call upsert fails. Side-effect failures are captured in
    /// the report, never returned.
    #[instrument(
        name = "process_notification",
        skip(self, payload),
        fields(conversation_id = %payload.conversation_id)
    )]
    pub async fn process(&self, payload: CanonicalWebhookPayload) -> Result<ProcessingReport> {
        let processing_id = Uuid::new_v4();

        let agent = self
            .agents
            .find_by_provider_id(&payload.agent_provider_id)
            .await?
            .ok_or_else(|| IngestError::AgentNotFound {
                provider_agent_id: payload.agent_provider_id.clone(),
            })?;

        let call = self.persistence.upsert_call(&build_call_upsert(&agent, &payload)).await?;

        info!(
            processing_id = %processing_id,
            call_id = %call.id,
            status = %call.status,
            duration_minutes = call.duration_minutes,
            "call record written"
        );

        self.events
            .handle_event(PipelineEvent::CallRecorded(CallRecordedEvent {
                call_id: call.id,
                conversation_id: call.conversation_id.clone(),
                agent_id: call.agent_id,
                user_id: call.user_id,
                status: call.status,
                recorded_at: Utc::now(),
            }))
            .await;

        let parsed = payload.analysis_raw.as_deref().map(|raw| {
            let mut parsed = analytics::parse(raw);
            parsed.apply_engagement_cap(payload.conversation_turns());
            debug!(
                processing_id = %processing_id,
                tier = ?parsed.tier,
                total_score = parsed.total_score,
                lead_status = %parsed.lead_status_tag,
                "analytics parsed"
            );
            parsed
        });

        let mut report = ProcessingReport {
            processing_id,
            call_id: call.id,
            conversation_id: call.conversation_id.clone(),
            call_status: call.status,
            parse_tier: parsed.as_ref().map(|p| p.tier),
            steps: Vec::with_capacity(4),
        };

        let status = self.store_transcript(&payload, &call).await;
        self.record(&mut report, Step::Transcript, status);

        let status = self.store_analytics(parsed.as_ref(), &call).await;
        self.record(&mut report, Step::LeadAnalytics, status);

        let status = self.upsert_contact(parsed.as_ref(), &call).await;
        self.record(&mut report, Step::Contact, status);

        let status = self.bill_call(&payload, &call).await;
        self.record(&mut report, Step::Billing, status);

        Ok(report)
    }

    fn record(&self, report: &mut ProcessingReport, step: Step, status: StepStatus) {
        if let StepStatus::Failed(error) = &status {
            warn!(
                processing_id = %report.processing_id,
                conversation_id = %report.conversation_id,
                step = %step,
                error = %error,
                "side-effect step failed, continuing"
            );
        }
        report.steps.push((step, status));
    }

    async fn store_transcript(
        &self,
        payload: &CanonicalWebhookPayload,
        call: &Call,
    ) -> StepStatus {
        if payload.transcript.is_empty() {
            return StepStatus::Skipped("no transcript entries".to_string());
        }

        let full_text = payload
            .transcript
            .iter()
            .map(|entry| format!("{}: {}", entry.role, entry.message))
            .collect::<Vec<_>>()
            .join("\n");

        let transcript = NewTranscript {
            call_id: call.id,
            full_text,
            segments: serde_json::to_value(&payload.transcript).unwrap_or_default(),
            turn_count: payload.transcript.len() as i32,
        };

        match self.persistence.store_transcript(&transcript).await {
            Ok(Some(_)) => StepStatus::Completed,
            Ok(None) => StepStatus::Skipped("transcript already stored".to_string()),
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }

    async fn store_analytics(&self, parsed: Option<&ParsedAnalytics>, call: &Call) -> StepStatus {
        let Some(parsed) = parsed else {
            return StepStatus::Skipped("no analytics payload".to_string());
        };

        let stored = self.persistence.store_lead_analytics(call.id, &parsed.to_record()).await;

        // Caller fields fill independently of whether the row was new;
        // the update only touches NULL columns either way.
        if parsed.extracted_name.is_some() || parsed.extracted_email.is_some() {
            if let Err(e) = self
                .persistence
                .backfill_caller(
                    call.id,
                    parsed.extracted_name.as_deref(),
                    parsed.extracted_email.as_deref(),
                )
                .await
            {
                return StepStatus::Failed(format!("caller backfill: {e}"));
            }
        }

        match stored {
            Ok(Some(_)) => StepStatus::Completed,
            Ok(None) => StepStatus::Skipped("analytics already stored".to_string()),
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }

    async fn upsert_contact(&self, parsed: Option<&ParsedAnalytics>, call: &Call) -> StepStatus {
        let Some(phone_number) = call.phone_number.clone() else {
            return StepStatus::Skipped("no phone number".to_string());
        };

        let input = ContactUpsert {
            user_id: call.user_id,
            phone_number,
            name: parsed.and_then(|p| p.extracted_name.clone()),
            email: parsed.and_then(|p| p.extracted_email.clone()),
            company_name: parsed.and_then(|p| p.company_name.clone()),
            last_call_id: Some(call.id),
        };

        match self.contacts.upsert_by_phone(&input).await {
            Ok(_) => StepStatus::Completed,
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }

    async fn bill_call(&self, payload: &CanonicalWebhookPayload, call: &Call) -> StepStatus {
        if !payload.status.is_success() {
            return StepStatus::Skipped("call did not complete successfully".to_string());
        }
        if call.duration_minutes <= 0 {
            return StepStatus::Skipped("zero billable minutes".to_string());
        }

        let phone = call.phone_number.as_deref().unwrap_or("unknown");
        let description = format!("Call to {} - {} min", phone, call.duration_minutes);

        match self
            .billing
            .deduct_credits(call.user_id, call.duration_minutes, &description, call.id.0)
            .await
        {
            Ok(voxlead_core::storage::credits::DeductionOutcome::Applied { remaining }) => {
                debug!(call_id = %call.id, remaining, "credits deducted");
                StepStatus::Completed
            },
            Ok(voxlead_core::storage::credits::DeductionOutcome::AlreadyApplied) => {
                StepStatus::Skipped("call already charged".to_string())
            },
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }
}
