//! Integration tests for the ingestion pipeline over the in-memory
//! backend.
//!
//! Exercises idempotent upserting, partial-failure isolation, billing
//! gating and the analytics flow without a database, in the same spirit
//! as the collaborator trait was introduced for.

use std::sync::Arc;

use voxlead_core::{CallStatus, NoOpEventHandler};
use voxlead_ingest::{
    collaborators::mock::InMemoryBackend,
    normalize::normalize,
    pipeline::{IngestPipeline, Step, StepStatus},
    IngestError, ParseTier,
};
use voxlead_testing::{sample_analytics, test_agent, NotificationBuilder, WireShape};

fn pipeline_over(backend: &Arc<InMemoryBackend>) -> IngestPipeline {
    IngestPipeline::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        Arc::new(NoOpEventHandler::new()),
    )
}

#[tokio::test]
async fn duplicate_delivery_yields_single_mutated_call() {
    let backend = Arc::new(InMemoryBackend::new());
    let agent = test_agent("agent_prov_test");
    backend.add_agent(agent.clone()).await;
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new().conversation("conv_dup_001").build();
    let payload = normalize(&notification).expect("normalize");

    let first = pipeline.process(payload.clone()).await.expect("first delivery");
    let second = pipeline.process(payload).await.expect("second delivery");

    assert_eq!(backend.call_count().await, 1);
    assert_eq!(first.call_id, second.call_id);

    let call = backend.call_for("conv_dup_001").await.expect("call row");
    assert_eq!(call.status, CallStatus::Completed);
    assert_eq!(call.duration_minutes, 2);

    // The second delivery must not double-charge.
    assert_eq!(backend.deductions().await.len(), 1);
    assert_eq!(
        second.step_status(Step::Billing),
        Some(&StepStatus::Skipped("call already charged".to_string()))
    );
}

#[tokio::test]
async fn failing_contact_step_leaves_call_and_analytics_committed() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    backend.fail_contacts(true);
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new()
        .conversation("conv_iso_001")
        .analysis(sample_analytics())
        .build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("processing succeeds overall");

    assert!(matches!(report.step_status(Step::Contact), Some(StepStatus::Failed(_))));

    // The call and analytics rows are committed despite the failure.
    let call = backend.call_for("conv_iso_001").await.expect("call row");
    assert!(backend.analytics_for(call.id).await.is_some());

    // Later steps still ran.
    assert_eq!(report.step_status(Step::Billing), Some(&StepStatus::Completed));
    assert_eq!(backend.deductions().await.len(), 1);
}

#[tokio::test]
async fn error_status_never_triggers_billing() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new()
        .conversation("conv_err_001")
        .status("error")
        .duration_seconds(500)
        .build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("process");

    assert_eq!(report.call_status, CallStatus::Failed);
    assert!(backend.deductions().await.is_empty());
    assert!(matches!(report.step_status(Step::Billing), Some(StepStatus::Skipped(_))));
}

#[tokio::test]
async fn zero_duration_is_not_billed() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let pipeline = pipeline_over(&backend);

    let notification =
        NotificationBuilder::new().conversation("conv_zero_001").duration_seconds(0).build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("process");

    assert!(backend.deductions().await.is_empty());
    assert_eq!(
        report.step_status(Step::Billing),
        Some(&StepStatus::Skipped("zero billable minutes".to_string()))
    );
}

#[tokio::test]
async fn unknown_agent_aborts_before_any_side_effect() {
    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new().agent("agent_prov_unregistered").build();
    let payload = normalize(&notification).expect("normalize");

    let err = pipeline.process(payload).await.unwrap_err();
    assert!(matches!(err, IngestError::AgentNotFound { .. }));

    assert_eq!(backend.call_count().await, 0);
    assert!(backend.deductions().await.is_empty());
}

#[tokio::test]
async fn billing_description_and_amount_follow_duration() {
    let backend = Arc::new(InMemoryBackend::new());
    let agent = test_agent("agent_prov_test");
    backend.add_agent(agent.clone()).await;
    backend.set_balance(agent.user_id, 100).await;
    let pipeline = pipeline_over(&backend);

    let notification =
        NotificationBuilder::new().conversation("conv_bill_001").duration_seconds(61).build();
    let payload = normalize(&notification).expect("normalize");

    pipeline.process(payload).await.expect("process");

    let deductions = backend.deductions().await;
    assert_eq!(deductions.len(), 1);
    assert_eq!(deductions[0].amount, 2);
    assert_eq!(deductions[0].description, "Call to +15551230001 - 2 min");
    assert_eq!(deductions[0].user_id, agent.user_id);
    assert_eq!(backend.balance(agent.user_id).await, 98);
}

#[tokio::test]
async fn transcript_stored_with_role_prefixed_lines() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new()
        .conversation("conv_tx_001")
        .transcript(&[("agent", "Hello!", 0.0), ("user", "Hi there.", 2.0)])
        .build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("process");
    assert_eq!(report.step_status(Step::Transcript), Some(&StepStatus::Completed));

    let call = backend.call_for("conv_tx_001").await.expect("call");
    let transcript = backend.transcript_for(call.id).await.expect("transcript");
    assert_eq!(transcript.full_text, "agent: Hello!\nuser: Hi there.");
    assert_eq!(transcript.turn_count, 2);
}

#[tokio::test]
async fn contact_created_from_extraction_and_caller_backfilled() {
    let backend = Arc::new(InMemoryBackend::new());
    let agent = test_agent("agent_prov_test");
    backend.add_agent(agent.clone()).await;
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new()
        .conversation("conv_contact_001")
        .analysis(sample_analytics())
        .build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("process");
    assert_eq!(report.step_status(Step::Contact), Some(&StepStatus::Completed));

    let contact =
        backend.contact_for(agent.user_id, "+15551230001").await.expect("contact created");
    assert_eq!(contact.name.as_deref(), Some("Priya Sharma"));
    assert_eq!(contact.email.as_deref(), Some("priya@acme.example"));
    assert_eq!(contact.company_name.as_deref(), Some("Acme Industries"));

    let call = backend.call_for("conv_contact_001").await.expect("call");
    assert_eq!(contact.last_call_id, Some(call.id));
    assert_eq!(call.caller_name.as_deref(), Some("Priya Sharma"));
    assert_eq!(call.caller_email.as_deref(), Some("priya@acme.example"));
}

#[tokio::test]
async fn contact_skipped_without_phone_number() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new().conversation("conv_nophone").phone(None).build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("process");
    assert!(matches!(report.step_status(Step::Contact), Some(StepStatus::Skipped(_))));
}

#[tokio::test]
async fn short_conversation_caps_stored_score() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let pipeline = pipeline_over(&backend);

    // Two turns only; category scores sum to 13.
    let notification = NotificationBuilder::new()
        .conversation("conv_cap_001")
        .transcript(&[("agent", "Hello!", 0.0), ("user", "Bye.", 1.0)])
        .analysis(
            r#"{"intent_score": 3, "urgency_score": 2, "budget_score": 3,
                "fit_score": 3, "engagement_score": 2, "cta_demo_clicked": true}"#,
        )
        .build();
    let payload = normalize(&notification).expect("normalize");

    pipeline.process(payload).await.expect("process");

    let call = backend.call_for("conv_cap_001").await.expect("call");
    let analytics = backend.analytics_for(call.id).await.expect("analytics");
    assert_eq!(analytics.total_score, 9);
    assert_eq!(analytics.lead_status_tag, "Warm");
}

#[tokio::test]
async fn raw_fallback_analytics_still_stored() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new()
        .conversation("conv_raw_001")
        .analysis("not json at all {{{")
        .build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("process");
    assert_eq!(report.parse_tier, Some(ParseTier::RawFallback));
    assert_eq!(report.step_status(Step::LeadAnalytics), Some(&StepStatus::Completed));

    let call = backend.call_for("conv_raw_001").await.expect("call");
    let analytics = backend.analytics_for(call.id).await.expect("analytics");
    assert_eq!(analytics.lead_status_tag, "Raw");
    assert_eq!(analytics.total_score, 0);
    assert_eq!(analytics.raw_analysis_data.as_deref(), Some("not json at all {{{"));
}

#[tokio::test]
async fn legacy_shape_processes_end_to_end() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new()
        .shape(WireShape::Legacy)
        .conversation("conv_legacy_001")
        .duration_seconds(125)
        .analysis("{'total_score': 10, 'lead_status_tag': 'Warm'}")
        .build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("process");
    assert_eq!(report.parse_tier, Some(ParseTier::QuoteSwapped));

    let call = backend.call_for("conv_legacy_001").await.expect("call");
    assert_eq!(call.duration_minutes, 3);
    assert_eq!(call.credits_used, 3);

    let analytics = backend.analytics_for(call.id).await.expect("analytics");
    // No demo or follow-up CTA fired, so the payload's total of 10 is
    // clipped to the engagement cap before storage.
    assert_eq!(analytics.total_score, 9);
    assert_eq!(analytics.lead_status_tag, "Warm");
}

#[tokio::test]
async fn every_side_effect_failing_still_returns_a_report() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    backend.fail_transcripts(true);
    backend.fail_analytics(true);
    backend.fail_contacts(true);
    backend.fail_billing(true);
    let pipeline = pipeline_over(&backend);

    let notification = NotificationBuilder::new()
        .conversation("conv_allfail_001")
        .analysis(sample_analytics())
        .build();
    let payload = normalize(&notification).expect("normalize");

    let report = pipeline.process(payload).await.expect("pipeline still succeeds");
    assert_eq!(report.failed_steps().len(), 4);
    assert_eq!(backend.call_count().await, 1);
}
