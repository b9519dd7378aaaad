//! Repository for lead analytics rows.
//!
//! Lead analytics are 1:1 with calls. The `UNIQUE(call_id)` constraint is
//! what keeps a double-processed notification from inserting duplicate
//! analytics outside the call-level idempotency path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{CallId, LeadAnalyticsRecord},
};

/// Input for storing a lead analytics row.
///
/// Mirrors the parsed analytics record; the mapping from the parser's
/// output lives in the ingest crate to keep this layer free of parsing
/// concerns.
#[derive(Debug, Clone, Default)]
pub struct NewLeadAnalytics {
    /// Intent level label.
    pub intent_level: String,
    /// Intent score, 1-3 (0 for raw fallback).
    pub intent_score: i32,
    /// Urgency level label.
    pub urgency_level: String,
    /// Urgency score.
    pub urgency_score: i32,
    /// Budget constraint label.
    pub budget_constraint: String,
    /// Budget score.
    pub budget_score: i32,
    /// Fit alignment label.
    pub fit_alignment: String,
    /// Fit score.
    pub fit_score: i32,
    /// Engagement health label.
    pub engagement_health: String,
    /// Engagement score.
    pub engagement_score: i32,
    /// Capped total score.
    pub total_score: i32,
    /// Cold, Warm, Hot or Raw.
    pub lead_status_tag: String,
    /// Pricing CTA flag.
    pub cta_pricing_clicked: bool,
    /// Demo CTA flag.
    pub cta_demo_clicked: bool,
    /// Follow-up CTA flag.
    pub cta_followup_clicked: bool,
    /// Sample CTA flag.
    pub cta_sample_clicked: bool,
    /// Human escalation flag.
    pub cta_escalated_to_human: bool,
    /// Extracted caller name.
    pub extracted_name: Option<String>,
    /// Extracted caller email.
    pub extracted_email: Option<String>,
    /// Extracted company name.
    pub company_name: Option<String>,
    /// Dashboard notification line.
    pub smart_notification: Option<String>,
    /// Normalized demo booking instant.
    pub demo_book_datetime: Option<DateTime<Utc>>,
    /// Original string when parsing degraded to the raw tier.
    pub raw_analysis_data: Option<String>,
}

/// Repository for lead analytics rows.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Stores the analytics row for a call.
    ///
    /// Returns `None` when the call already has analytics (a redelivered
    /// webhook); the caller logs this and moves on.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn create(&self, call_id: CallId, analytics: &NewLeadAnalytics) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO lead_analytics (
                id, call_id,
                intent_level, intent_score,
                urgency_level, urgency_score,
                budget_constraint, budget_score,
                fit_alignment, fit_score,
                engagement_health, engagement_score,
                total_score, lead_status_tag,
                cta_pricing_clicked, cta_demo_clicked, cta_followup_clicked,
                cta_sample_clicked, cta_escalated_to_human,
                extracted_name, extracted_email, company_name, smart_notification,
                demo_book_datetime, raw_analysis_data
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25
            )
            ON CONFLICT (call_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(Uuid::new_v4())
        .bind(call_id)
        .bind(&analytics.intent_level)
        .bind(analytics.intent_score)
        .bind(&analytics.urgency_level)
        .bind(analytics.urgency_score)
        .bind(&analytics.budget_constraint)
        .bind(analytics.budget_score)
        .bind(&analytics.fit_alignment)
        .bind(analytics.fit_score)
        .bind(&analytics.engagement_health)
        .bind(analytics.engagement_score)
        .bind(analytics.total_score)
        .bind(&analytics.lead_status_tag)
        .bind(analytics.cta_pricing_clicked)
        .bind(analytics.cta_demo_clicked)
        .bind(analytics.cta_followup_clicked)
        .bind(analytics.cta_sample_clicked)
        .bind(analytics.cta_escalated_to_human)
        .bind(&analytics.extracted_name)
        .bind(&analytics.extracted_email)
        .bind(&analytics.company_name)
        .bind(&analytics.smart_notification)
        .bind(analytics.demo_book_datetime)
        .bind(&analytics.raw_analysis_data)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(id)
    }

    /// Finds the analytics row for a call.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_call_id(&self, call_id: CallId) -> Result<Option<LeadAnalyticsRecord>> {
        let record = sqlx::query_as::<_, LeadAnalyticsRecord>(
            r"
            SELECT id, call_id,
                   intent_level, intent_score,
                   urgency_level, urgency_score,
                   budget_constraint, budget_score,
                   fit_alignment, fit_score,
                   engagement_health, engagement_score,
                   total_score, lead_status_tag,
                   cta_pricing_clicked, cta_demo_clicked, cta_followup_clicked,
                   cta_sample_clicked, cta_escalated_to_human,
                   extracted_name, extracted_email, company_name, smart_notification,
                   demo_book_datetime, raw_analysis_data, created_at
            FROM lead_analytics
            WHERE call_id = $1
            ",
        )
        .bind(call_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(record)
    }
}
