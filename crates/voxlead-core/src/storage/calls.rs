//! Repository for call record database operations.
//!
//! The call row is the idempotency anchor for webhook processing: it is
//! unique per provider conversation id and written with an atomic
//! insert-or-update so that concurrent duplicate deliveries for the same
//! conversation can never produce two rows.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{AgentId, Call, CallId, CallStatus, UserId},
};

/// Input for the atomic call upsert.
///
/// Duration and credit fields arrive pre-computed by the upserter; the
/// repository never derives billing math itself.
#[derive(Debug, Clone)]
pub struct CallUpsert {
    /// Provider conversation id, the unique key.
    pub conversation_id: String,
    /// Resolved internal agent.
    pub agent_id: AgentId,
    /// Owning user.
    pub user_id: UserId,
    /// Caller phone number, if reported.
    pub phone_number: Option<String>,
    /// Reported duration in seconds.
    pub duration_seconds: i32,
    /// Billing minutes, `ceil(duration_seconds / 60)`.
    pub duration_minutes: i32,
    /// Credits to record against the call.
    pub credits_used: i32,
    /// Status derived from the notification.
    pub status: CallStatus,
    /// Provider metadata blob for this delivery.
    pub metadata: serde_json::Value,
}

/// Repository for call record database operations.
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

    /// Inserts or updates the call for a conversation in one statement.
    ///
    /// On conflict the existing row is mutated in place: duration, credits
    /// and status are recomputed from the latest notification, the phone
    /// number is kept when the new delivery omits it, and the metadata
    /// blobs are merged with new keys overlaying old ones. Previously
    /// stored metadata keys are never dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub async fn upsert(&self, input: &CallUpsert) -> Result<Call> {
        let call = sqlx::query_as::<_, Call>(
            r"
            INSERT INTO calls (
                id, conversation_id, agent_id, user_id, phone_number,
                duration_seconds, duration_minutes, credits_used, status, metadata
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            )
            ON CONFLICT (conversation_id) DO UPDATE SET
                phone_number     = COALESCE(EXCLUDED.phone_number, calls.phone_number),
                duration_seconds = EXCLUDED.duration_seconds,
                duration_minutes = EXCLUDED.duration_minutes,
                credits_used     = EXCLUDED.credits_used,
                status           = EXCLUDED.status,
                metadata         = calls.metadata || EXCLUDED.metadata,
                updated_at       = NOW()
            RETURNING id, conversation_id, agent_id, user_id, phone_number,
                      caller_name, caller_email, duration_seconds, duration_minutes,
                      credits_used, status, metadata, created_at, updated_at
            ",
        )
        .bind(CallId::new())
        .bind(&input.conversation_id)
        .bind(input.agent_id)
        .bind(input.user_id)
        .bind(&input.phone_number)
        .bind(input.duration_seconds)
        .bind(input.duration_minutes)
        .bind(input.credits_used)
        .bind(input.status.to_string())
        .bind(sqlx::types::Json(&input.metadata))
        .fetch_one(&*self.pool)
        .await?;

        Ok(call)
    }

    /// Finds a call by provider conversation id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_conversation_id(&self, conversation_id: &str) -> Result<Option<Call>> {
        let call = sqlx::query_as::<_, Call>(
            r"
            SELECT id, conversation_id, agent_id, user_id, phone_number,
                   caller_name, caller_email, duration_seconds, duration_minutes,
                   credits_used, status, metadata, created_at, updated_at
            FROM calls
            WHERE conversation_id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(call)
    }

    /// Fills caller name and email from analytics extraction.
    ///
    /// Only populates fields that are still NULL; the extraction step never
    /// overwrites data that is already set.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn backfill_caller(
        &self,
        call_id: CallId,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE calls
            SET caller_name  = COALESCE(caller_name, $2),
                caller_email = COALESCE(caller_email, $3),
                updated_at   = NOW()
            WHERE id = $1
            ",
        )
        .bind(call_id)
        .bind(name)
        .bind(email)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }
}
