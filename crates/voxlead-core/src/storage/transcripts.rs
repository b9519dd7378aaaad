//! Repository for call transcript storage.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{error::Result, models::CallId};

/// Input for storing a transcript.
#[derive(Debug, Clone)]
pub struct NewTranscript {
    /// The call this transcript belongs to.
    pub call_id: CallId,
    /// Full `"{role}: {message}"` text joined by newlines.
    pub full_text: String,
    /// Per-turn segments with in-call timestamps.
    pub segments: serde_json::Value,
    /// Number of conversation turns.
    pub turn_count: i32,
}

/// Repository for call transcript storage.
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

    /// Stores a transcript for a call.
    ///
    /// Transcripts are 1:1 with calls; a redelivered webhook that reaches
    /// this step again hits the unique constraint and is reported as
    /// `None` rather than an error.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails for any reason other than the
    /// call already having a transcript.
    pub async fn create(&self, transcript: &NewTranscript) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO call_transcripts (id, call_id, full_text, segments, turn_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (call_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(Uuid::new_v4())
        .bind(transcript.call_id)
        .bind(&transcript.full_text)
        .bind(sqlx::types::Json(&transcript.segments))
        .bind(transcript.turn_count)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(id)
    }

    /// Finds the transcript for a call.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_call_id(&self, call_id: CallId) -> Result<Option<crate::models::CallTranscript>> {
        let transcript = sqlx::query_as(
            r"
            SELECT id, call_id, full_text, segments, turn_count, created_at
            FROM call_transcripts
            WHERE call_id = $1
            ",
        )
        .bind(call_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(transcript)
    }
}
