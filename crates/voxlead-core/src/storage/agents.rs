//! Repository for agent directory lookups.
//!
//! The agent CRUD surface lives outside this system; the pipeline only
//! needs to resolve a provider agent id to the internal agent and its
//! owning user before anything can be billed or attributed.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{Agent, AgentId},
};

/// Repository for agent directory lookups.
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

    /// Finds an agent by the voice provider's agent id.
    ///
    /// Returns `None` when no agent is registered under that provider id,
    /// which aborts the pipeline before any side effects run.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_provider_id(&self, provider_agent_id: &str) -> Result<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>(
            r"
            SELECT id, user_id, provider_agent_id, name
            FROM agents
            WHERE provider_agent_id = $1
            ",
        )
        .bind(provider_agent_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(agent)
    }

    /// Finds an agent by internal id.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if no such agent exists.
    pub async fn find(&self, id: AgentId) -> Result<Agent> {
        let agent = sqlx::query_as::<_, Agent>(
            r"
            SELECT id, user_id, provider_agent_id, name
            FROM agents
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(agent)
    }
}
