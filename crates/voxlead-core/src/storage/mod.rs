//! Database access layer implementing the repository pattern for call
//! persistence.
//!
//! The repository layer acts as an anti-corruption layer, translating
//! between domain models and database schemas. This isolation allows schema
//! evolution without breaking domain logic.
//!
//! All database operations MUST go through these repositories. Direct SQL
//! queries outside this module are forbidden to maintain consistency.

use std::sync::Arc;

use sqlx::PgPool;

pub mod agents;
pub mod calls;
pub mod contacts;
pub mod credits;
pub mod lead_analytics;
pub mod transcripts;

use crate::error::Result;

/// Container for all repository instances providing unified database access.
///
/// `Storage` is the entry point for all database operations in Voxlead. It
/// manages a shared connection pool and provides type-safe access to each
/// domain repository.
#[derive(Clone)]
pub struct Storage {
    /// Repository for agent directory lookups.
    pub agents: Arc<agents::Repository>,

    /// Repository for call record operations.
    pub calls: Arc<calls::Repository>,

    /// Repository for call transcripts.
    pub transcripts: Arc<transcripts::Repository>,

    /// Repository for lead analytics rows.
    pub lead_analytics: Arc<lead_analytics::Repository>,

    /// Repository for per-user contacts.
    pub contacts: Arc<contacts::Repository>,

    /// Repository for the credit ledger.
    pub credits: Arc<credits::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    ///
    /// All repositories share the same pool with Arc for efficient resource
    /// usage.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self {
            agents: Arc::new(agents::Repository::new(pool.clone())),
            calls: Arc::new(calls::Repository::new(pool.clone())),
            transcripts: Arc::new(transcripts::Repository::new(pool.clone())),
            lead_analytics: Arc::new(lead_analytics::Repository::new(pool.clone())),
            contacts: Arc::new(contacts::Repository::new(pool.clone())),
            credits: Arc::new(credits::Repository::new(pool)),
        }
    }

    /// Performs a health check on the database connection.
    ///
    /// Executes a simple query to verify database connectivity. Used by
    /// the health endpoint for readiness probes.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy or
    /// the query times out.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.calls.pool()).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn storage_can_be_created() {
        // This test verifies the Storage struct can be instantiated
        // Actual database testing happens in integration tests
        let pool = sqlx::PgPool::connect_lazy("postgresql://test").unwrap();
        let _storage = Storage::new(pool);
    }
}
