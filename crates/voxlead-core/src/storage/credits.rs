//! Repository for the credit ledger.
//!
//! Deductions are idempotent per reference id: the transaction row carries
//! a unique index on `reference_id`, and the balance is only decremented
//! when that row actually inserts. A retried webhook therefore charges a
//! call exactly once no matter how many times billing runs.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{error::Result, models::UserId};

/// Outcome of a credit deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductionOutcome {
    /// Credits were deducted; carries the remaining balance.
    Applied {
        /// Balance after the deduction.
        remaining: i32,
    },

    /// A transaction with this reference id already exists; nothing was
    /// charged.
    AlreadyApplied,
}

/// Repository for the credit ledger.
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

    /// Deducts credits from a user, at most once per reference id.
    ///
    /// Inserts the ledger row and decrements the balance in one database
    /// transaction. When the reference id has already been charged the
    /// insert is a no-op and the balance is left alone.
    ///
    /// # Errors
    ///
    /// Returns error if the transaction fails or the user row is missing.
    pub async fn deduct(
        &self,
        user_id: UserId,
        amount: i32,
        description: &str,
        reference_id: Uuid,
    ) -> Result<DeductionOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            r"
            INSERT INTO credit_transactions (id, user_id, amount, description, reference_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (reference_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(-amount)
        .bind(description)
        .bind(reference_id)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.rollback().await?;
            return Ok(DeductionOutcome::AlreadyApplied);
        }

        let remaining: i32 = sqlx::query_scalar(
            r"
            UPDATE users
            SET credits = credits - $2, updated_at = NOW()
            WHERE id = $1
            RETURNING credits
            ",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(DeductionOutcome::Applied { remaining })
    }

    /// Returns a user's current credit balance.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if the user does not exist.
    pub async fn balance(&self, user_id: UserId) -> Result<i32> {
        let balance: i32 = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&*self.pool)
            .await?;

        Ok(balance)
    }
}
