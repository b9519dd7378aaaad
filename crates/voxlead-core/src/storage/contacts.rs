//! Repository for per-user contacts.
//!
//! Contacts are keyed by `(user_id, phone_number)`. The pipeline only
//! touches the create-or-update surface; everything else about contacts is
//! owned by the CRM side of the application.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{CallId, Contact, ContactId, UserId},
};

/// Input for the contact create-or-update operation.
#[derive(Debug, Clone)]
pub struct ContactUpsert {
    /// Owning user.
    pub user_id: UserId,
    /// Phone number, the per-user key.
    pub phone_number: String,
    /// Name from analytics extraction, if any.
    pub name: Option<String>,
    /// Email from analytics extraction, if any.
    pub email: Option<String>,
    /// Company from analytics extraction, if any.
    pub company_name: Option<String>,
    /// The call that produced this update.
    pub last_call_id: Option<CallId>,
}

/// Repository for per-user contacts.
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

    /// Creates or updates the contact for a phone number.
    ///
    /// Extraction fields only fill gaps: a value already stored on the
    /// contact is never overwritten by a later call. `not_connected_count`
    /// belongs to the outbound dialer and is untouched here.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub async fn upsert_by_phone(&self, input: &ContactUpsert) -> Result<Contact> {
        let contact = sqlx::query_as::<_, Contact>(
            r"
            INSERT INTO contacts (
                id, user_id, phone_number, name, email, company_name, last_call_id
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7
            )
            ON CONFLICT (user_id, phone_number) DO UPDATE SET
                name         = COALESCE(contacts.name, EXCLUDED.name),
                email        = COALESCE(contacts.email, EXCLUDED.email),
                company_name = COALESCE(contacts.company_name, EXCLUDED.company_name),
                last_call_id = COALESCE(EXCLUDED.last_call_id, contacts.last_call_id),
                updated_at   = NOW()
            RETURNING id, user_id, phone_number, name, email, company_name,
                      not_connected_count, last_call_id, created_at, updated_at
            ",
        )
        .bind(ContactId::new())
        .bind(input.user_id)
        .bind(&input.phone_number)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.company_name)
        .bind(input.last_call_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(contact)
    }

    /// Finds a contact by user and phone number.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_phone(
        &self,
        user_id: UserId,
        phone_number: &str,
    ) -> Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            r"
            SELECT id, user_id, phone_number, name, email, company_name,
                   not_connected_count, last_call_id, created_at, updated_at
            FROM contacts
            WHERE user_id = $1 AND phone_number = $2
            ",
        )
        .bind(user_id)
        .bind(phone_number)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(contact)
    }
}
