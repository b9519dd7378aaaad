//! Voxlead webhook ingestion service.
//!
//! Main entry point for the Voxlead server. Initializes all subsystems
//! and coordinates graceful startup and shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use voxlead_api::{AppState, Config};
use voxlead_core::{storage::Storage, NoOpEventHandler, RealClock};
use voxlead_ingest::{collaborators::PostgresBackend, IngestPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting Voxlead ingestion service");

    let config = Config::load()?;
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        max_connections = config.database_max_connections,
        signature_verification = config.webhook_secret.is_some(),
        "Configuration loaded"
    );

    if config.webhook_secret.is_none() {
        tracing::warn!(
            "WEBHOOK_SECRET is not set: webhook signature verification is DISABLED. \
             Do not run this configuration outside local development."
        );
    }

    let db_pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    run_migrations(&db_pool).await?;
    info!("Database migrations completed");

    let storage = Storage::new(db_pool.clone());
    let backend = Arc::new(PostgresBackend::new(storage));
    let pipeline = Arc::new(IngestPipeline::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend,
        Arc::new(NoOpEventHandler::new()),
    ));
    let state = AppState::new(pipeline, config.webhook_secret.clone(), Arc::new(RealClock::new()));

    let addr = config.server_addr()?;
    let request_timeout = config.request_timeout;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = voxlead_api::start_server(state, addr, request_timeout).await {
            error!(error = %e, "Server failed");
        }
    });

    info!(addr = %addr, "Voxlead is ready to receive webhooks");

    server_handle.await.context("server task panicked")?;

    db_pool.close().await;
    info!("Database connections closed");

    info!("Voxlead shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,voxlead=debug,tower_http=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    let mut retries = 0;
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

/// Runs database migrations.
async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    // TODO: Use sqlx::migrate! macro once migrations are set up
    // For now, ensure tables exist

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email TEXT NOT NULL UNIQUE,
            credits INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL REFERENCES users(id),
            provider_agent_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create agents table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calls (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            conversation_id TEXT NOT NULL,
            agent_id UUID NOT NULL REFERENCES agents(id),
            user_id UUID NOT NULL REFERENCES users(id),
            phone_number TEXT,
            caller_name TEXT,
            caller_email TEXT,
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            duration_minutes INTEGER NOT NULL DEFAULT 0,
            credits_used INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE(conversation_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create calls table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS call_transcripts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            call_id UUID NOT NULL REFERENCES calls(id) ON DELETE CASCADE,
            full_text TEXT NOT NULL,
            segments JSONB NOT NULL DEFAULT '[]'::jsonb,
            turn_count INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE(call_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create call_transcripts table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lead_analytics (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            call_id UUID NOT NULL REFERENCES calls(id) ON DELETE CASCADE,
            intent_level TEXT NOT NULL DEFAULT 'Unknown',
            intent_score INTEGER NOT NULL DEFAULT 0,
            urgency_level TEXT NOT NULL DEFAULT 'Unknown',
            urgency_score INTEGER NOT NULL DEFAULT 0,
            budget_constraint TEXT NOT NULL DEFAULT 'Unknown',
            budget_score INTEGER NOT NULL DEFAULT 0,
            fit_alignment TEXT NOT NULL DEFAULT 'Unknown',
            fit_score INTEGER NOT NULL DEFAULT 0,
            engagement_health TEXT NOT NULL DEFAULT 'Unknown',
            engagement_score INTEGER NOT NULL DEFAULT 0,
            total_score INTEGER NOT NULL DEFAULT 0,
            lead_status_tag TEXT NOT NULL DEFAULT 'Raw',
            cta_pricing_clicked BOOLEAN NOT NULL DEFAULT FALSE,
            cta_demo_clicked BOOLEAN NOT NULL DEFAULT FALSE,
            cta_followup_clicked BOOLEAN NOT NULL DEFAULT FALSE,
            cta_sample_clicked BOOLEAN NOT NULL DEFAULT FALSE,
            cta_escalated_to_human BOOLEAN NOT NULL DEFAULT FALSE,
            extracted_name TEXT,
            extracted_email TEXT,
            company_name TEXT,
            smart_notification TEXT,
            demo_book_datetime TIMESTAMPTZ,
            raw_analysis_data TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE(call_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create lead_analytics table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL REFERENCES users(id),
            phone_number TEXT NOT NULL,
            name TEXT,
            email TEXT,
            company_name TEXT,
            not_connected_count INTEGER NOT NULL DEFAULT 0,
            last_call_id UUID REFERENCES calls(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE(user_id, phone_number)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create contacts table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credit_transactions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL REFERENCES users(id),
            amount INTEGER NOT NULL,
            description TEXT NOT NULL,
            reference_id UUID UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create credit_transactions table")?;

    Ok(())
}
