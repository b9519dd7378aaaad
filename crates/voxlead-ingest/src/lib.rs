//! Webhook ingestion and lead-analytics parsing pipeline.
//!
//! This crate implements the core of the Voxlead backend: it takes a raw
//! "call completed" notification from the voice provider and turns it into
//! a durable call record plus a chain of best-effort side effects
//! (transcript, lead analytics, contact, billing).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌───────────────┐
//! │ Endpoint │──▶│ Signature │──▶│ Normalizer │──▶│ Call Upserter │
//! └──────────┘   │ Verifier  │   └────────────┘   └───────┬───────┘
//!                └───────────┘                            │ mandatory
//!                                                         ▼
//!                ┌───────────────────┐        ┌─────────────────────┐
//!                │ Analytics Parser  │───────▶│ Side-Effect Steps   │
//!                │ (four tiers)      │        │ transcript/analytics│
//!                └───────────────────┘        │ contact/billing     │
//!                                             └─────────────────────┘
//! ```
//!
//! # Key Properties
//!
//! - **Idempotent** - repeat delivery for a conversation mutates, never
//!   duplicates, the call record
//! - **Never-fail parsing** - the analytics parser always returns a record,
//!   degrading to a raw-preserving fallback on garbage input
//! - **Partial-failure isolation** - one failing side effect never rolls
//!   back the others
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use voxlead_core::NoOpEventHandler;
//! use voxlead_ingest::{collaborators::mock::InMemoryBackend, IngestPipeline};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let backend = Arc::new(InMemoryBackend::new());
//! let pipeline = IngestPipeline::new(
//!     backend.clone(),
//!     backend.clone(),
//!     backend.clone(),
//!     backend,
//!     Arc::new(NoOpEventHandler::new()),
//! );
//!
//! let payload = voxlead_ingest::normalize::normalize(&serde_json::json!({
//!     "conversation_id": "conv_001",
//!     "agent_id": "agent_provider_001",
//!     "status": "done",
//!     "duration_seconds": 61,
//! }))?;
//! let report = pipeline.process(payload).await?;
//! println!("processed call {}", report.call_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analytics;
pub mod collaborators;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod signature;
pub mod tolerant;
pub mod upsert;

pub use analytics::{ParseTier, ParsedAnalytics};
pub use error::{IngestError, Result};
pub use normalize::{CanonicalWebhookPayload, NotificationStatus};
pub use pipeline::{IngestPipeline, ProcessingReport, Step, StepStatus};
pub use signature::{verify_signature, SignatureFailure, VerifyResult};

/// Replay window for webhook signatures, in seconds.
///
/// Timestamps older or newer than this are rejected in both directions.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Maximum accepted webhook payload size in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;
