//! Core domain models and storage for the Voxlead backend.
//!
//! Provides strongly-typed domain primitives for calls, lead analytics,
//! contacts and credit accounting, the error taxonomy shared across the
//! ingestion pipeline, and the PostgreSQL repository layer. All other
//! crates depend on these foundational types for type safety and
//! consistency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, Result};
pub use events::{EventHandler, MulticastEventHandler, NoOpEventHandler, PipelineEvent};
pub use models::{
    Agent, AgentId, Call, CallId, CallStatus, Contact, ContactId, CreditTransaction, UserId,
};
pub use time::{Clock, RealClock};
