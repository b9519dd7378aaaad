//! HTTP surface for the Voxlead webhook ingestion service.
//!
//! Provides the Axum router, configuration loading, and the webhook and
//! health handlers. The HTTP layer performs no business logic beyond
//! glue: it verifies, normalizes, hands off to the pipeline, and maps the
//! outcome to an acknowledgment the voice provider understands.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod server;
pub mod state;

pub use config::Config;
pub use handlers::SIGNATURE_HEADER;
pub use server::{create_router, start_server};
pub use state::AppState;
