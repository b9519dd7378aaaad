//! Test infrastructure and fixture builders for deterministic testing.
//!
//! Provides builders for webhook notification payloads in both historical
//! wire shapes, signed-header helpers, and agent fixtures. Integration
//! tests across the workspace share these so payload drift stays in one
//! place.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;

pub use fixtures::{sample_analytics, signed_header, test_agent, NotificationBuilder, WireShape};
