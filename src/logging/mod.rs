//! Logging for Passage
//!
//! Operational logging goes through `tracing`; security-relevant events
//! (denials, activation, grants, deliveries) additionally land in the JSONL
//! audit trail.

pub mod audit;

pub use audit::{AuditEvent, AuditKind, AuditLog};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `log_level` applies to this crate
/// and `info` to everything else. Library embedders that install their own
/// subscriber skip this.
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("passage={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
