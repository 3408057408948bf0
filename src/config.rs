//! Configuration for Passage
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::release::ReleaseConfig;

/// Passage - release activation and executor access for the legacy vault
#[derive(Parser, Debug, Clone)]
#[command(name = "passage")]
#[command(about = "Release activation and executor access control for the Passage legacy vault")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "passage")]
    pub mongodb_db: String,

    /// Enable development mode (in-memory store, letter sends are logged only)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Webhook endpoint for letter delivery (required in production)
    #[arg(long, env = "NOTIFY_URL")]
    pub notify_url: Option<String>,

    /// Access grant lifetime in seconds
    #[arg(long, env = "GRANT_TTL_SECS", default_value = "14400")]
    pub grant_ttl_secs: u64,

    /// Per-letter send timeout in milliseconds
    #[arg(long, env = "SEND_TIMEOUT_MS", default_value = "10000")]
    pub send_timeout_ms: u64,

    /// Digits in generated unlock codes
    #[arg(long, env = "UNLOCK_CODE_LEN", default_value = "6")]
    pub unlock_code_len: usize,

    /// JSONL audit log file (audit events go to tracing only when unset)
    #[arg(long, env = "AUDIT_LOG_PATH")]
    pub audit_log_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Per-letter send timeout as a Duration
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Release pipeline settings derived from these arguments
    pub fn release_config(&self) -> ReleaseConfig {
        ReleaseConfig {
            node_id: self.node_id.to_string(),
            grant_ttl_secs: self.grant_ttl_secs,
            send_timeout: self.send_timeout(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.notify_url.is_none() {
            return Err("NOTIFY_URL is required in production mode".to_string());
        }

        if self.grant_ttl_secs == 0 {
            return Err("GRANT_TTL_SECS must be greater than zero".to_string());
        }

        if self.send_timeout_ms == 0 {
            return Err("SEND_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.unlock_code_len < 4 {
            return Err("UNLOCK_CODE_LEN must be at least 4 digits".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> Args {
        Args::parse_from(["passage"])
    }

    #[test]
    fn test_defaults_validate_in_dev_mode() {
        let mut args = default_args();
        args.dev_mode = true;

        assert!(args.validate().is_ok());
        assert_eq!(args.grant_ttl_secs, 14_400);
        assert_eq!(args.send_timeout(), Duration::from_secs(10));
        assert_eq!(args.unlock_code_len, 6);
    }

    #[test]
    fn test_production_requires_notify_url() {
        let args = default_args();
        assert!(args.validate().is_err());

        let mut with_url = default_args();
        with_url.notify_url = Some("https://notify.example.com/letters".to_string());
        assert!(with_url.validate().is_ok());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut args = default_args();
        args.dev_mode = true;

        args.grant_ttl_secs = 0;
        assert!(args.validate().is_err());

        args.grant_ttl_secs = 1;
        args.send_timeout_ms = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_short_code_length_rejected() {
        let mut args = default_args();
        args.dev_mode = true;
        args.unlock_code_len = 3;

        assert!(args.validate().is_err());
    }
}
