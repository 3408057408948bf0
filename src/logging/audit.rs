//! Audit trail for release and access events
//!
//! Writes security-relevant events in JSONL format: every verification
//! denial, the activation transition, grant issuance and revocation, and
//! each letter delivery outcome. Without an initialized file the log is a
//! no-op; audit failures never fail the operation being audited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// An access request failed verification
    VerifyDenied,
    /// The one-way activation transition happened
    ReleaseActivated,
    /// An access grant was issued to a verified executor
    GrantIssued,
    /// An access grant was explicitly revoked
    GrantRevoked,
    /// A letter was delivered and marked
    LetterDelivered,
    /// A letter delivery attempt failed
    LetterFailed,
}

/// One audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Event type
    pub kind: AuditKind,
    /// Node that handled the request
    pub node_id: String,
    /// Owner whose vault was involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Executor identity email, when the event has a requester
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor_email: Option<String>,
    /// Contact document id involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Letter document id involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter: Option<String>,
    /// Free-form detail (denial reason, failure message, granted scopes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(kind: AuditKind, node_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            node_id,
            owner_id: None,
            executor_email: None,
            contact: None,
            letter: None,
            detail: None,
        }
    }

    /// Set the owner id
    pub fn with_owner(mut self, owner_id: String) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Set the executor email
    pub fn with_executor(mut self, email: String) -> Self {
        self.executor_email = Some(email);
        self
    }

    /// Set the contact id
    pub fn with_contact(mut self, contact: String) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Set the letter id
    pub fn with_letter(mut self, letter: String) -> Self {
        self.letter = Some(letter);
        self
    }

    /// Set the detail text
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audit logger that writes events to a JSONL file
#[derive(Clone)]
pub struct AuditLog {
    inner: Arc<Mutex<AuditLogInner>>,
    node_id: String,
}

struct AuditLogInner {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Create a new audit log (no-op until a file is initialized)
    pub fn new(node_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AuditLogInner {
                writer: None,
                path: None,
            })),
            node_id,
        }
    }

    /// Initialize file logging to the specified path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = BufWriter::new(file);

        let mut inner = self.inner.lock().await;
        inner.writer = Some(writer);
        inner.path = Some(path.clone());

        info!("Audit logging initialized to {}", path.display());
        Ok(())
    }

    /// Log an audit event
    pub async fn log(&self, event: AuditEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;

        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write audit event: {}", e);
            }
            // Flush per event; the audit trail is worth the write
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }

    /// Log a verification denial
    pub async fn log_verify_denied(&self, owner_id: &str, executor_email: &str, reason: &str) {
        let event = AuditEvent::new(AuditKind::VerifyDenied, self.node_id.clone())
            .with_owner(owner_id.to_string())
            .with_executor(executor_email.to_string())
            .with_detail(reason.to_string());

        self.log(event).await;
    }

    /// Log the activation transition
    pub async fn log_release_activated(&self, owner_id: &str, executor_email: &str) {
        let event = AuditEvent::new(AuditKind::ReleaseActivated, self.node_id.clone())
            .with_owner(owner_id.to_string())
            .with_executor(executor_email.to_string());

        self.log(event).await;
    }

    /// Log grant issuance
    pub async fn log_grant_issued(&self, owner_id: &str, contact: &str, scopes: &str) {
        let event = AuditEvent::new(AuditKind::GrantIssued, self.node_id.clone())
            .with_owner(owner_id.to_string())
            .with_contact(contact.to_string())
            .with_detail(scopes.to_string());

        self.log(event).await;
    }

    /// Log grant revocation
    pub async fn log_grant_revoked(&self, owner_id: &str) {
        let event = AuditEvent::new(AuditKind::GrantRevoked, self.node_id.clone())
            .with_owner(owner_id.to_string());

        self.log(event).await;
    }

    /// Log a completed letter delivery
    pub async fn log_letter_delivered(&self, owner_id: &str, letter: &str) {
        let event = AuditEvent::new(AuditKind::LetterDelivered, self.node_id.clone())
            .with_owner(owner_id.to_string())
            .with_letter(letter.to_string());

        self.log(event).await;
    }

    /// Log a failed letter delivery attempt
    pub async fn log_letter_failed(&self, owner_id: &str, letter: &str, detail: &str) {
        let event = AuditEvent::new(AuditKind::LetterFailed, self.node_id.clone())
            .with_owner(owner_id.to_string())
            .with_letter(letter.to_string())
            .with_detail(detail.to_string());

        self.log(event).await;
    }

    /// Get the node ID
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(AuditKind::VerifyDenied, "node-1".to_string())
            .with_owner("owner-1".to_string())
            .with_executor("jordan@example.com".to_string())
            .with_detail("unlock code does not match".to_string());

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("verify_denied"));
        assert!(jsonl.contains("owner-1"));
        assert!(jsonl.contains("jordan@example.com"));
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let event = AuditEvent::new(AuditKind::ReleaseActivated, "node-1".to_string())
            .with_owner("owner-1".to_string());

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("release_activated"));
        assert!(!jsonl.contains("letter"));
        assert!(!jsonl.contains("detail"));
    }

    #[tokio::test]
    async fn test_logging_without_file_is_noop() {
        let log = AuditLog::new("node-1".to_string());
        // Should not panic or error
        log.log_grant_revoked("owner-1").await;
    }

    #[tokio::test]
    async fn test_file_logging_appends_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");

        let log = AuditLog::new("node-1".to_string());
        log.init_file(path.clone()).await.unwrap();

        log.log_release_activated("owner-1", "jordan@example.com").await;
        log.log_letter_delivered("owner-1", "abc123").await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("release_activated"));
        assert!(lines[1].contains("letter_delivered"));
    }
}
