//! Audit trail and recipient resolution integration tests
//!
//! Runs the release pipeline with a JSONL audit file attached and checks:
//! - every denial, activation, grant, and letter outcome leaves a line
//! - linked contacts are the canonical recipient, free-text is the fallback
//! - letters without any usable recipient are recorded as failed

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use passage::db::schemas::{ContactDoc, ContactStatus, LetterDoc, LetterTrigger};
use passage::notify::LetterSender;
use passage::release::{AccessRequest, Activation, ReleaseConfig, ReleaseService};
use passage::store::MemoryVaultStore;
use passage::types::PassageError;

const CODE: &str = "482913";
const EXECUTOR_EMAIL: &str = "jordan@example.com";

/// Sender that records recipients and fails a configured one
struct RecordingSender {
    sent: Mutex<Vec<String>>,
    fail_for: Option<String>,
}

impl RecordingSender {
    fn new(fail_for: Option<&str>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: fail_for.map(str::to_string),
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LetterSender for RecordingSender {
    async fn send(&self, recipient: &str, _subject: &str, _body: &str) -> passage::Result<()> {
        if self.fail_for.as_deref() == Some(recipient) {
            return Err(PassageError::Notify("mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(recipient.to_string());
        Ok(())
    }
}

fn executor_contact(owner: &str, email: &str) -> ContactDoc {
    let mut contact = ContactDoc::new(owner.to_string(), "Jordan Reyes".to_string(), email.to_string());
    contact.status = ContactStatus::Accepted;
    contact.is_executor = true;
    contact
}

fn after_death_letter(owner: &str, subject: &str) -> LetterDoc {
    LetterDoc::new(
        owner.to_string(),
        subject.to_string(),
        "The words themselves.".to_string(),
        LetterTrigger::AfterDeath,
    )
}

fn request(owner: &str, email: &str, code: &str) -> AccessRequest {
    AccessRequest::new(owner.to_string(), email.to_string(), code.to_string())
}

fn read_events(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn kinds_of(events: &[Value], kind: &str) -> Vec<Value> {
    events
        .iter()
        .filter(|e| e["kind"] == kind)
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_full_flow_writes_complete_audit_trail() {
    let dir = TempDir::new().unwrap();
    let audit_path = dir.path().join("audit.jsonl");

    let store = Arc::new(MemoryVaultStore::new());
    let sender = RecordingSender::new(Some("mia@example.com"));
    let service = ReleaseService::new(
        Arc::clone(&store),
        Arc::new(sender),
        ReleaseConfig {
            node_id: "audit-node".to_string(),
            ..ReleaseConfig::default()
        },
    );
    service.audit().init_file(audit_path.clone()).await.unwrap();

    let contact_id = store.seed_contact(executor_contact("owner-1", EXECUTOR_EMAIL));
    service.configure_lock("owner-1", contact_id, CODE).await.unwrap();

    let mut delivered_letter = after_death_letter("owner-1", "To my sister");
    delivered_letter.recipient_email = Some("rosa@example.com".to_string());
    store.seed_letter(delivered_letter);

    let mut failing_letter = after_death_letter("owner-1", "To Mia");
    failing_letter.recipient_email = Some("mia@example.com".to_string());
    store.seed_letter(failing_letter);

    // One denied attempt before the real one
    let denied = service
        .verify_executor_access(request("owner-1", EXECUTOR_EMAIL, "000000"))
        .await;
    assert!(denied.is_err());

    let access = service
        .verify_executor_access(request("owner-1", EXECUTOR_EMAIL, CODE))
        .await
        .unwrap();
    match access.activation {
        Activation::Triggered(handle) => {
            let summary = handle.await.unwrap();
            assert_eq!(summary.delivered, 1);
            assert_eq!(summary.send_failed, 1);
        }
        Activation::AlreadyActive => panic!("first verification must activate"),
    }

    assert!(service.revoke_grant(&access.grant.token).await.unwrap());

    let events = read_events(&audit_path);
    assert_eq!(events.len(), 6);

    // The denial is chronologically first and carries the reason
    assert_eq!(events[0]["kind"], "verify_denied");
    assert_eq!(events[0]["detail"], "unlock code does not match");
    assert_eq!(events[0]["executor_email"], EXECUTOR_EMAIL);

    let activated = kinds_of(&events, "release_activated");
    assert_eq!(activated.len(), 1);
    assert_eq!(activated[0]["owner_id"], "owner-1");
    assert_eq!(activated[0]["node_id"], "audit-node");

    let issued = kinds_of(&events, "grant_issued");
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0]["contact"], contact_id.to_hex());

    assert_eq!(kinds_of(&events, "letter_delivered").len(), 1);
    let failed = kinds_of(&events, "letter_failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["detail"], "mailbox unavailable");

    let revoked = kinds_of(&events, "grant_revoked");
    assert_eq!(revoked.len(), 1);
    assert_eq!(revoked[0]["owner_id"], "owner-1");

    // Every event names the node that handled it
    assert!(events.iter().all(|e| e["node_id"] == "audit-node"));
}

#[tokio::test]
async fn test_linked_contact_outranks_free_text_recipient() {
    let store = Arc::new(MemoryVaultStore::new());
    let sender = Arc::new(RecordingSender::new(None));
    let service = ReleaseService::new(
        Arc::clone(&store),
        Arc::clone(&sender),
        ReleaseConfig {
            node_id: "audit-node".to_string(),
            ..ReleaseConfig::default()
        },
    );

    let executor_id = store.seed_contact(executor_contact("owner-1", EXECUTOR_EMAIL));
    service.configure_lock("owner-1", executor_id, CODE).await.unwrap();

    let mut linked = ContactDoc::new(
        "owner-1".to_string(),
        "Carol Mendez".to_string(),
        "Carol@Example.com".to_string(),
    );
    linked.status = ContactStatus::Accepted;
    let linked_id = store.seed_contact(linked);

    let mut removed = ContactDoc::new(
        "owner-1".to_string(),
        "Old Friend".to_string(),
        "old@example.com".to_string(),
    );
    removed.status = ContactStatus::Removed;
    let removed_id = store.seed_contact(removed);

    // Linked contact wins over the letter's own address
    let mut both = after_death_letter("owner-1", "To Carol");
    both.recipient_contact = Some(linked_id);
    both.recipient_email = Some("stale-address@example.com".to_string());
    store.seed_letter(both);

    // Removed contact falls back to the letter's address
    let mut fallback = after_death_letter("owner-1", "To whoever still checks this inbox");
    fallback.recipient_contact = Some(removed_id);
    fallback.recipient_email = Some("Backup@Example.com".to_string());
    store.seed_letter(fallback);

    // No contact and no address cannot be delivered
    let unroutable_id = store.seed_letter(after_death_letter("owner-1", "Lost"));

    let access = service
        .verify_executor_access(request("owner-1", EXECUTOR_EMAIL, CODE))
        .await
        .unwrap();
    let summary = match access.activation {
        Activation::Triggered(handle) => handle.await.unwrap(),
        Activation::AlreadyActive => panic!("first verification must activate"),
    };

    assert_eq!(summary.selected, 3);
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.missing_recipient, 1);

    let mut sent = sender.sent();
    sent.sort();
    assert_eq!(sent, vec!["backup@example.com", "carol@example.com"]);

    assert!(!store.letter(unroutable_id).unwrap().delivered);
}
