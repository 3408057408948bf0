//! Executor identity and unlock-code verification
//!
//! Side-effect-free checks in a fixed order: executor relationship, release
//! lock state, unlock code, designated-executor match. The first failing
//! check decides the denial; nothing here mutates the store.

use crate::auth::code::verify_unlock_code;
use crate::db::schemas::{ContactDoc, ReleaseDoc};
use crate::store::VaultStore;
use crate::types::{DenialReason, PassageError, Result};

/// Find the requester's accepted executor relationship with the owner.
///
/// The identity email is asserted upstream (verified-email login); this
/// check only establishes that the asserted identity is an accepted
/// executor contact of the owner.
pub async fn accepted_executor<S: VaultStore>(
    store: &S,
    owner_id: &str,
    executor_email: &str,
) -> Result<ContactDoc> {
    store
        .find_accepted_executor(owner_id, executor_email)
        .await?
        .ok_or(PassageError::Denied(DenialReason::NotAnExecutor))
}

/// Verify a presented unlock code against the owner's release.
///
/// Codes are compared through the argon2 hash, never as plain strings.
/// Returns the validated release on success.
pub async fn unlock_release<S: VaultStore>(
    store: &S,
    owner_id: &str,
    code: &str,
    contact: &ContactDoc,
) -> Result<ReleaseDoc> {
    let release = store
        .find_release(owner_id)
        .await?
        .ok_or(PassageError::Denied(DenialReason::NotLocked))?;

    let code_hash = match release.unlock_code_hash.as_deref() {
        Some(hash) if release.is_locked => hash,
        _ => return Err(PassageError::Denied(DenialReason::NotLocked)),
    };

    if !verify_unlock_code(code, code_hash)? {
        return Err(PassageError::Denied(DenialReason::InvalidCode));
    }

    // The code alone is not enough: the requester must be the contact the
    // owner designated on the release.
    match (release.executor_contact, contact._id) {
        (Some(designated), Some(requester)) if designated == requester => {}
        _ => return Err(PassageError::Denied(DenialReason::WrongExecutor)),
    }

    Ok(release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::code::hash_unlock_code;
    use crate::db::schemas::{ContactStatus, ReleaseDoc};
    use crate::store::{MemoryVaultStore, VaultStore};
    use bson::oid::ObjectId;

    const CODE: &str = "482913";

    async fn seeded_store() -> (MemoryVaultStore, ContactDoc) {
        let store = MemoryVaultStore::new();

        let mut contact = ContactDoc::new(
            "owner-1".to_string(),
            "Jordan Reyes".to_string(),
            "jordan@example.com".to_string(),
        );
        contact.status = ContactStatus::Accepted;
        contact.is_executor = true;
        let contact_id = store.seed_contact(contact.clone());
        contact._id = Some(contact_id);

        store
            .upsert_release(ReleaseDoc::new(
                "owner-1".to_string(),
                hash_unlock_code(CODE).unwrap(),
                contact_id,
            ))
            .await
            .unwrap();

        (store, contact)
    }

    fn denial(result: Result<ReleaseDoc>) -> DenialReason {
        match result {
            Err(PassageError::Denied(reason)) => reason,
            other => panic!("expected denial, got {:?}", other.map(|r| r.owner_id)),
        }
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_an_executor() {
        let (store, _contact) = seeded_store().await;

        let result = accepted_executor(&store, "owner-1", "stranger@example.com").await;
        assert!(matches!(
            result,
            Err(PassageError::Denied(DenialReason::NotAnExecutor))
        ));
    }

    #[tokio::test]
    async fn test_invited_contact_is_not_an_executor() {
        let (store, _contact) = seeded_store().await;

        let mut pending = ContactDoc::new(
            "owner-1".to_string(),
            "Sam Okafor".to_string(),
            "sam@example.com".to_string(),
        );
        pending.is_executor = true;
        store.seed_contact(pending);

        let result = accepted_executor(&store, "owner-1", "sam@example.com").await;
        assert!(matches!(
            result,
            Err(PassageError::Denied(DenialReason::NotAnExecutor))
        ));
    }

    #[tokio::test]
    async fn test_identity_email_is_normalized() {
        let (store, _contact) = seeded_store().await;

        let found = accepted_executor(&store, "owner-1", "  JORDAN@example.com ").await;
        assert!(found.is_ok());
    }

    #[tokio::test]
    async fn test_missing_release_is_not_locked() {
        let (store, contact) = seeded_store().await;

        let result = unlock_release(&store, "owner-2", CODE, &contact).await;
        assert_eq!(denial(result), DenialReason::NotLocked);
    }

    #[tokio::test]
    async fn test_unlocked_release_denies_before_code_check() {
        let (store, contact) = seeded_store().await;

        let mut release = store.find_release("owner-1").await.unwrap().unwrap();
        release.is_locked = false;
        store.upsert_release(release).await.unwrap();

        // Even a wrong code reports NotLocked: lock state is checked first
        let result = unlock_release(&store, "owner-1", "000000", &contact).await;
        assert_eq!(denial(result), DenialReason::NotLocked);
    }

    #[tokio::test]
    async fn test_wrong_code_is_invalid() {
        let (store, contact) = seeded_store().await;

        let result = unlock_release(&store, "owner-1", "000000", &contact).await;
        assert_eq!(denial(result), DenialReason::InvalidCode);
    }

    #[tokio::test]
    async fn test_code_check_precedes_executor_match() {
        let (store, _designated) = seeded_store().await;

        let mut other = ContactDoc::new(
            "owner-1".to_string(),
            "Sam Okafor".to_string(),
            "sam@example.com".to_string(),
        );
        other.status = ContactStatus::Accepted;
        other.is_executor = true;
        let other_id = store.seed_contact(other.clone());
        other._id = Some(other_id);

        // Wrong code and wrong executor: the code denial wins
        let result = unlock_release(&store, "owner-1", "000000", &other).await;
        assert_eq!(denial(result), DenialReason::InvalidCode);
    }

    #[tokio::test]
    async fn test_right_code_wrong_executor() {
        let (store, _designated) = seeded_store().await;

        let mut other = ContactDoc::new(
            "owner-1".to_string(),
            "Sam Okafor".to_string(),
            "sam@example.com".to_string(),
        );
        other.status = ContactStatus::Accepted;
        other.is_executor = true;
        let other_id = store.seed_contact(other.clone());
        other._id = Some(other_id);

        let result = unlock_release(&store, "owner-1", CODE, &other).await;
        assert_eq!(denial(result), DenialReason::WrongExecutor);
    }

    #[tokio::test]
    async fn test_release_without_designated_executor_denies() {
        let (store, contact) = seeded_store().await;

        let mut release = store.find_release("owner-1").await.unwrap().unwrap();
        release.executor_contact = None;
        store.upsert_release(release).await.unwrap();

        let result = unlock_release(&store, "owner-1", CODE, &contact).await;
        assert_eq!(denial(result), DenialReason::WrongExecutor);
    }

    #[tokio::test]
    async fn test_designated_executor_with_right_code_passes() {
        let (store, contact) = seeded_store().await;

        let release = unlock_release(&store, "owner-1", CODE, &contact).await.unwrap();
        assert_eq!(release.owner_id, "owner-1");
        assert!(!release.release_activated);
    }
}
