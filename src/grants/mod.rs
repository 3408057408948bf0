//! Access grant issuance, validation, and revocation
//!
//! A grant is the session a verified executor holds: an unguessable bearer
//! token bound to (owner, contact) with the permission snapshot taken at
//! issuance. Only the sha256 digest of the token is persisted; validation
//! digests the presented token and looks it up.

use bson::oid::ObjectId;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

use crate::auth::Permissions;
use crate::db::schemas::{ContactDoc, GrantDoc};
use crate::store::VaultStore;
use crate::types::{PassageError, Result};

/// Default grant lifetime: 4 hours
pub const DEFAULT_GRANT_TTL_SECS: u64 = 14_400;

/// Generate an unguessable bearer token (32 random bytes, hex)
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// sha256 digest of a token, hex encoded
fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A freshly issued grant, carrying the raw bearer token.
///
/// This value is the only place the raw token ever exists; hand it to the
/// executor and drop it.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    /// Bearer token to present on subsequent reads
    pub token: String,
    /// Owner whose vault the grant opens
    pub owner_id: String,
    /// Contact the grant was issued to
    pub contact_id: ObjectId,
    /// Permission snapshot taken at issuance
    pub permissions: Permissions,
    /// When the grant was issued
    pub issued_at: chrono::DateTime<chrono::Utc>,
    /// When the grant expires
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Mints and checks access grants against the vault store
pub struct GrantIssuer<S: VaultStore> {
    store: Arc<S>,
    ttl_secs: u64,
}

impl<S: VaultStore> GrantIssuer<S> {
    /// Create an issuer with the given grant lifetime
    pub fn new(store: Arc<S>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    /// Issue a grant to a verified contact.
    ///
    /// Pure creation: nothing else is mutated, and later edits to the
    /// contact's permissions never reach a grant issued here. Callers only
    /// invoke this after identity and unlock-code verification passed.
    pub async fn issue(&self, owner_id: &str, contact: &ContactDoc) -> Result<AccessGrant> {
        let contact_id = contact
            ._id
            .ok_or_else(|| PassageError::Internal("Contact is missing its document ID".into()))?;

        let token = generate_token();
        let doc = GrantDoc::new(
            token_digest(&token),
            owner_id.to_string(),
            contact_id,
            contact.permissions,
            self.ttl_secs,
        );

        let issued_at = doc.issued_at;
        let expires_at = doc.expires_at;
        let permissions = doc.permissions;
        self.store.insert_grant(doc).await?;

        info!(
            owner_id = %owner_id,
            contact = %contact_id,
            permissions = %permissions,
            expires_at = %expires_at,
            "Access grant issued"
        );

        Ok(AccessGrant {
            token,
            owner_id: owner_id.to_string(),
            contact_id,
            permissions,
            issued_at,
            expires_at,
        })
    }

    /// Validate a presented token.
    ///
    /// Returns the live grant, or None when the token is unknown, revoked,
    /// or expired. Validation never extends a grant's lifetime.
    pub async fn validate(&self, token: &str) -> Result<Option<GrantDoc>> {
        let grant = self.store.find_grant(&token_digest(token)).await?;
        Ok(grant.filter(|g| g.is_valid()))
    }

    /// Look up a token's grant record without the validity filter.
    ///
    /// Expired and revoked grants are still returned; use [`Self::validate`]
    /// for access decisions.
    pub async fn lookup(&self, token: &str) -> Result<Option<GrantDoc>> {
        self.store.find_grant(&token_digest(token)).await
    }

    /// Revoke a token. Returns false when no live unrevoked grant matched.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let revoked = self.store.revoke_grant(&token_digest(token)).await?;
        if revoked {
            info!("Access grant revoked");
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ViewScope;
    use crate::db::schemas::ContactStatus;
    use crate::store::MemoryVaultStore;

    fn accepted_contact(owner: &str, email: &str) -> ContactDoc {
        let mut contact = ContactDoc::new(
            owner.to_string(),
            "Jordan Reyes".to_string(),
            email.to_string(),
        );
        contact.status = ContactStatus::Accepted;
        contact.is_executor = true;
        contact.permissions = Permissions {
            view_funeral_preferences: true,
            view_letters: true,
            ..Permissions::none()
        };
        contact
    }

    async fn seeded_issuer() -> (Arc<MemoryVaultStore>, GrantIssuer<MemoryVaultStore>, ContactDoc) {
        let store = Arc::new(MemoryVaultStore::new());
        let mut contact = accepted_contact("owner-1", "jordan@example.com");
        let id = store.seed_contact(contact.clone());
        contact._id = Some(id);

        let issuer = GrantIssuer::new(Arc::clone(&store), 3600);
        (store, issuer, contact)
    }

    #[test]
    fn test_token_is_unguessable_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(token_digest("abc"), token_digest("abc"));
        assert_ne!(token_digest("abc"), token_digest("abd"));
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let (_store, issuer, contact) = seeded_issuer().await;

        let grant = issuer.issue("owner-1", &contact).await.unwrap();
        assert!(grant.permissions.allows(ViewScope::Letters));
        assert!(!grant.permissions.allows(ViewScope::Medical));

        let validated = issuer.validate(&grant.token).await.unwrap().unwrap();
        assert_eq!(validated.owner_id, "owner-1");
        assert_eq!(validated.permissions, grant.permissions);

        // Unknown tokens validate to None
        assert!(issuer.validate("not-a-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_survives_permission_edits() {
        let (store, issuer, mut contact) = seeded_issuer().await;

        let grant = issuer.issue("owner-1", &contact).await.unwrap();

        // Owner widens the contact's permissions after issuance
        contact.permissions = Permissions::all();
        store.seed_contact(contact);

        let validated = issuer.validate(&grant.token).await.unwrap().unwrap();
        assert!(!validated.permissions.allows(ViewScope::Medical));
        assert!(validated.permissions.allows(ViewScope::Letters));
    }

    #[tokio::test]
    async fn test_expired_grant_validates_to_none() {
        let (store, _issuer, contact) = seeded_issuer().await;

        let issuer = GrantIssuer::new(store, 0);
        let grant = issuer.issue("owner-1", &contact).await.unwrap();

        assert!(issuer.validate(&grant.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revocation() {
        let (_store, issuer, contact) = seeded_issuer().await;

        let grant = issuer.issue("owner-1", &contact).await.unwrap();
        assert!(issuer.revoke(&grant.token).await.unwrap());
        assert!(issuer.validate(&grant.token).await.unwrap().is_none());

        // Second revocation is a no-op
        assert!(!issuer.revoke(&grant.token).await.unwrap());
    }
}
