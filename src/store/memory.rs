//! In-memory vault store
//!
//! Backs dev mode (running without MongoDB) and tests. DashMap entry locks
//! make each one-way flag flip atomic within the process, so the store
//! honors the same compare-and-swap contract as the Mongo implementation.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::db::schemas::{
    normalize_email, ContactDoc, ContactStatus, GrantDoc, LetterDoc, LetterTrigger, Metadata,
    ReleaseDoc,
};
use crate::store::{FlagWrite, VaultStore};
use crate::types::{PassageError, Result};

/// Vault store held entirely in memory
pub struct MemoryVaultStore {
    /// Releases by owner id
    releases: DashMap<String, ReleaseDoc>,
    /// Contacts by document id
    contacts: DashMap<ObjectId, ContactDoc>,
    /// Letters by document id
    letters: DashMap<ObjectId, LetterDoc>,
    /// Grants by token digest
    grants: DashMap<String, GrantDoc>,
}

impl MemoryVaultStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            releases: DashMap::new(),
            contacts: DashMap::new(),
            letters: DashMap::new(),
            grants: DashMap::new(),
        }
    }

    /// Insert a contact directly, assigning an id when absent.
    ///
    /// Seeding helper for dev mode and tests; contact lifecycle is owned by
    /// the vault application, so this is not part of [`VaultStore`].
    pub fn seed_contact(&self, mut contact: ContactDoc) -> ObjectId {
        let id = contact._id.unwrap_or_else(ObjectId::new);
        contact._id = Some(id);
        if contact.metadata.created_at.is_none() {
            contact.metadata = Metadata::new();
        }
        self.contacts.insert(id, contact);
        id
    }

    /// Insert a letter directly, assigning an id when absent
    pub fn seed_letter(&self, mut letter: LetterDoc) -> ObjectId {
        let id = letter._id.unwrap_or_else(ObjectId::new);
        letter._id = Some(id);
        if letter.metadata.created_at.is_none() {
            letter.metadata = Metadata::new();
        }
        self.letters.insert(id, letter);
        id
    }

    /// Snapshot a letter by id (test inspection)
    pub fn letter(&self, id: ObjectId) -> Option<LetterDoc> {
        self.letters.get(&id).map(|l| l.clone())
    }

    /// Number of stored grants (test inspection)
    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }
}

impl Default for MemoryVaultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VaultStore for MemoryVaultStore {
    async fn find_release(&self, owner_id: &str) -> Result<Option<ReleaseDoc>> {
        Ok(self
            .releases
            .get(owner_id)
            .map(|r| r.clone())
            .filter(|r| !r.metadata.is_deleted))
    }

    async fn upsert_release(&self, mut release: ReleaseDoc) -> Result<ObjectId> {
        // The read-modify-write holds the entry lock, so an activation
        // cannot land between the snapshot and the write. Re-configuration
        // only touches the lock fields; an activated record is frozen.
        match self.releases.entry(release.owner_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                let existing = slot.get();
                if existing.release_activated {
                    return Err(PassageError::Auth(
                        "Release is already activated; the lock can no longer change".to_string(),
                    ));
                }

                release._id = existing._id;
                release.metadata.created_at = existing.metadata.created_at;
                release.metadata.updated_at = Some(bson::DateTime::now());

                let id = release._id.unwrap_or_else(ObjectId::new);
                release._id = Some(id);
                slot.insert(release);
                Ok(id)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                if release.metadata.created_at.is_none() {
                    release.metadata = Metadata::new();
                }

                let id = release._id.unwrap_or_else(ObjectId::new);
                release._id = Some(id);
                slot.insert(release);
                Ok(id)
            }
        }
    }

    async fn activate_release(&self, owner_id: &str, at: DateTime<Utc>) -> Result<FlagWrite> {
        match self.releases.get_mut(owner_id) {
            Some(mut release) => {
                if release.metadata.is_deleted {
                    return Ok(FlagWrite::Missing);
                }
                if release.release_activated {
                    return Ok(FlagWrite::AlreadySet);
                }
                if !release.is_locked {
                    return Ok(FlagWrite::Missing);
                }

                release.release_activated = true;
                release.release_activated_at = Some(at);
                release.metadata.updated_at = Some(bson::DateTime::now());
                Ok(FlagWrite::Applied)
            }
            None => Ok(FlagWrite::Missing),
        }
    }

    async fn find_accepted_executor(
        &self,
        owner_id: &str,
        email: &str,
    ) -> Result<Option<ContactDoc>> {
        let email = normalize_email(email);
        Ok(self
            .contacts
            .iter()
            .find(|c| {
                c.owner_id == owner_id
                    && c.email == email
                    && c.is_executor
                    && c.status == ContactStatus::Accepted
                    && !c.metadata.is_deleted
            })
            .map(|c| c.clone()))
    }

    async fn find_contact(&self, id: ObjectId) -> Result<Option<ContactDoc>> {
        Ok(self
            .contacts
            .get(&id)
            .map(|c| c.clone())
            .filter(|c| !c.metadata.is_deleted))
    }

    async fn eligible_letters(&self, owner_id: &str) -> Result<Vec<LetterDoc>> {
        Ok(self
            .letters
            .iter()
            .filter(|l| {
                l.owner_id == owner_id
                    && l.trigger == LetterTrigger::AfterDeath
                    && l.auto_delivery
                    && !l.delivered
                    && !l.metadata.is_deleted
            })
            .map(|l| l.clone())
            .collect())
    }

    async fn mark_letter_delivered(
        &self,
        letter_id: ObjectId,
        at: DateTime<Utc>,
    ) -> Result<FlagWrite> {
        match self.letters.get_mut(&letter_id) {
            Some(mut letter) => {
                if letter.metadata.is_deleted {
                    return Ok(FlagWrite::Missing);
                }
                if letter.delivered {
                    return Ok(FlagWrite::AlreadySet);
                }

                letter.delivered = true;
                letter.delivered_at = Some(at);
                letter.metadata.updated_at = Some(bson::DateTime::now());
                Ok(FlagWrite::Applied)
            }
            None => Ok(FlagWrite::Missing),
        }
    }

    async fn insert_grant(&self, mut grant: GrantDoc) -> Result<ObjectId> {
        let id = grant._id.unwrap_or_else(ObjectId::new);
        grant._id = Some(id);
        if grant.metadata.created_at.is_none() {
            grant.metadata = Metadata::new();
        }

        match self.grants.entry(grant.token_hash.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(PassageError::Database(
                "Duplicate grant token digest".to_string(),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(grant);
                Ok(id)
            }
        }
    }

    async fn find_grant(&self, token_hash: &str) -> Result<Option<GrantDoc>> {
        Ok(self
            .grants
            .get(token_hash)
            .map(|g| g.clone())
            .filter(|g| !g.metadata.is_deleted))
    }

    async fn revoke_grant(&self, token_hash: &str) -> Result<bool> {
        match self.grants.get_mut(token_hash) {
            Some(mut grant) => {
                if grant.metadata.is_deleted || grant.revoked {
                    return Ok(false);
                }
                grant.revoked = true;
                grant.metadata.updated_at = Some(bson::DateTime::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
