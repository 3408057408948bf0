//! Persistence seam for the release pipeline
//!
//! `VaultStore` is the single storage collaborator the pipeline talks to.
//! Production uses [`MongoVaultStore`]; dev mode and tests use
//! [`MemoryVaultStore`]. Both honor the same contract for the two one-way
//! flags, so verification logic is identical against either backend.

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};

use crate::db::schemas::{ContactDoc, GrantDoc, LetterDoc, ReleaseDoc};
use crate::types::Result;

pub mod memory;
pub mod mongo;

pub use memory::MemoryVaultStore;
pub use mongo::MongoVaultStore;

/// Outcome of a value-guarded one-way flag write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagWrite {
    /// This call performed the `false -> true` transition
    Applied,
    /// The flag was already set; a different call won the transition
    AlreadySet,
    /// No live record matched the guard
    Missing,
}

/// Storage operations the release pipeline depends on.
///
/// `activate_release` and `mark_letter_delivered` must be genuine
/// compare-and-swap writes: the expected prior state travels with the
/// write, and the result says whether *this* caller performed the
/// transition. Read-then-write implementations break the exactly-once
/// guarantees under concurrency.
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Load an owner's release record
    async fn find_release(&self, owner_id: &str) -> Result<Option<ReleaseDoc>>;

    /// Create or re-key an owner's release.
    /// Only the lock fields are written. Once the release is activated the
    /// record is frozen and the write errors; the check shares the write's
    /// guard, so an activation racing a re-key can never be wound back.
    async fn upsert_release(&self, release: ReleaseDoc) -> Result<ObjectId>;

    /// One-way activation flip, guarded on `is_locked && !release_activated`
    async fn activate_release(&self, owner_id: &str, at: DateTime<Utc>) -> Result<FlagWrite>;

    /// Find an accepted executor contact by normalized identity email
    async fn find_accepted_executor(
        &self,
        owner_id: &str,
        email: &str,
    ) -> Result<Option<ContactDoc>>;

    /// Load a contact by id
    async fn find_contact(&self, id: ObjectId) -> Result<Option<ContactDoc>>;

    /// Letters dispatchable on release activation:
    /// `after_death` trigger, auto delivery on, not yet delivered
    async fn eligible_letters(&self, owner_id: &str) -> Result<Vec<LetterDoc>>;

    /// One-way delivered flip for a letter, guarded on `!delivered`
    async fn mark_letter_delivered(
        &self,
        letter_id: ObjectId,
        at: DateTime<Utc>,
    ) -> Result<FlagWrite>;

    /// Persist a new grant; the grant store is append-only per issuance
    async fn insert_grant(&self, grant: GrantDoc) -> Result<ObjectId>;

    /// Look up a grant by token digest
    async fn find_grant(&self, token_hash: &str) -> Result<Option<GrantDoc>>;

    /// Set a grant's revoked flag; false when no live unrevoked grant matched
    async fn revoke_grant(&self, token_hash: &str) -> Result<bool>;
}
