//! MongoDB-backed vault store
//!
//! One-way flags are enforced with value-guarded updates: the filter carries
//! the expected prior state and `modified_count` tells this writer whether it
//! performed the transition. Multiple processes can race on the same record
//! and exactly one update matches.

use bson::{doc, oid::ObjectId};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::schemas::{
    normalize_email, ContactDoc, GrantDoc, LetterDoc, ReleaseDoc, CONTACT_COLLECTION,
    GRANT_COLLECTION, LETTER_COLLECTION, RELEASE_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::store::{FlagWrite, VaultStore};
use crate::types::{PassageError, Result};

/// Vault store backed by MongoDB collections
pub struct MongoVaultStore {
    releases: MongoCollection<ReleaseDoc>,
    contacts: MongoCollection<ContactDoc>,
    letters: MongoCollection<LetterDoc>,
    grants: MongoCollection<GrantDoc>,
}

impl MongoVaultStore {
    /// Open all vault collections, applying their indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            releases: mongo.collection::<ReleaseDoc>(RELEASE_COLLECTION).await?,
            contacts: mongo.collection::<ContactDoc>(CONTACT_COLLECTION).await?,
            letters: mongo.collection::<LetterDoc>(LETTER_COLLECTION).await?,
            grants: mongo.collection::<GrantDoc>(GRANT_COLLECTION).await?,
        })
    }
}

/// Encode a chrono timestamp the way the document schemas serialize it
fn encode_timestamp(at: &DateTime<Utc>) -> Result<bson::Bson> {
    bson::to_bson(at).map_err(|e| PassageError::Database(format!("Failed to encode timestamp: {}", e)))
}

#[async_trait::async_trait]
impl VaultStore for MongoVaultStore {
    async fn find_release(&self, owner_id: &str) -> Result<Option<ReleaseDoc>> {
        self.releases.find_one(doc! { "owner_id": owner_id }).await
    }

    async fn upsert_release(&self, release: ReleaseDoc) -> Result<ObjectId> {
        if let Some(existing) = self.find_release(&release.owner_id).await? {
            let code_hash = bson::to_bson(&release.unlock_code_hash)
                .map_err(|e| PassageError::Database(format!("Failed to encode code hash: {}", e)))?;
            let executor = bson::to_bson(&release.executor_contact)
                .map_err(|e| PassageError::Database(format!("Failed to encode executor ref: {}", e)))?;

            // The activation flag rides in the filter: an activated record
            // is frozen even when it was read as inactive moments ago
            let result = self
                .releases
                .update_one(
                    doc! {
                        "_id": existing._id,
                        "release_activated": false,
                        "metadata.is_deleted": { "$ne": true },
                    },
                    doc! {
                        "$set": {
                            "is_locked": release.is_locked,
                            "unlock_code_hash": code_hash,
                            "executor_contact": executor,
                            "metadata.updated_at": bson::DateTime::now(),
                        }
                    },
                )
                .await?;

            if result.matched_count == 0 {
                // Guard did not match: the release activated or vanished
                // after the read
                return match self.find_release(&release.owner_id).await? {
                    Some(current) if current.release_activated => Err(PassageError::Auth(
                        "Release is already activated; the lock can no longer change".to_string(),
                    )),
                    _ => Err(PassageError::Database(format!(
                        "Release for owner {} changed during reconfiguration",
                        release.owner_id
                    ))),
                };
            }

            existing
                ._id
                .ok_or_else(|| PassageError::Database("Missing release ID".into()))
        } else {
            self.releases.insert_one(release).await
        }
    }

    async fn activate_release(&self, owner_id: &str, at: DateTime<Utc>) -> Result<FlagWrite> {
        let stamp = encode_timestamp(&at)?;

        let result = self
            .releases
            .update_one(
                doc! {
                    "owner_id": owner_id,
                    "is_locked": true,
                    "release_activated": false,
                    "metadata.is_deleted": { "$ne": true },
                },
                doc! {
                    "$set": {
                        "release_activated": true,
                        "release_activated_at": stamp,
                        "metadata.updated_at": bson::DateTime::now(),
                    }
                },
            )
            .await?;

        if result.modified_count > 0 {
            info!(owner_id = %owner_id, "Release activated");
            return Ok(FlagWrite::Applied);
        }

        // Guard did not match: distinguish a lost race from a missing record
        match self.find_release(owner_id).await? {
            Some(release) if release.release_activated => Ok(FlagWrite::AlreadySet),
            _ => Ok(FlagWrite::Missing),
        }
    }

    async fn find_accepted_executor(
        &self,
        owner_id: &str,
        email: &str,
    ) -> Result<Option<ContactDoc>> {
        self.contacts
            .find_one(doc! {
                "owner_id": owner_id,
                "email": normalize_email(email),
                "is_executor": true,
                "status": "accepted",
            })
            .await
    }

    async fn find_contact(&self, id: ObjectId) -> Result<Option<ContactDoc>> {
        self.contacts.find_one(doc! { "_id": id }).await
    }

    async fn eligible_letters(&self, owner_id: &str) -> Result<Vec<LetterDoc>> {
        self.letters
            .find_many(doc! {
                "owner_id": owner_id,
                "trigger": "after_death",
                "auto_delivery": true,
                "delivered": false,
            })
            .await
    }

    async fn mark_letter_delivered(
        &self,
        letter_id: ObjectId,
        at: DateTime<Utc>,
    ) -> Result<FlagWrite> {
        let stamp = encode_timestamp(&at)?;

        let result = self
            .letters
            .update_one(
                doc! {
                    "_id": letter_id,
                    "delivered": false,
                    "metadata.is_deleted": { "$ne": true },
                },
                doc! {
                    "$set": {
                        "delivered": true,
                        "delivered_at": stamp,
                        "metadata.updated_at": bson::DateTime::now(),
                    }
                },
            )
            .await?;

        if result.modified_count > 0 {
            return Ok(FlagWrite::Applied);
        }

        match self.letters.find_one(doc! { "_id": letter_id }).await? {
            Some(letter) if letter.delivered => Ok(FlagWrite::AlreadySet),
            _ => Ok(FlagWrite::Missing),
        }
    }

    async fn insert_grant(&self, grant: GrantDoc) -> Result<ObjectId> {
        self.grants.insert_one(grant).await
    }

    async fn find_grant(&self, token_hash: &str) -> Result<Option<GrantDoc>> {
        self.grants.find_one(doc! { "token_hash": token_hash }).await
    }

    async fn revoke_grant(&self, token_hash: &str) -> Result<bool> {
        let result = self
            .grants
            .update_one(
                doc! {
                    "token_hash": token_hash,
                    "revoked": false,
                    "metadata.is_deleted": { "$ne": true },
                },
                doc! {
                    "$set": {
                        "revoked": true,
                        "metadata.updated_at": bson::DateTime::now(),
                    }
                },
            )
            .await?;

        Ok(result.modified_count > 0)
    }
}
