//! Release record schema
//!
//! One record per owner: lock state, the hash of the unlock code, the
//! designated executor, and the terminal activation flag. The activation
//! flag moves `false -> true` exactly once and never reverts.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for release records
pub const RELEASE_COLLECTION: &str = "releases";

/// Release record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ReleaseDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Owner this release belongs to (one record per owner)
    pub owner_id: String,

    /// Whether the owner has configured a lock code
    #[serde(default)]
    pub is_locked: bool,

    /// Argon2id PHC hash of the unlock code; the code itself is never stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_code_hash: Option<String>,

    /// Contact designated as executor for this release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor_contact: Option<ObjectId>,

    /// Terminal activation flag
    #[serde(default)]
    pub release_activated: bool,

    /// When activation happened; set iff `release_activated`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_activated_at: Option<DateTime<Utc>>,
}

impl ReleaseDoc {
    /// Create a locked release for an owner
    pub fn new(owner_id: String, unlock_code_hash: String, executor_contact: ObjectId) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner_id,
            is_locked: true,
            unlock_code_hash: Some(unlock_code_hash),
            executor_contact: Some(executor_contact),
            release_activated: false,
            release_activated_at: None,
        }
    }

    /// Whether this release can be unlocked at all
    pub fn unlockable(&self) -> bool {
        self.is_locked && self.unlock_code_hash.is_some()
    }
}

impl IntoIndexes for ReleaseDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One release per owner
            (
                doc! { "owner_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("owner_id_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ReleaseDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
