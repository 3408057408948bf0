//! Access grant schema
//!
//! Persisted sessions issued to verified executors. Only the sha256 digest
//! of the bearer token is stored; the raw token exists once, in the value
//! returned to the caller at issuance.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Permissions;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for access grants
pub const GRANT_COLLECTION: &str = "access_grants";

/// Access grant document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GrantDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// sha256 digest of the bearer token
    pub token_hash: String,

    /// Owner whose vault the grant opens
    pub owner_id: String,

    /// Contact the grant was issued to
    pub contact_id: ObjectId,

    /// Permission snapshot taken at issuance; never updated afterwards
    #[serde(default)]
    pub permissions: Permissions,

    /// When the grant was issued
    #[serde(default = "default_timestamp")]
    pub issued_at: DateTime<Utc>,

    /// When the grant expires; fixed at issuance, never extended by use
    #[serde(default = "default_timestamp")]
    pub expires_at: DateTime<Utc>,

    /// Explicit revocation flag
    #[serde(default)]
    pub revoked: bool,
}

fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

impl GrantDoc {
    /// Create a grant valid for `ttl_secs` from now
    pub fn new(
        token_hash: String,
        owner_id: String,
        contact_id: ObjectId,
        permissions: Permissions,
        ttl_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            _id: None,
            metadata: Metadata::new(),
            token_hash,
            owner_id,
            contact_id,
            permissions,
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs as i64),
            revoked: false,
        }
    }

    /// Check if the grant is still usable
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.metadata.is_deleted && Utc::now() < self.expires_at
    }
}

impl IntoIndexes for GrantDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the token digest
            (
                doc! { "token_hash": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("token_hash_unique".to_string())
                        .build(),
                ),
            ),
            // TTL index for automatic expiration cleanup
            (
                doc! { "expires_at": 1 },
                Some(
                    IndexOptions::builder()
                        .expire_after(std::time::Duration::from_secs(0))
                        .name("expires_at_ttl".to_string())
                        .build(),
                ),
            ),
            // Listing an owner's grants
            (
                doc! { "owner_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for GrantDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
