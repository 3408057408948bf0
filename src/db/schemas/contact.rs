//! Trusted contact schema
//!
//! A contact is the owner-side record of a relationship: invitation status,
//! the contact's verified email (the stable identity key used for executor
//! verification), and the view permissions the owner scoped to them.
//! Invitation and acceptance flows live in the vault application; this
//! subsystem only reads contacts.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::Permissions;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for trusted contacts
pub const CONTACT_COLLECTION: &str = "contacts";

/// Relationship lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    /// Invited by the owner, not yet accepted
    #[default]
    Invited,
    /// Contact accepted the relationship
    Accepted,
    /// Removed by either side
    Removed,
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactStatus::Invited => write!(f, "invited"),
            ContactStatus::Accepted => write!(f, "accepted"),
            ContactStatus::Removed => write!(f, "removed"),
        }
    }
}

/// Trusted contact document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ContactDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Owner who added this contact
    pub owner_id: String,

    /// Contact's display name
    pub name: String,

    /// Verified email, normalized lowercase; the identity key for verification
    pub email: String,

    /// Relationship status
    #[serde(default)]
    pub status: ContactStatus,

    /// Whether the owner marked this contact as an executor candidate
    #[serde(default)]
    pub is_executor: bool,

    /// View permissions the owner scoped to this contact
    #[serde(default)]
    pub permissions: Permissions,
}

impl ContactDoc {
    /// Create a contact in the invited state
    pub fn new(owner_id: String, name: String, email: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner_id,
            name,
            email: normalize_email(&email),
            status: ContactStatus::Invited,
            is_executor: false,
            permissions: Permissions::none(),
        }
    }

    /// Whether this contact can currently act as an executor
    pub fn accepted_executor(&self) -> bool {
        self.is_executor && self.status == ContactStatus::Accepted
    }

    /// Whether this contact can receive letters
    pub fn reachable(&self) -> bool {
        self.status != ContactStatus::Removed && !self.email.is_empty()
    }
}

/// Normalize an email for storage and comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl IntoIndexes for ContactDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One contact per (owner, email) pair
            (
                doc! { "owner_id": 1, "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("owner_email_unique".to_string())
                        .build(),
                ),
            ),
            // Lookup by email during executor verification
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .name("email_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ContactDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
