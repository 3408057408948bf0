//! Letter schema
//!
//! Pre-authored letters bound to a release trigger. The `delivered` flag is
//! monotonic: the dispatcher flips it `false -> true` through a value-guarded
//! write and nothing ever clears it.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for letters
pub const LETTER_COLLECTION: &str = "letters";

/// When a letter becomes deliverable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LetterTrigger {
    /// Dispatched by release activation
    #[default]
    AfterDeath,
    /// Dispatched on `release_date` by a scheduled sweep
    OnDate,
    /// Dispatched when the owner marks the milestone reached
    OnMilestone,
    /// Dispatched as soon as the owner finishes writing
    Immediate,
}

impl fmt::Display for LetterTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LetterTrigger::AfterDeath => write!(f, "after_death"),
            LetterTrigger::OnDate => write!(f, "on_date"),
            LetterTrigger::OnMilestone => write!(f, "on_milestone"),
            LetterTrigger::Immediate => write!(f, "immediate"),
        }
    }
}

/// Letter document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LetterDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Owner who authored the letter
    pub owner_id: String,

    /// Subject line shown to the recipient
    pub subject: String,

    /// Letter body, already rendered by the authoring layer
    pub body: String,

    /// Release trigger
    #[serde(default)]
    pub trigger: LetterTrigger,

    /// Delivery date for `on_date` letters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,

    /// Milestone label for `on_milestone` letters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,

    /// Linked recipient in the owner's contact book
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_contact: Option<ObjectId>,

    /// Free-text recipient address, used when no contact is linked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,

    /// Owner opt-in to automatic dispatch
    #[serde(default)]
    pub auto_delivery: bool,

    /// Monotonic delivery flag
    #[serde(default)]
    pub delivered: bool,

    /// When delivery happened; set iff `delivered`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl LetterDoc {
    /// Create an undelivered letter
    pub fn new(owner_id: String, subject: String, body: String, trigger: LetterTrigger) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner_id,
            subject,
            body,
            trigger,
            release_date: None,
            milestone: None,
            recipient_contact: None,
            recipient_email: None,
            auto_delivery: true,
            delivered: false,
            delivered_at: None,
        }
    }
}

impl IntoIndexes for LetterDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Eligibility scan: owner's undelivered letters for a trigger
            (
                doc! { "owner_id": 1, "trigger": 1, "delivered": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_trigger_delivered_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LetterDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
