//! Database schemas for Passage
//!
//! Defines MongoDB document structures for releases, contacts, letters, and
//! access grants.

mod contact;
mod grant;
mod letter;
mod metadata;
mod release;

pub use contact::{normalize_email, ContactDoc, ContactStatus, CONTACT_COLLECTION};
pub use grant::{GrantDoc, GRANT_COLLECTION};
pub use letter::{LetterDoc, LetterTrigger, LETTER_COLLECTION};
pub use metadata::Metadata;
pub use release::{ReleaseDoc, RELEASE_COLLECTION};
