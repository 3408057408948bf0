//! One-way release activation
//!
//! The transition is a value-guarded store write, not a lock: concurrent
//! verifications race on the persisted record and exactly one of them
//! observes `Applied`.

use chrono::Utc;

use crate::store::{FlagWrite, VaultStore};
use crate::types::{PassageError, Result};

/// Flip the owner's release to activated.
///
/// Returns `true` when this call performed the transition and `false` when
/// the release was already active. An already-active release is an
/// idempotent success, never an error.
pub async fn activate<S: VaultStore>(store: &S, owner_id: &str) -> Result<bool> {
    match store.activate_release(owner_id, Utc::now()).await? {
        FlagWrite::Applied => Ok(true),
        FlagWrite::AlreadySet => Ok(false),
        // Verification saw a locked release moments ago, so a missing or
        // unlocked record here means it changed under us
        FlagWrite::Missing => Err(PassageError::Database(format!(
            "Release for owner {} disappeared during activation",
            owner_id
        ))),
    }
}
