//! Authentication primitives for Passage
//!
//! Provides:
//! - Unlock code generation, hashing, and verification with Argon2
//! - Permission snapshots captured onto access grants

pub mod code;
pub mod permissions;

pub use code::{generate_unlock_code, hash_unlock_code, verify_unlock_code};
pub use permissions::{Permissions, ViewScope};
