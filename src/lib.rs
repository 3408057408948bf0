//! Passage - release activation and executor access for the legacy vault
//!
//! Passage keeps an end-of-life vault shut until a verified executor opens
//! it. Verification is multi-factor (asserted identity, unlock code,
//! designated-executor match); passing it performs a one-way release
//! activation, hands the owner's letters to a background dispatch task, and
//! issues a scoped, time-bound access grant.
//!
//! ## Services
//!
//! - **Release**: executor verification and the one-way activation transition
//! - **Grants**: bearer-token access grants with immutable permission snapshots
//! - **Letters**: post-activation letter dispatch through a pluggable sender
//! - **Store**: MongoDB-backed vault records with an in-memory dev variant

pub mod auth;
pub mod config;
pub mod db;
pub mod grants;
pub mod letters;
pub mod logging;
pub mod notify;
pub mod release;
pub mod store;
pub mod types;

pub use config::Args;
pub use release::{AccessRequest, Activation, ReleaseService, VerifiedAccess};
pub use types::{DenialReason, PassageError, Result};
