//! Release verification and activation pipeline
//!
//! `ReleaseService` is the single entry point for executor access: it checks
//! the requester's relationship and unlock code, performs the one-way
//! activation, hands letter dispatch to the runtime, and issues the access
//! grant. Denials come back in a fixed order so a rejected requester learns
//! nothing about the checks behind the one that failed them.

use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use zeroize::Zeroizing;

pub mod activate;
pub mod verify;

use crate::auth::code::hash_unlock_code;
use crate::db::schemas::{ContactStatus, GrantDoc, ReleaseDoc};
use crate::grants::{AccessGrant, GrantIssuer, DEFAULT_GRANT_TTL_SECS};
use crate::letters::{spawn_dispatch_task, DispatchSummary, LetterDispatcher};
use crate::logging::AuditLog;
use crate::notify::LetterSender;
use crate::store::VaultStore;
use crate::types::{PassageError, Result};

/// Settings for the release pipeline
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// Node identifier stamped on audit events
    pub node_id: String,
    /// Grant lifetime in seconds
    pub grant_ttl_secs: u64,
    /// Per-letter send timeout for dispatch runs
    pub send_timeout: Duration,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            node_id: uuid::Uuid::new_v4().to_string(),
            grant_ttl_secs: DEFAULT_GRANT_TTL_SECS,
            send_timeout: Duration::from_secs(10),
        }
    }
}

/// An executor's request to open a released vault.
///
/// The email is an identity assertion made upstream by the login layer; the
/// unlock code is the knowledge factor and is zeroed when the request drops.
pub struct AccessRequest {
    /// Owner whose vault is being requested
    pub owner_id: String,
    /// Verified email of the requester
    pub executor_email: String,
    /// Presented unlock code
    pub unlock_code: Zeroizing<String>,
}

impl AccessRequest {
    pub fn new(owner_id: String, executor_email: String, unlock_code: String) -> Self {
        Self {
            owner_id,
            executor_email,
            unlock_code: Zeroizing::new(unlock_code),
        }
    }
}

/// Which side of the activation transition a request landed on
#[derive(Debug)]
pub enum Activation {
    /// This request performed the transition and letter dispatch was spawned.
    /// The handle is observable but the verification path never awaits it.
    Triggered(JoinHandle<DispatchSummary>),
    /// The release was already active; nothing was re-triggered
    AlreadyActive,
}

/// A successful verification: the grant plus what the request set in motion
#[derive(Debug)]
pub struct VerifiedAccess {
    /// Issued grant, carrying the raw bearer token
    pub grant: AccessGrant,
    /// Whether this request activated the release or found it already active
    pub activation: Activation,
}

/// Executor verification, release activation, and grant issuance
pub struct ReleaseService<S: VaultStore, N: LetterSender> {
    store: Arc<S>,
    sender: Arc<N>,
    config: ReleaseConfig,
    issuer: GrantIssuer<S>,
    audit: AuditLog,
}

impl<S: VaultStore + 'static, N: LetterSender + 'static> ReleaseService<S, N> {
    pub fn new(store: Arc<S>, sender: Arc<N>, config: ReleaseConfig) -> Self {
        let issuer = GrantIssuer::new(Arc::clone(&store), config.grant_ttl_secs);
        let audit = AuditLog::new(config.node_id.clone());
        Self {
            store,
            sender,
            config,
            issuer,
            audit,
        }
    }

    /// The audit log, for wiring a JSONL file at startup
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Verify an executor and open their access.
    ///
    /// Runs the full pipeline: executor relationship, unlock code,
    /// designated-executor match, one-way activation, grant issuance. The
    /// first verified request activates the release and spawns letter
    /// dispatch; every later verified request gets `AlreadyActive` and a
    /// fresh grant. Letter delivery never delays the response.
    pub async fn verify_executor_access(&self, request: AccessRequest) -> Result<VerifiedAccess> {
        let owner_id = request.owner_id.as_str();
        let email = request.executor_email.as_str();

        let contact = match verify::accepted_executor(self.store.as_ref(), owner_id, email).await {
            Ok(contact) => contact,
            Err(e) => return self.deny(owner_id, email, e).await,
        };

        if let Err(e) =
            verify::unlock_release(self.store.as_ref(), owner_id, &request.unlock_code, &contact)
                .await
        {
            return self.deny(owner_id, email, e).await;
        }

        let activation = if activate::activate(self.store.as_ref(), owner_id).await? {
            info!(
                owner_id = %owner_id,
                executor = %email,
                "Release activated by verified executor"
            );
            self.audit.log_release_activated(owner_id, email).await;

            // Dispatch rides on the activation edge, not on grant issuance
            let handle = spawn_dispatch_task(self.dispatcher(), owner_id.to_string());
            Activation::Triggered(handle)
        } else {
            info!(owner_id = %owner_id, executor = %email, "Release already active");
            Activation::AlreadyActive
        };

        let grant = self.issuer.issue(owner_id, &contact).await?;
        self.audit
            .log_grant_issued(owner_id, &grant.contact_id.to_hex(), &grant.permissions.to_string())
            .await;

        Ok(VerifiedAccess { grant, activation })
    }

    /// Configure or re-key the owner's lock.
    ///
    /// Hashes the code, designates the executor contact, and marks the
    /// release locked. Once the release has been activated the lock is
    /// frozen and this fails.
    pub async fn configure_lock(
        &self,
        owner_id: &str,
        executor_contact: ObjectId,
        code: &str,
    ) -> Result<ObjectId> {
        if let Some(existing) = self.store.find_release(owner_id).await? {
            if existing.release_activated {
                return Err(PassageError::Auth(
                    "Release is already activated; the lock can no longer change".to_string(),
                ));
            }
        }

        let contact = self
            .store
            .find_contact(executor_contact)
            .await?
            .ok_or_else(|| {
                PassageError::NotFound(format!("Contact {} not found", executor_contact))
            })?;
        if contact.owner_id != owner_id {
            return Err(PassageError::Auth(
                "Designated contact belongs to a different owner".to_string(),
            ));
        }
        if contact.status == ContactStatus::Removed {
            return Err(PassageError::Auth(
                "Designated contact has been removed".to_string(),
            ));
        }

        let code_hash = hash_unlock_code(code)?;
        let id = self
            .store
            .upsert_release(ReleaseDoc::new(
                owner_id.to_string(),
                code_hash,
                executor_contact,
            ))
            .await?;

        info!(
            owner_id = %owner_id,
            executor_contact = %executor_contact,
            "Release lock configured"
        );
        Ok(id)
    }

    /// Validate a presented grant token
    pub async fn validate_grant(&self, token: &str) -> Result<Option<GrantDoc>> {
        self.issuer.validate(token).await
    }

    /// Revoke a grant token. Returns false when no live grant matched.
    pub async fn revoke_grant(&self, token: &str) -> Result<bool> {
        let owner = self.issuer.lookup(token).await?.map(|g| g.owner_id);
        let revoked = self.issuer.revoke(token).await?;
        if revoked {
            if let Some(owner_id) = owner {
                self.audit.log_grant_revoked(&owner_id).await;
            }
        }
        Ok(revoked)
    }

    /// Record the denial and pass the error through unchanged
    async fn deny(&self, owner_id: &str, email: &str, err: PassageError) -> Result<VerifiedAccess> {
        if let Some(reason) = err.denial() {
            warn!(
                owner_id = %owner_id,
                executor = %email,
                reason = %reason,
                "Executor access denied"
            );
            self.audit
                .log_verify_denied(owner_id, email, &reason.to_string())
                .await;
        }
        Err(err)
    }

    fn dispatcher(&self) -> LetterDispatcher<S, N> {
        LetterDispatcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.sender),
            self.config.send_timeout,
            self.audit.clone(),
        )
    }
}
