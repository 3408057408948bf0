//! Letter fan-out after release activation
//!
//! Activation hands the owner's id to a detached dispatch task; the
//! verification path never waits on delivery. Letters are delivered
//! independently: one failing send never blocks the rest, and a letter's
//! delivered flag only flips after its transport accepted it.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::schemas::{normalize_email, LetterDoc};
use crate::logging::AuditLog;
use crate::notify::LetterSender;
use crate::store::{FlagWrite, VaultStore};
use crate::types::Result;

/// Outcome of a single letter delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Transport accepted the letter and this call set the delivered flag
    Delivered,
    /// A different dispatch already delivered this letter
    AlreadyDelivered,
    /// No usable recipient address; permanent for this letter
    MissingRecipient,
    /// The owner disabled automatic delivery for this letter
    AutoDeliveryOff,
    /// Transport or store failure; the letter stays undelivered
    SendFailed(String),
}

/// Counters for one dispatch run
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    /// Correlation id shared by this run's log lines
    pub run_id: String,
    /// Letters selected as eligible
    pub selected: usize,
    /// Delivered and marked by this run
    pub delivered: usize,
    /// Marked delivered by some other run
    pub already_delivered: usize,
    /// Permanently skipped for lack of a recipient
    pub missing_recipient: usize,
    /// Skipped because auto delivery is off
    pub skipped: usize,
    /// Failed sends left undelivered
    pub send_failed: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::AlreadyDelivered => self.already_delivered += 1,
            DeliveryOutcome::MissingRecipient => self.missing_recipient += 1,
            DeliveryOutcome::AutoDeliveryOff => self.skipped += 1,
            DeliveryOutcome::SendFailed(_) => self.send_failed += 1,
        }
    }
}

/// Delivers a release's letters through an injected sender
pub struct LetterDispatcher<S: VaultStore, N: LetterSender> {
    store: Arc<S>,
    sender: Arc<N>,
    send_timeout: Duration,
    audit: AuditLog,
}

impl<S: VaultStore + 'static, N: LetterSender + 'static> LetterDispatcher<S, N> {
    /// Create a dispatcher
    pub fn new(store: Arc<S>, sender: Arc<N>, send_timeout: Duration, audit: AuditLog) -> Self {
        Self {
            store,
            sender,
            send_timeout,
            audit,
        }
    }

    /// Deliver every eligible letter for an owner.
    ///
    /// Never fails: store and transport problems degrade to per-letter
    /// outcomes, counted in the summary and written to the audit trail.
    pub async fn dispatch_for_owner(&self, owner_id: &str) -> DispatchSummary {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut summary = DispatchSummary {
            run_id: run_id.clone(),
            ..Default::default()
        };

        let letters = match self.store.eligible_letters(owner_id).await {
            Ok(letters) => letters,
            Err(e) => {
                warn!(
                    owner_id = %owner_id,
                    run_id = %run_id,
                    error = %e,
                    "Failed to load letters for dispatch"
                );
                return summary;
            }
        };

        summary.selected = letters.len();
        info!(
            owner_id = %owner_id,
            run_id = %run_id,
            selected = letters.len(),
            "Dispatching release letters"
        );

        let outcomes = join_all(letters.iter().map(|letter| self.deliver_letter(letter))).await;

        for (letter, outcome) in letters.iter().zip(outcomes.iter()) {
            let letter_id = letter._id.map(|id| id.to_hex()).unwrap_or_default();

            match outcome {
                DeliveryOutcome::Delivered => {
                    info!(
                        owner_id = %owner_id,
                        run_id = %run_id,
                        letter = %letter_id,
                        "Letter delivered"
                    );
                    self.audit.log_letter_delivered(owner_id, &letter_id).await;
                }
                DeliveryOutcome::AlreadyDelivered => {
                    debug!(
                        owner_id = %owner_id,
                        run_id = %run_id,
                        letter = %letter_id,
                        "Letter already delivered elsewhere"
                    );
                }
                DeliveryOutcome::MissingRecipient => {
                    warn!(
                        owner_id = %owner_id,
                        run_id = %run_id,
                        letter = %letter_id,
                        "Letter has no usable recipient"
                    );
                    self.audit
                        .log_letter_failed(owner_id, &letter_id, "no usable recipient")
                        .await;
                }
                DeliveryOutcome::AutoDeliveryOff => {
                    debug!(
                        owner_id = %owner_id,
                        run_id = %run_id,
                        letter = %letter_id,
                        "Letter has auto delivery disabled"
                    );
                }
                DeliveryOutcome::SendFailed(reason) => {
                    warn!(
                        owner_id = %owner_id,
                        run_id = %run_id,
                        letter = %letter_id,
                        reason = %reason,
                        "Letter delivery failed"
                    );
                    self.audit.log_letter_failed(owner_id, &letter_id, reason).await;
                }
            }

            summary.record(outcome);
        }

        info!(
            owner_id = %owner_id,
            run_id = %run_id,
            delivered = summary.delivered,
            send_failed = summary.send_failed,
            missing_recipient = summary.missing_recipient,
            "Dispatch complete"
        );

        summary
    }

    /// Deliver one letter: resolve the recipient, send with a bounded
    /// timeout, then flip the delivered flag through the store guard.
    pub async fn deliver_letter(&self, letter: &LetterDoc) -> DeliveryOutcome {
        let Some(letter_id) = letter._id else {
            return DeliveryOutcome::SendFailed("letter is missing its document ID".to_string());
        };

        if !letter.auto_delivery {
            return DeliveryOutcome::AutoDeliveryOff;
        }
        if letter.delivered {
            return DeliveryOutcome::AlreadyDelivered;
        }

        let recipient = match self.resolve_recipient(letter).await {
            Ok(Some(address)) => address,
            Ok(None) => return DeliveryOutcome::MissingRecipient,
            Err(e) => return DeliveryOutcome::SendFailed(format!("recipient lookup failed: {}", e)),
        };

        let send = self.sender.send(&recipient, &letter.subject, &letter.body);
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return DeliveryOutcome::SendFailed(e.to_string()),
            Err(_) => {
                return DeliveryOutcome::SendFailed(format!(
                    "send timed out after {}ms",
                    self.send_timeout.as_millis()
                ))
            }
        }

        // Transport accepted; record delivery. A concurrent dispatch may
        // have marked the letter first.
        match self.store.mark_letter_delivered(letter_id, Utc::now()).await {
            Ok(FlagWrite::Applied) => DeliveryOutcome::Delivered,
            Ok(FlagWrite::AlreadySet) => DeliveryOutcome::AlreadyDelivered,
            Ok(FlagWrite::Missing) => {
                DeliveryOutcome::SendFailed("letter record vanished before marking".to_string())
            }
            Err(e) => DeliveryOutcome::SendFailed(format!("delivery flag write failed: {}", e)),
        }
    }

    /// Resolve the letter's recipient address.
    ///
    /// A linked contact that is not removed and has an email is canonical;
    /// otherwise the letter's free-text address applies. `Ok(None)` is a
    /// permanent missing-recipient, `Err` a retryable store failure.
    async fn resolve_recipient(&self, letter: &LetterDoc) -> Result<Option<String>> {
        if let Some(contact_id) = letter.recipient_contact {
            if let Some(contact) = self.store.find_contact(contact_id).await? {
                if contact.reachable() {
                    return Ok(Some(contact.email));
                }
            }
        }

        Ok(letter
            .recipient_email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty()))
    }
}

/// Hand a dispatch run to the runtime and return immediately.
///
/// The verification path drops the returned handle; tests await it to
/// observe the summary.
pub fn spawn_dispatch_task<S, N>(
    dispatcher: LetterDispatcher<S, N>,
    owner_id: String,
) -> JoinHandle<DispatchSummary>
where
    S: VaultStore + 'static,
    N: LetterSender + 'static,
{
    tokio::spawn(async move { dispatcher.dispatch_for_owner(&owner_id).await })
}
