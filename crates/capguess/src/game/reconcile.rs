//! Pending-match reconciliation.
//!
//! A match scored with no identity present cannot be persisted. The reconciler
//! snapshots it, durably when possible, and flushes it into the guess
//! store the moment an identity shows up. Reconciliation fires on the
//! identity edge (absent then present), never on the level, so feeding
//! it the same identity repeatedly writes nothing twice.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use uuid::Uuid;

use super::{is_match, percentage_diff, GuessOutcome};
use crate::events::{EventEmitter, EVENT_AUTH_REQUIRED, EVENT_DECLINED, EVENT_RESOLVED};
use crate::identity::Identity;
use crate::store::{GuessStore, PendingSlot};
use crate::types::{GuessRecord, PendingMatch, UserId};

/// Reconciliation phase. `Resolved` is only observable from inside an
/// event handler; the machine returns to `Idle` right after emitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    AwaitingAuth,
    Reconciling,
    Resolved,
}

pub struct Reconciler {
    guesses: Arc<dyn GuessStore>,
    slot: Arc<dyn PendingSlot>,
    emitter: Arc<dyn EventEmitter>,
    state: ReconcileState,
    /// Freshly-computed match not yet confirmed in the durable slot.
    in_memory: Option<PendingMatch>,
    last_identity: Identity,
}

impl Reconciler {
    pub fn new(
        guesses: Arc<dyn GuessStore>,
        slot: Arc<dyn PendingSlot>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            guesses,
            slot,
            emitter,
            state: ReconcileState::Idle,
            in_memory: None,
            last_identity: Identity::Anonymous,
        }
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    /// Persist an outcome scored while an identity was present. Both
    /// matches and misses are recorded.
    pub async fn on_authenticated_outcome(&self, user: UserId, outcome: &GuessOutcome) {
        let record = build_record(user, outcome.guess, outcome.actual_value, outcome.subject_id);
        if let Err(e) = self.guesses.insert_guess(&record).await {
            // Swallowed so the reveal still happens.
            tracing::error!(error = %e, user = %user, "failed to persist guess record");
        }
    }

    /// Snapshot a match scored with no identity present. Overwrites any
    /// previous pending match; at most one exists at a time. Misses are
    /// ignored, nothing about them is worth bridging.
    pub async fn on_unauthenticated_match(&mut self, outcome: &GuessOutcome) {
        if !outcome.is_match {
            return;
        }
        let pending = PendingMatch {
            subject_id: outcome.subject_id,
            guess: outcome.guess,
            actual_value: outcome.actual_value,
        };
        self.in_memory = Some(pending.clone());
        if let Err(e) = self.slot.write(&pending).await {
            tracing::warn!(error = %e, "failed to externalize pending match, keeping it in memory");
        }
        self.state = ReconcileState::AwaitingAuth;
        self.emitter
            .emit(EVENT_AUTH_REQUIRED, json!({ "subjectId": pending.subject_id }));
        tracing::info!(subject = %pending.subject_id, "pending match recorded, awaiting identity");
    }

    /// The player explicitly chose to sign up or in after a match.
    pub fn await_auth(&mut self) {
        self.state = ReconcileState::AwaitingAuth;
    }

    /// The player declined the sign-in offer. The durable snapshot is
    /// intentionally left in place; it still flushes on a later
    /// sign-in.
    pub fn decline(&mut self) {
        if self.state == ReconcileState::AwaitingAuth {
            self.state = ReconcileState::Idle;
        }
        let subject = self.in_memory.as_ref().map(|p| p.subject_id);
        self.emitter
            .emit(EVENT_DECLINED, json!({ "subjectId": subject }));
        tracing::info!("sign-in declined, pending match left in durable storage");
    }

    /// Window closed or flow abandoned without an identity. Stops
    /// waiting; durable state is untouched.
    pub fn stop_waiting(&mut self) {
        self.state = ReconcileState::Idle;
    }

    /// Feed the current identity. Only the absent-to-present edge
    /// triggers reconciliation, so this is safe to call as often as the
    /// auth layer re-announces its state.
    pub async fn observe(&mut self, current: Identity) {
        let previous = std::mem::replace(&mut self.last_identity, current.clone());
        let arrived = !previous.is_authenticated() && current.is_authenticated();

        if !arrived {
            if previous.is_authenticated() && !current.is_authenticated() {
                // Sign-out. Stop waiting, keep the durable snapshot.
                self.state = ReconcileState::Idle;
                tracing::debug!("identity cleared, reconciler idle");
            }
            return;
        }

        let Some(user) = current.user_id() else {
            return;
        };
        self.reconcile(user).await;
    }

    /// Drive the reconciler from an identity subscription until the
    /// sender side goes away.
    pub async fn run(&mut self, mut rx: watch::Receiver<Identity>) {
        // Prime with the current value so a sign-in that raced the task
        // startup is not missed.
        let current = rx.borrow_and_update().clone();
        self.observe(current).await;
        while rx.changed().await.is_ok() {
            let current = rx.borrow_and_update().clone();
            self.observe(current).await;
        }
    }

    async fn reconcile(&mut self, user: UserId) {
        // The durable snapshot wins over a fresh in-memory match.
        let durable = match self.slot.read().await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read pending-match slot");
                None
            }
        };
        let from_slot = durable.is_some();
        let Some(pending) = durable.or_else(|| self.in_memory.take()) else {
            // Identity arrived with nothing to flush. Not an error.
            self.state = ReconcileState::Idle;
            return;
        };

        self.state = ReconcileState::Reconciling;
        tracing::info!(subject = %pending.subject_id, user = %user, "reconciling pending match");

        let record = build_record(user, pending.guess, pending.actual_value, pending.subject_id);
        match self.guesses.insert_guess(&record).await {
            Ok(()) => {
                self.in_memory = None;
                if let Err(e) = self.slot.clear().await {
                    tracing::warn!(error = %e, "failed to clear pending-match slot after flush");
                }
                self.state = ReconcileState::Resolved;
                self.emitter.emit(
                    EVENT_RESOLVED,
                    json!({ "subjectId": pending.subject_id, "isMatch": record.is_match }),
                );
                tracing::info!(record = %record.id, "pending match resolved");
                self.state = ReconcileState::Idle;
            }
            Err(e) => {
                // Swallowed: the reveal proceeds. The snapshot stays in
                // durable storage for a retry on the next sign-in.
                tracing::error!(error = %e, "pending-match flush failed, snapshot retained");
                if !from_slot {
                    if let Err(e) = self.slot.write(&pending).await {
                        tracing::warn!(error = %e, "failed to re-externalize pending match");
                    }
                }
                self.in_memory = None;
                self.state = ReconcileState::Idle;
            }
        }
    }
}

fn build_record(
    user: UserId,
    guess: f64,
    actual_value: f64,
    subject_id: crate::types::CompanyId,
) -> GuessRecord {
    GuessRecord {
        id: Uuid::new_v4(),
        user_id: user,
        company_id: subject_id,
        guess,
        actual_value,
        is_match: is_match(guess, actual_value),
        percentage_diff: percentage_diff(guess, actual_value),
        created_at: Utc::now(),
    }
}
