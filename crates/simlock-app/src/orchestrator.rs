//! Unlock orchestrator.
//!
//! Coordinates the unlock state machine and its side effects. All
//! inputs funnel through dispatch, which serializes them, applies them
//! to the machine, and executes the resulting actions against the
//! ports. Verification calls run in spawned tasks and come back as
//! ordinary events, so the machine only ever sees one event at a time.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

use simlock_core::ports::{PromptSinkPort, SimVerificationPort, UnlockCallbackPort};
use simlock_core::{
    EntryState, LockKind, MeVerifyResult, RetryKind, SecretDigits, SlotId, SlotRecord,
    UnlockAction, UnlockEvent, UnlockPolicy, UnlockStateMachine,
};

/// Errors produced by the unlock orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    #[error("unlock callback failed: {0}")]
    Callback(#[source] anyhow::Error),
}

/// Orchestrator that drives unlock state and side effects.
pub struct UnlockOrchestrator {
    machine: Mutex<UnlockStateMachine>,
    // Serializes concurrent dispatch calls so two inputs never read
    // the same state and execute duplicate actions.
    dispatch_lock: Mutex<()>,
    verification: Arc<dyn SimVerificationPort>,
    prompts: Arc<dyn PromptSinkPort>,
    callback: Arc<dyn UnlockCallbackPort>,
    confirm_timer: Mutex<Option<JoinHandle<()>>>,
    // Handle for tasks that re-enter dispatch with their results.
    this: Weak<UnlockOrchestrator>,
}

impl UnlockOrchestrator {
    pub fn new(
        policy: UnlockPolicy,
        verification: Arc<dyn SimVerificationPort>,
        prompts: Arc<dyn PromptSinkPort>,
        callback: Arc<dyn UnlockCallbackPort>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            machine: Mutex::new(UnlockStateMachine::new(policy)),
            dispatch_lock: Mutex::new(()),
            verification,
            prompts,
            callback,
            confirm_timer: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// Make a slot the active unlock target, reading its current
    /// security state from the verification service.
    pub async fn select_slot(&self, slot: SlotId) -> Result<EntryState, UnlockError> {
        let record = self.snapshot(slot, self.verification.lock_kind(slot));
        self.dispatch(UnlockEvent::SlotSelected { slot, record })
            .await
    }

    /// Submit the entry field content for the current stage.
    pub async fn submit_entry(&self, text: SecretDigits) -> Result<EntryState, UnlockError> {
        self.dispatch(UnlockEvent::EntrySubmitted { text }).await
    }

    /// Apply a lock-state report from the telephony layer.
    pub async fn on_lock_kind_changed(
        &self,
        slot: SlotId,
        kind: LockKind,
    ) -> Result<EntryState, UnlockError> {
        let record = self.snapshot(slot, kind);
        self.dispatch(UnlockEvent::LockKindChanged { slot, record })
            .await
    }

    /// The user abandoned the flow.
    pub async fn cancel(&self) -> Result<EntryState, UnlockError> {
        self.dispatch(UnlockEvent::CancelRequested).await
    }

    /// Tear the session down (screen detach).
    pub async fn reset(&self) -> Result<EntryState, UnlockError> {
        self.dispatch(UnlockEvent::Reset).await
    }

    pub async fn state(&self) -> EntryState {
        self.machine.lock().await.state()
    }

    pub async fn active_slot(&self) -> Option<SlotId> {
        self.machine.lock().await.active_slot()
    }

    fn snapshot(&self, slot: SlotId, kind: LockKind) -> SlotRecord {
        SlotRecord {
            kind,
            pin_retries: self.verification.retry_count(slot, RetryKind::Pin),
            puk_retries: self.verification.retry_count(slot, RetryKind::Puk),
            me_retries: self.verification.retry_count(slot, RetryKind::Me),
            me_category: self.verification.me_category(slot),
        }
    }

    async fn dispatch(&self, event: UnlockEvent) -> Result<EntryState, UnlockError> {
        let _dispatch_guard = self.dispatch_lock.lock().await;

        let span = info_span!("unlock_orchestrator.dispatch", event = ?event);
        async {
            let (from, next, actions) = {
                let mut machine = self.machine.lock().await;
                let from = machine.state();
                let (next, actions) = machine.handle_event(event, Utc::now());
                (from, next, actions)
            };
            if from != next {
                info!(?from, to = ?next, "unlock state transition");
            }
            self.execute_actions(actions).await?;
            Ok(next)
        }
        .instrument(span)
        .await
    }

    async fn execute_actions(&self, actions: Vec<UnlockAction>) -> Result<(), UnlockError> {
        for action in actions {
            debug!(?action, "executing unlock action");
            match action {
                UnlockAction::SetMessage(prompt) => {
                    self.prompts.set_message(&prompt).await;
                }
                UnlockAction::ShowNotice { prompt, blocking } => {
                    self.prompts.show_notice(&prompt, blocking).await;
                }
                UnlockAction::SubmitPin { slot, pin } => {
                    self.spawn_pin_check(slot, pin);
                }
                UnlockAction::SubmitPuk { slot, puk, new_pin } => {
                    self.spawn_puk_check(slot, puk, new_pin);
                }
                UnlockAction::SubmitMe { slot, password } => {
                    self.spawn_me_check(slot, password);
                }
                UnlockAction::Repoll { slot } => {
                    self.spawn_repoll(slot);
                }
                UnlockAction::StartConfirmTimer { deadline } => {
                    self.arm_confirm_timer(deadline).await;
                }
                UnlockAction::CancelConfirmTimer => {
                    self.disarm_confirm_timer().await;
                }
                UnlockAction::ReportUserActivity => {
                    self.callback
                        .report_user_activity()
                        .await
                        .map_err(UnlockError::Callback)?;
                }
                UnlockAction::ReportUnlocked { slot } => {
                    self.callback
                        .report_unlocked(slot)
                        .await
                        .map_err(UnlockError::Callback)?;
                }
                UnlockAction::Dismiss { advance } => {
                    self.callback
                        .dismiss(advance)
                        .await
                        .map_err(UnlockError::Callback)?;
                }
            }
        }

        Ok(())
    }

    fn spawn_pin_check(&self, slot: SlotId, pin: SecretDigits) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let ok = match this.verification.supply_pin(slot, pin).await {
                Ok(ok) => ok,
                Err(err) => {
                    // Remote failures count as an incorrect entry on
                    // the PIN path.
                    error!(error = %err, %slot, "pin check failed");
                    false
                }
            };
            let pin_retries = this.verification.retry_count(slot, RetryKind::Pin);
            let puk_retries = this.verification.retry_count(slot, RetryKind::Puk);
            let event = UnlockEvent::PinResult {
                ok,
                pin_retries,
                puk_retries,
            };
            if let Err(err) = this.dispatch(event).await {
                error!(error = %err, "failed to apply pin result");
            }
        });
    }

    fn spawn_puk_check(&self, slot: SlotId, puk: SecretDigits, new_pin: SecretDigits) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let ok = match this.verification.supply_puk(slot, puk, new_pin).await {
                Ok(ok) => ok,
                Err(err) => {
                    error!(error = %err, %slot, "puk check failed");
                    false
                }
            };
            let puk_retries = this.verification.retry_count(slot, RetryKind::Puk);
            if let Err(err) = this.dispatch(UnlockEvent::PukResult { ok, puk_retries }).await {
                error!(error = %err, "failed to apply puk result");
            }
        });
    }

    fn spawn_me_check(&self, slot: SlotId, password: SecretDigits) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let result = match this.verification.supply_me(slot, password).await {
                Ok(result) => result,
                Err(err) => {
                    // Remote failures on the ME path are fatal.
                    error!(error = %err, %slot, "me check failed");
                    MeVerifyResult::ServiceFailure
                }
            };
            if let Err(err) = this.dispatch(UnlockEvent::MeResult { result }).await {
                error!(error = %err, "failed to apply me result");
            }
        });
    }

    fn spawn_repoll(&self, slot: SlotId) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            match this.verification.repoll(slot).await {
                Ok(kind) => {
                    if let Err(err) = this.on_lock_kind_changed(slot, kind).await {
                        error!(error = %err, "failed to apply repoll result");
                    }
                }
                Err(err) => {
                    error!(error = %err, %slot, "repoll failed");
                }
            }
        });
    }

    async fn arm_confirm_timer(&self, deadline: DateTime<Utc>) {
        let mut guard = self.confirm_timer.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        *guard = Some(tokio::spawn(Self::confirm_timeout_task(this, deadline)));
    }

    // Type-erased to `dyn Future + Send` so spawning this task does not
    // create a self-referential Send-inference cycle: the timer re-enters
    // `dispatch`, whose future would otherwise transitively depend on the
    // Send-ness of this very spawn. Boxing at the function boundary breaks
    // the recursion without altering behavior.
    fn confirm_timeout_task(
        this: Arc<Self>,
        deadline: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            let wait = (deadline - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            if let Err(err) = this.dispatch(UnlockEvent::ConfirmTimeout).await {
                error!(error = %err, "failed to apply confirmation timeout");
            }
        })
    }

    async fn disarm_confirm_timer(&self) {
        if let Some(handle) = self.confirm_timer.lock().await.take() {
            handle.abort();
        }
    }
}
