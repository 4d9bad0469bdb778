//! Unlock state machine.
//!
//! Pure transition function for the PIN/PUK/ME unlock flow: every
//! input arrives as an [`UnlockEvent`], every side effect leaves as an
//! [`UnlockAction`]. The orchestration layer owns the IO.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::ids::SlotId;
use crate::policy::UnlockPolicy;
use crate::prompt::Prompt;
use crate::secret::SecretDigits;
use crate::sim::{LockKind, MeVerifyResult, RetryCount, SlotRecord};
use crate::unlock::action::UnlockAction;
use crate::unlock::event::UnlockEvent;
use crate::unlock::state::EntryState;
use crate::validate::validate_entry;

/// Drives the unlock interaction for one session.
///
/// Exactly one slot is active at a time. At most one verification
/// request is outstanding; entries submitted while one is in flight
/// are dropped, not queued.
#[derive(Debug)]
pub struct UnlockStateMachine {
    state: EntryState,
    context: UnlockContext,
    policy: UnlockPolicy,
}

/// Session context shared across states.
#[derive(Debug, Default)]
struct UnlockContext {
    /// Slot currently being unlocked.
    active: Option<SlotId>,
    /// Last reported security state per observed slot.
    slots: BTreeMap<SlotId, SlotRecord>,
    /// Collected PUK and replacement PIN, buffered until submission.
    pending: PendingEntry,
    /// A verification request is outstanding.
    in_flight: bool,
    /// Security state of the active slot before the latest report.
    /// The repoll scan only runs when this was a network lock.
    last_lock: Option<LockKind>,
    /// Message currently owning the message area, re-emitted when the
    /// slot re-reports an unchanged lock state.
    last_prompt: Option<Prompt>,
    /// PUK count at the time the PUK prompt was last built, used to
    /// detect whether a failed attempt consumed a retry.
    last_puk_retries: Option<RetryCount>,
    /// Slot whose state is being re-polled after the active slot
    /// reached ready.
    repoll_target: Option<SlotId>,
}

#[derive(Debug, Default)]
struct PendingEntry {
    puk: Option<SecretDigits>,
    new_pin: Option<SecretDigits>,
}

impl PendingEntry {
    fn clear(&mut self) {
        self.puk = None;
        self.new_pin = None;
    }
}

impl UnlockStateMachine {
    pub fn new(policy: UnlockPolicy) -> Self {
        Self {
            state: EntryState::Idle,
            context: UnlockContext::default(),
            policy,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn active_slot(&self) -> Option<SlotId> {
        self.context.active
    }

    /// Apply one event and return the new state plus the effects to
    /// execute. Events must be applied in arrival order.
    pub fn handle_event(
        &mut self,
        event: UnlockEvent,
        now: DateTime<Utc>,
    ) -> (EntryState, Vec<UnlockAction>) {
        let from = self.state;
        let (next, actions) = self.transition(event, now);
        if from != next {
            debug!(?from, to = ?next, "unlock state transition");
        }
        self.state = next;
        (next, actions)
    }

    fn transition(
        &mut self,
        event: UnlockEvent,
        now: DateTime<Utc>,
    ) -> (EntryState, Vec<UnlockAction>) {
        match (self.state, event) {
            // Selecting a slot restarts the interaction from any state.
            (_, UnlockEvent::SlotSelected { slot, record }) => self.begin_slot(slot, record),

            (_, UnlockEvent::Reset) => {
                self.context = UnlockContext::default();
                (EntryState::Idle, vec![UnlockAction::CancelConfirmTimer])
            }

            (EntryState::PermanentlyLocked, event) => {
                warn!(?event, "event ignored after permanent lockout");
                (EntryState::PermanentlyLocked, vec![])
            }

            (_, UnlockEvent::CancelRequested) => {
                self.context.pending.clear();
                self.context.in_flight = false;
                (
                    EntryState::Idle,
                    vec![
                        UnlockAction::CancelConfirmTimer,
                        UnlockAction::ReportUserActivity,
                        UnlockAction::Dismiss { advance: true },
                    ],
                )
            }

            (state, UnlockEvent::EntrySubmitted { text }) => self.on_entry(state, text),

            (state, UnlockEvent::PinResult { ok, pin_retries, puk_retries }) => {
                self.on_pin_result(state, ok, pin_retries, puk_retries, now)
            }

            (state, UnlockEvent::PukResult { ok, puk_retries }) => {
                self.on_puk_result(state, ok, puk_retries, now)
            }

            (state, UnlockEvent::MeResult { result }) => self.on_me_result(state, result, now),

            (state, UnlockEvent::LockKindChanged { slot, record }) => {
                self.on_lock_kind_changed(state, slot, record)
            }

            (EntryState::ConfirmWait, UnlockEvent::ConfirmTimeout) => match self.context.active {
                Some(slot) => (
                    EntryState::Idle,
                    vec![
                        UnlockAction::ReportUnlocked { slot },
                        UnlockAction::Dismiss { advance: true },
                    ],
                ),
                None => {
                    warn!("confirmation timeout without an active slot");
                    (EntryState::Idle, vec![])
                }
            },

            (state, UnlockEvent::ConfirmTimeout) => {
                warn!(?state, "stale confirmation timeout ignored");
                (state, vec![])
            }
        }
    }

    fn begin_slot(&mut self, slot: SlotId, record: SlotRecord) -> (EntryState, Vec<UnlockAction>) {
        self.context.active = Some(slot);
        self.context.pending.clear();
        self.context.in_flight = false;
        self.context.repoll_target = None;
        self.context.last_prompt = None;
        self.context.last_lock = Some(record.kind);

        let mut actions = vec![UnlockAction::CancelConfirmTimer];
        let state = match record.kind {
            LockKind::PinRequired => {
                self.remember_prompt(
                    &mut actions,
                    Prompt::EnterPin {
                        wrong: false,
                        retries: record.pin_retries,
                    },
                );
                EntryState::EnterPin
            }
            LockKind::PukRequired => {
                self.remember_prompt(
                    &mut actions,
                    Prompt::EnterPuk {
                        wrong: false,
                        retries: record.puk_retries,
                    },
                );
                EntryState::EnterPuk
            }
            LockKind::NetworkLocked => {
                self.remember_prompt(
                    &mut actions,
                    Prompt::EnterMe {
                        wrong: false,
                        category: record.me_category,
                        retries: record.me_retries,
                    },
                );
                EntryState::EnterMe
            }
            // Nothing to unlock on this slot.
            _ => EntryState::Idle,
        };
        self.context.slots.insert(slot, record);
        (state, actions)
    }

    fn on_entry(&mut self, state: EntryState, text: SecretDigits) -> (EntryState, Vec<UnlockAction>) {
        if self.context.in_flight {
            warn!(?state, "verification in flight, entry dropped");
            return (state, vec![]);
        }
        let slot = match self.context.active {
            Some(slot) => slot,
            None => {
                warn!(?state, "entry without an active slot ignored");
                return (state, vec![]);
            }
        };

        match state {
            EntryState::EnterPin => {
                if !validate_entry(text.expose(), false) {
                    return (
                        EntryState::EnterPin,
                        vec![
                            UnlockAction::SetMessage(Prompt::InvalidPin),
                            UnlockAction::ReportUserActivity,
                        ],
                    );
                }
                self.context.in_flight = true;
                (
                    EntryState::EnterPin,
                    vec![UnlockAction::SubmitPin { slot, pin: text }],
                )
            }

            EntryState::EnterMe => {
                if !validate_entry(text.expose(), false) {
                    return (
                        EntryState::EnterMe,
                        vec![
                            UnlockAction::SetMessage(Prompt::CodeLength),
                            UnlockAction::ReportUserActivity,
                        ],
                    );
                }
                self.context.in_flight = true;
                (
                    EntryState::EnterMe,
                    vec![UnlockAction::SubmitMe {
                        slot,
                        password: text,
                    }],
                )
            }

            EntryState::EnterPuk => {
                let mut actions = Vec::new();
                let next = if validate_entry(text.expose(), true) {
                    self.context.pending.puk = Some(text);
                    self.remember_prompt(&mut actions, Prompt::EnterNewPin { mismatch: false });
                    EntryState::EnterNewPin
                } else {
                    actions.push(UnlockAction::SetMessage(Prompt::InvalidPuk));
                    EntryState::EnterPuk
                };
                actions.push(UnlockAction::ReportUserActivity);
                (next, actions)
            }

            EntryState::EnterNewPin => {
                let mut actions = Vec::new();
                let next = if validate_entry(text.expose(), false) {
                    self.context.pending.new_pin = Some(text);
                    self.remember_prompt(&mut actions, Prompt::ConfirmNewPin);
                    EntryState::ReenterNewPin
                } else {
                    actions.push(UnlockAction::SetMessage(Prompt::CodeLength));
                    EntryState::EnterNewPin
                };
                actions.push(UnlockAction::ReportUserActivity);
                (next, actions)
            }

            EntryState::ReenterNewPin => {
                let matches = self
                    .context
                    .pending
                    .new_pin
                    .as_ref()
                    .map(|pin| *pin == text)
                    .unwrap_or(false);
                if !matches {
                    self.context.pending.new_pin = None;
                    let mut actions = Vec::new();
                    self.remember_prompt(&mut actions, Prompt::EnterNewPin { mismatch: true });
                    actions.push(UnlockAction::ReportUserActivity);
                    return (EntryState::EnterNewPin, actions);
                }
                match (self.context.pending.puk.take(), self.context.pending.new_pin.take()) {
                    (Some(puk), Some(new_pin)) => {
                        self.context.in_flight = true;
                        let mut actions = Vec::new();
                        self.remember_prompt(&mut actions, Prompt::Blank);
                        actions.push(UnlockAction::SubmitPuk { slot, puk, new_pin });
                        actions.push(UnlockAction::ReportUserActivity);
                        (EntryState::EnterFinish, actions)
                    }
                    _ => {
                        // Buffer lost, collect the PUK again.
                        warn!("puk entry buffer incomplete, restarting collection");
                        let retries = self.active_record().puk_retries;
                        let mut actions = Vec::new();
                        self.remember_prompt(
                            &mut actions,
                            Prompt::EnterPuk {
                                wrong: false,
                                retries,
                            },
                        );
                        (EntryState::EnterPuk, actions)
                    }
                }
            }

            other => {
                warn!(state = ?other, "entry ignored in this state");
                (other, vec![])
            }
        }
    }

    fn on_pin_result(
        &mut self,
        state: EntryState,
        ok: bool,
        pin_retries: RetryCount,
        puk_retries: RetryCount,
        now: DateTime<Utc>,
    ) -> (EntryState, Vec<UnlockAction>) {
        self.context.in_flight = false;
        if state != EntryState::EnterPin {
            warn!(?state, "pin result arrived outside pin entry");
            return (state, vec![]);
        }
        self.update_active_record(|record| {
            record.pin_retries = pin_retries;
            record.puk_retries = puk_retries;
        });

        if ok {
            return self.begin_confirm_wait(now, Some(Prompt::PinAccepted));
        }

        let mut actions = Vec::new();
        let next = if pin_retries.exhausted() {
            // PIN attempts are gone, the PUK path begins.
            self.remember_prompt(
                &mut actions,
                Prompt::EnterPuk {
                    wrong: true,
                    retries: puk_retries,
                },
            );
            EntryState::EnterPuk
        } else {
            self.remember_prompt(
                &mut actions,
                Prompt::EnterPin {
                    wrong: true,
                    retries: pin_retries,
                },
            );
            EntryState::EnterPin
        };
        actions.push(UnlockAction::ReportUserActivity);
        (next, actions)
    }

    fn on_puk_result(
        &mut self,
        state: EntryState,
        ok: bool,
        puk_retries: RetryCount,
        now: DateTime<Utc>,
    ) -> (EntryState, Vec<UnlockAction>) {
        self.context.in_flight = false;
        if state != EntryState::EnterFinish {
            warn!(?state, "puk result arrived outside submission");
            return (state, vec![]);
        }
        self.update_active_record(|record| {
            record.puk_retries = puk_retries;
        });

        if ok {
            return self.begin_confirm_wait(now, Some(Prompt::PukAccepted));
        }

        let count_changed = self.context.last_puk_retries != Some(puk_retries);
        let mut actions = Vec::new();
        self.remember_prompt(
            &mut actions,
            Prompt::EnterPuk {
                wrong: false,
                retries: puk_retries,
            },
        );

        if puk_retries.exhausted() {
            actions.push(UnlockAction::ShowNotice {
                prompt: Prompt::SimPermanentlyLocked,
                blocking: true,
            });
            actions.push(UnlockAction::Dismiss { advance: true });
            actions.push(UnlockAction::ReportUserActivity);
            return (EntryState::PermanentlyLocked, actions);
        }

        let notice = if count_changed {
            Prompt::WrongPuk {
                retries: puk_retries,
            }
        } else {
            Prompt::WrongEntry
        };
        actions.push(UnlockAction::ShowNotice {
            prompt: notice,
            blocking: false,
        });
        actions.push(UnlockAction::ReportUserActivity);
        (EntryState::EnterPuk, actions)
    }

    fn on_me_result(
        &mut self,
        state: EntryState,
        result: MeVerifyResult,
        now: DateTime<Utc>,
    ) -> (EntryState, Vec<UnlockAction>) {
        self.context.in_flight = false;
        if state != EntryState::EnterMe {
            warn!(?state, "me result arrived outside me entry");
            return (state, vec![]);
        }

        match result {
            MeVerifyResult::Pass => self.begin_confirm_wait(now, None),

            MeVerifyResult::IncorrectPassword => {
                self.update_active_record(|record| {
                    record.me_retries = record.me_retries.decremented();
                });
                let record = self.active_record();
                if record.me_retries.exhausted() {
                    return (
                        EntryState::PermanentlyLocked,
                        vec![
                            UnlockAction::ShowNotice {
                                prompt: Prompt::MeSlotLocked,
                                blocking: true,
                            },
                            UnlockAction::Dismiss { advance: true },
                            UnlockAction::ReportUserActivity,
                        ],
                    );
                }
                let mut actions = Vec::new();
                self.remember_prompt(
                    &mut actions,
                    Prompt::EnterMe {
                        wrong: true,
                        category: record.me_category,
                        retries: record.me_retries,
                    },
                );
                actions.push(UnlockAction::ReportUserActivity);
                (EntryState::EnterMe, actions)
            }

            // Remote failures on the ME path are fatal, not retried.
            MeVerifyResult::ServiceFailure => (
                EntryState::Idle,
                vec![
                    UnlockAction::ShowNotice {
                        prompt: Prompt::MeUnlockFailed,
                        blocking: true,
                    },
                    UnlockAction::Dismiss { advance: true },
                    UnlockAction::ReportUserActivity,
                ],
            ),
        }
    }

    fn on_lock_kind_changed(
        &mut self,
        state: EntryState,
        slot: SlotId,
        record: SlotRecord,
    ) -> (EntryState, Vec<UnlockAction>) {
        if self.context.active == Some(slot) {
            let kind = record.kind;
            self.context.slots.insert(slot, record.clone());

            let mut actions = vec![UnlockAction::CancelConfirmTimer];
            let next = match kind {
                LockKind::Ready => {
                    let (next, more) = self.ready_process();
                    actions.extend(more);
                    next
                }
                LockKind::Absent => {
                    actions.push(UnlockAction::Dismiss { advance: true });
                    EntryState::Idle
                }
                LockKind::NetworkLocked => {
                    if record.me_retries.exhausted() {
                        // Permanently locked, the lockout notice was
                        // already shown upstream.
                        actions.push(UnlockAction::Dismiss { advance: true });
                        EntryState::Idle
                    } else {
                        self.context.pending.clear();
                        self.remember_prompt(
                            &mut actions,
                            Prompt::EnterMe {
                                wrong: false,
                                category: record.me_category,
                                retries: record.me_retries,
                            },
                        );
                        EntryState::EnterMe
                    }
                }
                LockKind::PinRequired | LockKind::PukRequired => {
                    if let Some(prompt) = self.context.last_prompt.clone() {
                        actions.push(UnlockAction::SetMessage(prompt));
                    }
                    state
                }
                LockKind::Unknown => state,
            };
            self.context.last_lock = Some(kind);
            (next, actions)
        } else if self.context.repoll_target == Some(slot) && state == EntryState::RepollWait {
            let kind = record.kind;
            self.context.slots.insert(slot, record);
            if kind == LockKind::Ready {
                // The repolled slot cleared together with the active
                // one, keep scanning as if it had been network locked.
                self.context.last_lock = Some(LockKind::NetworkLocked);
                self.context.repoll_target = None;
                self.ready_process()
            } else {
                (state, vec![])
            }
        } else {
            self.context.slots.insert(slot, record);
            (state, vec![])
        }
    }

    /// The active slot reached ready. Decide whether another slot
    /// needs a guided re-poll before the session ends.
    fn ready_process(&mut self) -> (EntryState, Vec<UnlockAction>) {
        match self.next_repoll_target() {
            Some(target) => {
                self.context.repoll_target = Some(target);
                (
                    EntryState::RepollWait,
                    vec![UnlockAction::Repoll { slot: target }],
                )
            }
            None => (
                EntryState::Idle,
                vec![UnlockAction::Dismiss { advance: true }],
            ),
        }
    }

    /// Scan slots in ascending order for the next network-locked one.
    ///
    /// Only runs when the slot that just unlocked was network locked.
    /// The scan stops at the first slot that needs PIN or PUK entry
    /// instead; network-locked slots are assumed contiguous at the
    /// front of the scan.
    fn next_repoll_target(&self) -> Option<SlotId> {
        if self.context.last_lock != Some(LockKind::NetworkLocked) {
            return None;
        }
        for index in 0..self.policy.slot_count {
            let slot = SlotId::new(index);
            let kind = self
                .context
                .slots
                .get(&slot)
                .map(|record| record.kind)
                .unwrap_or(LockKind::Unknown);
            if !kind.requires_entry() {
                continue;
            }
            if kind == LockKind::NetworkLocked {
                return Some(slot);
            }
            break;
        }
        None
    }

    fn begin_confirm_wait(
        &mut self,
        now: DateTime<Utc>,
        pass_notice: Option<Prompt>,
    ) -> (EntryState, Vec<UnlockAction>) {
        let deadline = now + chrono::Duration::milliseconds(self.policy.confirm_timeout_ms as i64);
        let mut actions = vec![UnlockAction::StartConfirmTimer { deadline }];
        if self.policy.show_pass_notice {
            if let Some(prompt) = pass_notice {
                actions.push(UnlockAction::ShowNotice {
                    prompt,
                    blocking: false,
                });
            }
        }
        actions.push(UnlockAction::ReportUserActivity);
        (EntryState::ConfirmWait, actions)
    }

    /// Route a prompt through the message area and keep it as the one
    /// to re-show on redundant lock-state reports.
    fn remember_prompt(&mut self, actions: &mut Vec<UnlockAction>, prompt: Prompt) {
        if let Prompt::EnterPuk { retries, .. } = &prompt {
            self.context.last_puk_retries = Some(*retries);
        }
        self.context.last_prompt = Some(prompt.clone());
        actions.push(UnlockAction::SetMessage(prompt));
    }

    fn active_record(&self) -> SlotRecord {
        self.context
            .active
            .and_then(|slot| self.context.slots.get(&slot))
            .cloned()
            .unwrap_or_default()
    }

    fn update_active_record(&mut self, update: impl FnOnce(&mut SlotRecord)) {
        if let Some(slot) = self.context.active {
            let record = self.context.slots.entry(slot).or_default();
            update(record);
        }
    }
}

impl Default for UnlockStateMachine {
    fn default() -> Self {
        Self::new(UnlockPolicy::default())
    }
}
