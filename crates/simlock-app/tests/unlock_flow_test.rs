//! End-to-end unlock flows against fake ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use simlock_app::UnlockOrchestrator;
use simlock_core::ports::{PromptSinkPort, SimVerificationPort, UnlockCallbackPort};
use simlock_core::{
    EntryState, LockKind, MeCategory, MeVerifyResult, Prompt, RetryCount, RetryKind, SecretDigits,
    SlotId, UnlockPolicy,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
enum Submission {
    Pin(SlotId, String),
    Puk(SlotId, String, String),
    Me(SlotId, String),
    Repoll(SlotId),
}

#[derive(Debug, Clone)]
struct FakeSlot {
    kind: LockKind,
    pin_retries: u32,
    puk_retries: u32,
    me_retries: u32,
    me_category: MeCategory,
    pin: String,
    puk: String,
    me_password: String,
    me_failure: bool,
    repoll_kind: LockKind,
}

impl Default for FakeSlot {
    fn default() -> Self {
        Self {
            kind: LockKind::Ready,
            pin_retries: 3,
            puk_retries: 10,
            me_retries: 5,
            me_category: MeCategory::Network,
            pin: "0000".to_string(),
            puk: "00000000".to_string(),
            me_password: "0000".to_string(),
            me_failure: false,
            repoll_kind: LockKind::Ready,
        }
    }
}

#[derive(Default)]
struct FakeVerification {
    slots: StdMutex<HashMap<SlotId, FakeSlot>>,
    submissions: StdMutex<Vec<Submission>>,
    response_delay: Option<StdDuration>,
}

impl FakeVerification {
    fn with_slots(slots: Vec<(u8, FakeSlot)>) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut guard = fake.slots.lock().unwrap();
            for (index, slot) in slots {
                guard.insert(SlotId::new(index), slot);
            }
        }
        Arc::new(fake)
    }

    fn with_delayed_slots(slots: Vec<(u8, FakeSlot)>, delay: StdDuration) -> Arc<Self> {
        let fake = Self {
            response_delay: Some(delay),
            ..Self::default()
        };
        {
            let mut guard = fake.slots.lock().unwrap();
            for (index, slot) in slots {
                guard.insert(SlotId::new(index), slot);
            }
        }
        Arc::new(fake)
    }

    fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    async fn delay(&self) {
        if let Some(delay) = self.response_delay {
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl SimVerificationPort for FakeVerification {
    async fn supply_pin(&self, slot: SlotId, pin: SecretDigits) -> anyhow::Result<bool> {
        self.submissions
            .lock()
            .unwrap()
            .push(Submission::Pin(slot, pin.expose().to_string()));
        self.delay().await;
        let mut slots = self.slots.lock().unwrap();
        let card = slots.entry(slot).or_default();
        if card.pin == pin.expose() {
            Ok(true)
        } else {
            card.pin_retries = card.pin_retries.saturating_sub(1);
            Ok(false)
        }
    }

    async fn supply_puk(
        &self,
        slot: SlotId,
        puk: SecretDigits,
        new_pin: SecretDigits,
    ) -> anyhow::Result<bool> {
        self.submissions.lock().unwrap().push(Submission::Puk(
            slot,
            puk.expose().to_string(),
            new_pin.expose().to_string(),
        ));
        self.delay().await;
        let mut slots = self.slots.lock().unwrap();
        let card = slots.entry(slot).or_default();
        if card.puk == puk.expose() {
            Ok(true)
        } else {
            card.puk_retries = card.puk_retries.saturating_sub(1);
            Ok(false)
        }
    }

    async fn supply_me(&self, slot: SlotId, password: SecretDigits) -> anyhow::Result<MeVerifyResult> {
        self.submissions
            .lock()
            .unwrap()
            .push(Submission::Me(slot, password.expose().to_string()));
        self.delay().await;
        let slots = self.slots.lock().unwrap();
        let card = slots.get(&slot).cloned().unwrap_or_default();
        if card.me_failure {
            anyhow::bail!("phone service unreachable");
        }
        if card.me_password == password.expose() {
            Ok(MeVerifyResult::Pass)
        } else {
            Ok(MeVerifyResult::IncorrectPassword)
        }
    }

    fn lock_kind(&self, slot: SlotId) -> LockKind {
        self.slots
            .lock()
            .unwrap()
            .get(&slot)
            .map(|card| card.kind)
            .unwrap_or(LockKind::Absent)
    }

    fn retry_count(&self, slot: SlotId, kind: RetryKind) -> RetryCount {
        let slots = self.slots.lock().unwrap();
        let card = match slots.get(&slot) {
            Some(card) => card,
            None => return RetryCount::Unknown,
        };
        let count = match kind {
            RetryKind::Pin => card.pin_retries,
            RetryKind::Puk => card.puk_retries,
            RetryKind::Me => card.me_retries,
        };
        RetryCount::Remaining(count)
    }

    fn me_category(&self, slot: SlotId) -> MeCategory {
        self.slots
            .lock()
            .unwrap()
            .get(&slot)
            .map(|card| card.me_category)
            .unwrap_or(MeCategory::Network)
    }

    async fn repoll(&self, slot: SlotId) -> anyhow::Result<LockKind> {
        self.submissions
            .lock()
            .unwrap()
            .push(Submission::Repoll(slot));
        self.delay().await;
        let mut slots = self.slots.lock().unwrap();
        let card = slots.entry(slot).or_default();
        card.kind = card.repoll_kind;
        Ok(card.kind)
    }
}

#[derive(Default)]
struct RecordingPromptSink {
    messages: StdMutex<Vec<Prompt>>,
    notices: StdMutex<Vec<(Prompt, bool)>>,
}

impl RecordingPromptSink {
    fn messages(&self) -> Vec<Prompt> {
        self.messages.lock().unwrap().clone()
    }

    fn notices(&self) -> Vec<(Prompt, bool)> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptSinkPort for RecordingPromptSink {
    async fn set_message(&self, prompt: &Prompt) {
        self.messages.lock().unwrap().push(prompt.clone());
    }

    async fn show_notice(&self, prompt: &Prompt, blocking: bool) {
        self.notices.lock().unwrap().push((prompt.clone(), blocking));
    }
}

#[derive(Default)]
struct RecordingCallback {
    activity: AtomicUsize,
    dismissals: StdMutex<Vec<bool>>,
    unlocked: StdMutex<Vec<SlotId>>,
}

impl RecordingCallback {
    fn dismissals(&self) -> Vec<bool> {
        self.dismissals.lock().unwrap().clone()
    }

    fn unlocked(&self) -> Vec<SlotId> {
        self.unlocked.lock().unwrap().clone()
    }
}

#[async_trait]
impl UnlockCallbackPort for RecordingCallback {
    async fn report_user_activity(&self) -> anyhow::Result<()> {
        self.activity.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dismiss(&self, advance: bool) -> anyhow::Result<()> {
        self.dismissals.lock().unwrap().push(advance);
        Ok(())
    }

    async fn report_unlocked(&self, slot: SlotId) -> anyhow::Result<()> {
        self.unlocked.lock().unwrap().push(slot);
        Ok(())
    }
}

struct Harness {
    orchestrator: Arc<UnlockOrchestrator>,
    verification: Arc<FakeVerification>,
    prompts: Arc<RecordingPromptSink>,
    callback: Arc<RecordingCallback>,
}

fn build(policy: UnlockPolicy, verification: Arc<FakeVerification>) -> Harness {
    let prompts = Arc::new(RecordingPromptSink::default());
    let callback = Arc::new(RecordingCallback::default());
    let orchestrator = UnlockOrchestrator::new(
        policy,
        verification.clone(),
        prompts.clone(),
        callback.clone(),
    );
    Harness {
        orchestrator,
        verification,
        prompts,
        callback,
    }
}

async fn wait_until<F>(mut condition: F, what: &str)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + StdDuration::from_secs(2);
    loop {
        if condition() {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        sleep(StdDuration::from_millis(10)).await;
    }
}

fn pin_locked_slot(pin: &str, retries: u32) -> FakeSlot {
    FakeSlot {
        kind: LockKind::PinRequired,
        pin: pin.to_string(),
        pin_retries: retries,
        ..FakeSlot::default()
    }
}

fn network_locked_slot(password: &str, retries: u32) -> FakeSlot {
    FakeSlot {
        kind: LockKind::NetworkLocked,
        me_password: password.to_string(),
        me_retries: retries,
        ..FakeSlot::default()
    }
}

#[tokio::test]
async fn wrong_pin_reprompts_with_remaining_count() {
    init_tracing();
    let verification = FakeVerification::with_slots(vec![(0, pin_locked_slot("0000", 3))]);
    let harness = build(UnlockPolicy::default(), verification);

    let state = harness
        .orchestrator
        .select_slot(SlotId::new(0))
        .await
        .unwrap();
    assert_eq!(state, EntryState::EnterPin);

    harness
        .orchestrator
        .submit_entry(SecretDigits::new("1234"))
        .await
        .unwrap();

    let prompts = harness.prompts.clone();
    wait_until(
        || {
            prompts.messages().contains(&Prompt::EnterPin {
                wrong: true,
                retries: RetryCount::Remaining(2),
            })
        },
        "wrong-code prompt with remaining count",
    )
    .await;
    assert_eq!(harness.orchestrator.state().await, EntryState::EnterPin);
}

#[tokio::test]
async fn submission_while_check_in_flight_is_dropped() {
    let verification = FakeVerification::with_delayed_slots(
        vec![(0, pin_locked_slot("0000", 3))],
        StdDuration::from_millis(100),
    );
    let harness = build(UnlockPolicy::default(), verification);

    harness
        .orchestrator
        .select_slot(SlotId::new(0))
        .await
        .unwrap();
    harness
        .orchestrator
        .submit_entry(SecretDigits::new("1234"))
        .await
        .unwrap();
    let state = harness
        .orchestrator
        .submit_entry(SecretDigits::new("9999"))
        .await
        .unwrap();

    assert_eq!(state, EntryState::EnterPin);
    sleep(StdDuration::from_millis(250)).await;
    let pin_submissions: Vec<_> = harness
        .verification
        .submissions()
        .into_iter()
        .filter(|submission| matches!(submission, Submission::Pin(..)))
        .collect();
    assert_eq!(
        pin_submissions,
        vec![Submission::Pin(SlotId::new(0), "1234".to_string())]
    );
}

#[tokio::test]
async fn puk_flow_submits_collected_codes_and_dismisses_on_ready() {
    init_tracing();
    let verification = FakeVerification::with_slots(vec![(
        0,
        FakeSlot {
            kind: LockKind::PukRequired,
            puk: "12345678".to_string(),
            puk_retries: 10,
            ..FakeSlot::default()
        },
    )]);
    let harness = build(UnlockPolicy::default(), verification);

    let state = harness
        .orchestrator
        .select_slot(SlotId::new(0))
        .await
        .unwrap();
    assert_eq!(state, EntryState::EnterPuk);

    let state = harness
        .orchestrator
        .submit_entry(SecretDigits::new("12345678"))
        .await
        .unwrap();
    assert_eq!(state, EntryState::EnterNewPin);

    let state = harness
        .orchestrator
        .submit_entry(SecretDigits::new("1234"))
        .await
        .unwrap();
    assert_eq!(state, EntryState::ReenterNewPin);

    let state = harness
        .orchestrator
        .submit_entry(SecretDigits::new("1234"))
        .await
        .unwrap();
    assert_eq!(state, EntryState::EnterFinish);

    let verification = harness.verification.clone();
    wait_until(
        || {
            verification.submissions().contains(&Submission::Puk(
                SlotId::new(0),
                "12345678".to_string(),
                "1234".to_string(),
            ))
        },
        "puk submission",
    )
    .await;

    let deadline = Instant::now() + StdDuration::from_secs(2);
    while harness.orchestrator.state().await != EntryState::ConfirmWait {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for confirmation wait after puk success"
        );
        sleep(StdDuration::from_millis(10)).await;
    }

    harness
        .orchestrator
        .on_lock_kind_changed(SlotId::new(0), LockKind::Ready)
        .await
        .unwrap();

    assert_eq!(harness.callback.dismissals(), vec![true]);
    assert_eq!(harness.orchestrator.state().await, EntryState::Idle);
}

#[tokio::test]
async fn me_lockout_dismisses_exactly_once() {
    let verification = FakeVerification::with_slots(vec![(0, network_locked_slot("9876", 1))]);
    let harness = build(UnlockPolicy::default(), verification);

    harness
        .orchestrator
        .select_slot(SlotId::new(0))
        .await
        .unwrap();
    harness
        .orchestrator
        .submit_entry(SecretDigits::new("1111"))
        .await
        .unwrap();

    let callback = harness.callback.clone();
    wait_until(|| !callback.dismissals().is_empty(), "lockout dismissal").await;

    assert_eq!(harness.callback.dismissals(), vec![true]);
    assert!(harness
        .prompts
        .notices()
        .contains(&(Prompt::MeSlotLocked, true)));
    assert_eq!(
        harness.orchestrator.state().await,
        EntryState::PermanentlyLocked
    );
}

#[tokio::test]
async fn me_service_failure_dismisses_without_retry() {
    let verification = FakeVerification::with_slots(vec![(
        0,
        FakeSlot {
            kind: LockKind::NetworkLocked,
            me_failure: true,
            ..FakeSlot::default()
        },
    )]);
    let harness = build(UnlockPolicy::default(), verification);

    harness
        .orchestrator
        .select_slot(SlotId::new(0))
        .await
        .unwrap();
    harness
        .orchestrator
        .submit_entry(SecretDigits::new("1234"))
        .await
        .unwrap();

    let callback = harness.callback.clone();
    wait_until(|| !callback.dismissals().is_empty(), "fatal dismissal").await;

    assert!(harness
        .prompts
        .notices()
        .contains(&(Prompt::MeUnlockFailed, true)));
    assert_eq!(harness.orchestrator.state().await, EntryState::Idle);
}

#[tokio::test]
async fn unconfirmed_success_force_dismisses_after_timeout() {
    let verification = FakeVerification::with_slots(vec![(0, pin_locked_slot("0000", 3))]);
    let policy = UnlockPolicy {
        confirm_timeout_ms: 50,
        ..UnlockPolicy::default()
    };
    let harness = build(policy, verification);

    harness
        .orchestrator
        .select_slot(SlotId::new(0))
        .await
        .unwrap();
    harness
        .orchestrator
        .submit_entry(SecretDigits::new("0000"))
        .await
        .unwrap();

    let callback = harness.callback.clone();
    wait_until(|| !callback.unlocked().is_empty(), "forced unlock report").await;

    assert_eq!(harness.callback.unlocked(), vec![SlotId::new(0)]);
    assert_eq!(harness.callback.dismissals(), vec![true]);
    assert_eq!(harness.orchestrator.state().await, EntryState::Idle);
}

#[tokio::test]
async fn network_unlock_repolls_next_locked_slot_then_halts_at_pin_slot() {
    init_tracing();
    let verification = FakeVerification::with_slots(vec![
        (2, network_locked_slot("1234", 5)),
        (
            3,
            FakeSlot {
                kind: LockKind::NetworkLocked,
                repoll_kind: LockKind::Ready,
                ..FakeSlot::default()
            },
        ),
        (4, pin_locked_slot("0000", 3)),
    ]);
    let policy = UnlockPolicy {
        slot_count: 5,
        ..UnlockPolicy::default()
    };
    let harness = build(policy, verification);

    harness
        .orchestrator
        .select_slot(SlotId::new(2))
        .await
        .unwrap();
    // Mirror the platform's state broadcasts for the other slots.
    harness
        .orchestrator
        .on_lock_kind_changed(SlotId::new(3), LockKind::NetworkLocked)
        .await
        .unwrap();
    harness
        .orchestrator
        .on_lock_kind_changed(SlotId::new(4), LockKind::PinRequired)
        .await
        .unwrap();

    harness
        .orchestrator
        .submit_entry(SecretDigits::new("1234"))
        .await
        .unwrap();

    let verification_handle = harness.verification.clone();
    wait_until(
        || {
            verification_handle
                .submissions()
                .contains(&Submission::Me(SlotId::new(2), "1234".to_string()))
        },
        "me submission",
    )
    .await;

    harness
        .orchestrator
        .on_lock_kind_changed(SlotId::new(2), LockKind::Ready)
        .await
        .unwrap();

    let verification_handle = harness.verification.clone();
    wait_until(
        || {
            verification_handle
                .submissions()
                .contains(&Submission::Repoll(SlotId::new(3)))
        },
        "repoll of the next locked slot",
    )
    .await;

    // Slot 3 cleared together with slot 2; the rescan stops at the
    // PIN-locked slot 4 and the session ends.
    let callback = harness.callback.clone();
    wait_until(|| !callback.dismissals().is_empty(), "session dismissal").await;

    assert_eq!(harness.callback.dismissals(), vec![true]);
    assert_eq!(harness.orchestrator.state().await, EntryState::Idle);
}

#[tokio::test]
async fn cancel_ends_the_session() {
    let verification = FakeVerification::with_slots(vec![(0, pin_locked_slot("0000", 3))]);
    let harness = build(UnlockPolicy::default(), verification);

    harness
        .orchestrator
        .select_slot(SlotId::new(0))
        .await
        .unwrap();
    let state = harness.orchestrator.cancel().await.unwrap();

    assert_eq!(state, EntryState::Idle);
    assert_eq!(harness.callback.dismissals(), vec![true]);
    assert!(harness.callback.activity.load(Ordering::SeqCst) >= 1);
}
