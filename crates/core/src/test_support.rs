//! In-process fakes for the avatar backend, used by unit tests.

use crate::{
    backend::{AvatarBackend, BackendFactory, EventSender, SubscriptionId, VoiceChatOptions},
    config::ConversationConfig,
    error::{BackendError, CredentialError},
    events::AvatarEvent,
    media::{MediaStream, MediaTrack, TrackKind},
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug)]
pub struct FakeTrack {
    kind: TrackKind,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// A stream with one audio and one video track, plus the tracks for inspection.
pub fn fake_stream(id: &str) -> (MediaStream, Vec<Arc<FakeTrack>>) {
    let tracks = vec![FakeTrack::new(TrackKind::Audio), FakeTrack::new(TrackKind::Video)];
    let stream = MediaStream::new(
        id,
        tracks
            .iter()
            .map(|t| t.clone() as Arc<dyn MediaTrack>)
            .collect(),
    );
    (stream, tracks)
}

/// Failure injection shared by every backend a factory hands out.
#[derive(Debug, Default)]
pub struct FailurePlan {
    pub create_failures: AtomicU32,
    pub voice_failures: AtomicU32,
    pub fail_stop: AtomicBool,
    pub fail_close_voice: AtomicBool,
    pub fail_mute: AtomicBool,
    /// When set, `create_start_avatar` waits for `create_released`.
    pub hold_create: AtomicBool,
    pub create_released: Notify,
}

impl FailurePlan {
    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub token: String,
    plan: Arc<FailurePlan>,
    calls: Mutex<Vec<&'static str>>,
    subscribers: Mutex<Vec<(SubscriptionId, EventSender)>>,
    next_subscription: AtomicU64,
}

impl FakeBackend {
    pub fn with_plan(token: &str, plan: Arc<FailurePlan>) -> Self {
        Self {
            token: token.to_string(),
            plan,
            ..Default::default()
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Delivers an event to every registered subscriber.
    pub fn emit(&self, event: AvatarEvent) {
        for (_, tx) in self.subscribers.lock().unwrap().iter() {
            let _ = tx.send(event.clone());
        }
    }
}

#[async_trait]
impl AvatarBackend for FakeBackend {
    fn subscribe(&self, events: EventSender) -> SubscriptionId {
        self.record("subscribe");
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst) + 1);
        self.subscribers.lock().unwrap().push((id, events));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.record("unsubscribe");
        self.subscribers.lock().unwrap().retain(|(sub, _)| *sub != id);
    }

    async fn create_start_avatar(&self, _config: &ConversationConfig) -> Result<(), BackendError> {
        self.record("create_start_avatar");
        if self.plan.hold_create.load(Ordering::SeqCst) {
            self.plan.create_released.notified().await;
        }
        if FailurePlan::take(&self.plan.create_failures) {
            return Err(BackendError::Request("create failed".into()));
        }
        Ok(())
    }

    async fn stop_avatar(&self) -> Result<(), BackendError> {
        self.record("stop_avatar");
        if self.plan.fail_stop.load(Ordering::SeqCst) {
            return Err(BackendError::Request("stop failed".into()));
        }
        Ok(())
    }

    async fn start_voice_chat(&self, _options: VoiceChatOptions) -> Result<(), BackendError> {
        self.record("start_voice_chat");
        if FailurePlan::take(&self.plan.voice_failures) {
            return Err(BackendError::Request("voice chat failed".into()));
        }
        Ok(())
    }

    async fn close_voice_chat(&self) -> Result<(), BackendError> {
        self.record("close_voice_chat");
        if self.plan.fail_close_voice.load(Ordering::SeqCst) {
            return Err(BackendError::Request("close voice chat failed".into()));
        }
        Ok(())
    }

    async fn mute_input_audio(&self) -> Result<(), BackendError> {
        self.record("mute_input_audio");
        if self.plan.fail_mute.load(Ordering::SeqCst) {
            return Err(BackendError::Request("mute failed".into()));
        }
        Ok(())
    }

    async fn unmute_input_audio(&self) -> Result<(), BackendError> {
        self.record("unmute_input_audio");
        if self.plan.fail_mute.load(Ordering::SeqCst) {
            return Err(BackendError::Request("unmute failed".into()));
        }
        Ok(())
    }
}

/// Hands out `FakeBackend`s and keeps them for inspection.
#[derive(Default)]
pub struct FakeFactory {
    pub plan: Arc<FailurePlan>,
    backends: Mutex<Vec<Arc<FakeBackend>>>,
}

impl FakeFactory {
    pub fn backends(&self) -> Vec<Arc<FakeBackend>> {
        self.backends.lock().unwrap().clone()
    }

    pub fn last(&self) -> Arc<FakeBackend> {
        self.backends
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no backend connected yet")
    }

    /// Total number of calls named `call` across every backend.
    pub fn count(&self, call: &str) -> usize {
        self.backends().iter().map(|b| b.count(call)).sum()
    }
}

impl BackendFactory for FakeFactory {
    fn connect(&self, token: &str, _base_path: &str) -> Arc<dyn AvatarBackend> {
        let backend = Arc::new(FakeBackend::with_plan(token, self.plan.clone()));
        self.backends.lock().unwrap().push(backend.clone());
        backend
    }
}

/// Credential source that counts fetches and can be held open with a gate.
#[derive(Default)]
pub struct GatedCredentials {
    pub fetches: AtomicU32,
    pub failures: AtomicU32,
    gate: Option<Arc<Notify>>,
}

impl GatedCredentials {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::credentials::CredentialSource for GatedCredentials {
    async fn fetch_token(&self) -> Result<String, CredentialError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if FailurePlan::take(&self.failures) {
            return Err(CredentialError::EmptyToken);
        }
        Ok(format!("token-{n}"))
    }
}

/// Lets spawned tasks run until the runtime is idle. Requires a paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
