//! Shared Session Context
//!
//! `SessionContext` holds everything one session-owning page knows about the
//! live session: the backend handle, the lifecycle state, the media stream,
//! talking/listening and voice-chat flags, connection quality, the message
//! history and timing marks. It is created once per mount and passed by handle
//! to the lifecycle controller, voice controller and reconnection supervisor,
//! which are the only writers (setters are crate-private).
//!
//! Every accessor takes the lock for a short synchronous section; the lock is
//! never held across an `.await`.

use crate::{
    backend::{AvatarBackend, SessionHandle, SubscriptionId},
    events::ConnectionQuality,
    history::{ChatMessage, MessageHistory},
    media::MediaStream,
    timings::SessionTimings,
};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Lifecycle state of the avatar session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Inactive,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Inactive => write!(f, "inactive"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
        }
    }
}

/// The event subscription registered for the current session. Dropping the
/// `detach` sender tells the event dispatcher to stop.
pub(crate) struct ActiveSubscription {
    pub(crate) id: SubscriptionId,
    pub(crate) backend: Arc<dyn AvatarBackend>,
    pub(crate) detach: oneshot::Sender<()>,
}

impl ActiveSubscription {
    /// Unregisters the channel from the backend and stops the dispatcher.
    pub(crate) fn release(self) {
        self.backend.unsubscribe(self.id);
        drop(self.detach);
    }
}

/// A point-in-time copy of the context for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub session_state: SessionState,
    pub handle_id: Option<u64>,
    pub stream_id: Option<String>,
    pub is_listening: bool,
    pub is_user_talking: bool,
    pub is_avatar_talking: bool,
    pub is_muted: bool,
    pub is_voice_chat_active: bool,
    pub is_voice_chat_loading: bool,
    pub connection_quality: ConnectionQuality,
    pub messages: Vec<ChatMessage>,
}

struct ContextState {
    handle: Option<SessionHandle>,
    next_handle_id: u64,
    stream: Option<MediaStream>,
    subscription: Option<ActiveSubscription>,
    is_listening: bool,
    is_user_talking: bool,
    is_avatar_talking: bool,
    is_muted: bool,
    is_voice_chat_active: bool,
    is_voice_chat_loading: bool,
    connection_quality: ConnectionQuality,
    history: MessageHistory,
    timings: SessionTimings,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            handle: None,
            next_handle_id: 0,
            stream: None,
            subscription: None,
            is_listening: false,
            is_user_talking: false,
            is_avatar_talking: false,
            is_muted: true,
            is_voice_chat_active: false,
            is_voice_chat_loading: false,
            connection_quality: ConnectionQuality::Unknown,
            history: MessageHistory::default(),
            timings: SessionTimings::default(),
        }
    }
}

/// Cheaply clonable handle to the shared session state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Mutex<ContextState>>,
    state_tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Inactive);
        Self {
            inner: Arc::new(Mutex::new(ContextState::default())),
            state_tx: Arc::new(state_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Session state ---

    pub fn session_state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Observes session state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub(crate) fn set_session_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    /// Atomically moves `from` to `to`, returning the observed state when it
    /// does not match `from`.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        let mut result = Ok(());
        self.state_tx.send_if_modified(|current| {
            if *current == from {
                *current = to;
                true
            } else {
                result = Err(*current);
                false
            }
        });
        result
    }

    // --- Handle ---

    pub fn handle(&self) -> Option<SessionHandle> {
        self.lock().handle.clone()
    }

    /// Installs a handle for a new backend connection, replacing the old one,
    /// and starts a fresh timing window.
    pub(crate) fn replace_handle(&self, backend: Arc<dyn AvatarBackend>) -> SessionHandle {
        let mut inner = self.lock();
        inner.next_handle_id += 1;
        let handle = SessionHandle::new(inner.next_handle_id, backend);
        inner.handle = Some(handle.clone());
        inner.timings.restart();
        handle
    }

    // --- Event subscription ---

    pub(crate) fn attach_subscription(
        &self,
        subscription: ActiveSubscription,
    ) -> Option<ActiveSubscription> {
        self.lock().subscription.replace(subscription)
    }

    pub(crate) fn take_subscription(&self) -> Option<ActiveSubscription> {
        self.lock().subscription.take()
    }

    /// Removes the subscription only if it is still `id`.
    pub(crate) fn take_subscription_if(&self, id: SubscriptionId) -> Option<ActiveSubscription> {
        let mut inner = self.lock();
        match &inner.subscription {
            Some(current) if current.id == id => inner.subscription.take(),
            _ => None,
        }
    }

    pub(crate) fn is_current_subscription(&self, id: SubscriptionId) -> bool {
        self.lock()
            .subscription
            .as_ref()
            .is_some_and(|current| current.id == id)
    }

    // --- Media stream ---

    pub fn stream(&self) -> Option<MediaStream> {
        self.lock().stream.clone()
    }

    pub(crate) fn replace_stream(&self, stream: MediaStream) -> Option<MediaStream> {
        self.lock().stream.replace(stream)
    }

    pub(crate) fn take_stream(&self) -> Option<MediaStream> {
        self.lock().stream.take()
    }

    // --- Talking / listening flags ---

    pub fn is_listening(&self) -> bool {
        self.lock().is_listening
    }

    pub fn is_user_talking(&self) -> bool {
        self.lock().is_user_talking
    }

    pub fn is_avatar_talking(&self) -> bool {
        self.lock().is_avatar_talking
    }

    pub(crate) fn set_user_talking(&self, talking: bool) {
        self.lock().is_user_talking = talking;
    }

    pub(crate) fn set_avatar_talking(&self, talking: bool) {
        self.lock().is_avatar_talking = talking;
    }

    pub(crate) fn reset_talking_flags(&self) {
        let mut inner = self.lock();
        inner.is_listening = false;
        inner.is_user_talking = false;
        inner.is_avatar_talking = false;
    }

    // --- Voice chat flags ---

    pub fn is_muted(&self) -> bool {
        self.lock().is_muted
    }

    pub fn is_voice_chat_active(&self) -> bool {
        self.lock().is_voice_chat_active
    }

    pub fn is_voice_chat_loading(&self) -> bool {
        self.lock().is_voice_chat_loading
    }

    pub(crate) fn set_muted(&self, muted: bool) {
        self.lock().is_muted = muted;
    }

    pub(crate) fn set_voice_chat_loading(&self, loading: bool) {
        self.lock().is_voice_chat_loading = loading;
    }

    pub(crate) fn set_voice_chat(&self, active: bool, muted: bool) {
        let mut inner = self.lock();
        inner.is_voice_chat_active = active;
        inner.is_muted = muted;
    }

    // --- Connection quality ---

    pub fn connection_quality(&self) -> ConnectionQuality {
        self.lock().connection_quality
    }

    pub(crate) fn set_connection_quality(&self, quality: ConnectionQuality) {
        self.lock().connection_quality = quality;
    }

    // --- Message history ---

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().history.messages().to_vec()
    }

    pub(crate) fn with_history<R>(&self, f: impl FnOnce(&mut MessageHistory) -> R) -> R {
        f(&mut self.lock().history)
    }

    pub(crate) fn clear_messages(&self) {
        self.lock().history.clear();
    }

    // --- Timings ---

    pub(crate) fn mark(&self, operation: &str) -> Duration {
        self.lock().timings.mark(operation)
    }

    pub fn timings(&self) -> SessionTimings {
        self.lock().timings.clone()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let session_state = self.session_state();
        let inner = self.lock();
        ContextSnapshot {
            session_state,
            handle_id: inner.handle.as_ref().map(SessionHandle::id),
            stream_id: inner.stream.as_ref().map(|s| s.id().to_string()),
            is_listening: inner.is_listening,
            is_user_talking: inner.is_user_talking,
            is_avatar_talking: inner.is_avatar_talking,
            is_muted: inner.is_muted,
            is_voice_chat_active: inner.is_voice_chat_active,
            is_voice_chat_loading: inner.is_voice_chat_loading,
            connection_quality: inner.connection_quality,
            messages: inner.history.messages().to_vec(),
        }
    }
}
