//! Session Lifecycle Controller
//!
//! Owns the state machine for opening and closing a session against the avatar
//! backend:
//!
//! ```text
//! Inactive --start--> Connecting --stream ready--> Connected
//!     ^                   |                            |
//!     +-- start failure --+-- stop / disconnected -----+
//! ```
//!
//! Backend events arrive over a channel registered before the remote
//! create-and-start call is issued, are applied to the [`SessionContext`] by a
//! dispatcher task in arrival order, and are then re-published to observers
//! (see [`SessionController::subscribe_events`]).

use crate::{
    backend::{BackendFactory, SessionHandle, SubscriptionId},
    config::ConversationConfig,
    context::{ActiveSubscription, SessionContext, SessionState},
    error::{SessionError, SessionResult},
    events::AvatarEvent,
    media::MediaStream,
    voice::{VoiceChatController, VoiceChatPolicy},
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

/// Base address of the hosted avatar backend.
pub const DEFAULT_BASE_PATH: &str = "https://api.heygen.com";

const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct SessionController {
    ctx: SessionContext,
    factory: Arc<dyn BackendFactory>,
    base_path: Arc<str>,
    voice: VoiceChatController,
    events_tx: broadcast::Sender<AvatarEvent>,
}

impl SessionController {
    pub fn new(ctx: SessionContext, factory: Arc<dyn BackendFactory>, base_path: &str) -> Self {
        Self::with_voice_policy(ctx, factory, base_path, VoiceChatPolicy::default())
    }

    pub fn with_voice_policy(
        ctx: SessionContext,
        factory: Arc<dyn BackendFactory>,
        base_path: &str,
        voice_policy: VoiceChatPolicy,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            voice: VoiceChatController::new(ctx.clone(), voice_policy),
            ctx,
            factory,
            base_path: Arc::from(base_path),
            events_tx,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn voice(&self) -> &VoiceChatController {
        &self.voice
    }

    pub fn session_state(&self) -> SessionState {
        self.ctx.session_state()
    }

    /// Receives every backend event after the controller has applied it.
    pub fn subscribe_events(&self) -> broadcast::Receiver<AvatarEvent> {
        self.events_tx.subscribe()
    }

    /// Creates a new handle bound to `token`, replacing any existing one.
    pub fn init(&self, token: &str) -> SessionHandle {
        let backend = self.factory.connect(token, &self.base_path);
        let handle = self.ctx.replace_handle(backend);
        self.ctx.mark("Session start");
        debug!(handle_id = handle.id(), base_path = %self.base_path, "Avatar initialized");
        self.ctx.mark("Avatar initialization");
        handle
    }

    /// Opens a session with `config`.
    ///
    /// Fails with [`SessionError::InvalidState`] unless the session is
    /// inactive, and with [`SessionError::MissingToken`] when no handle exists
    /// and no token was given. A failure of the remote call resets the state
    /// to `Inactive` and is returned to the caller. A session stopped while
    /// the remote call was in flight yields [`SessionError::Superseded`].
    #[instrument(skip_all)]
    pub async fn start(
        &self,
        config: &ConversationConfig,
        token: Option<&str>,
    ) -> SessionResult<SessionHandle> {
        self.claim_start()?;
        let handle = match (self.ctx.handle(), token) {
            (Some(handle), _) => handle,
            (None, Some(token)) => self.init(token),
            (None, None) => {
                let _ = self
                    .ctx
                    .transition(SessionState::Connecting, SessionState::Inactive);
                return Err(SessionError::MissingToken);
            }
        };
        self.open(handle, config).await
    }

    /// Opens a session on a fresh handle bound to `token`.
    ///
    /// The state is claimed before the handle is created, so a caller that
    /// loses the race gets [`SessionError::InvalidState`] and the live handle
    /// is left untouched.
    #[instrument(skip_all)]
    pub async fn init_and_start(
        &self,
        config: &ConversationConfig,
        token: &str,
    ) -> SessionResult<SessionHandle> {
        self.claim_start()?;
        let handle = self.init(token);
        self.open(handle, config).await
    }

    fn claim_start(&self) -> SessionResult<()> {
        self.ctx
            .transition(SessionState::Inactive, SessionState::Connecting)
            .map_err(|state| {
                warn!(%state, "Rejecting start: session already active");
                SessionError::InvalidState(state)
            })?;
        self.ctx.mark("Session connecting");
        Ok(())
    }

    async fn open(
        &self,
        handle: SessionHandle,
        config: &ConversationConfig,
    ) -> SessionResult<SessionHandle> {
        let subscription = self.attach_events(&handle);

        match handle.backend().create_start_avatar(config).await {
            Ok(()) if self.ctx.is_current_subscription(subscription) => {
                self.ctx.mark("Avatar created and started");
                info!(handle_id = handle.id(), avatar = %config.avatar_name, "Avatar session started");
                Ok(handle)
            }
            Ok(()) => {
                warn!(handle_id = handle.id(), "Session stopped before it finished starting");
                // Close the remote session unless a newer start is using this handle.
                let reused = self.ctx.handle().is_some_and(|h| h.id() == handle.id())
                    && self.ctx.session_state() != SessionState::Inactive;
                if !reused {
                    if let Err(e) = handle.backend().stop_avatar().await {
                        error!(error = %e, "Error closing superseded session");
                    }
                }
                Err(SessionError::Superseded)
            }
            Err(e) => {
                error!(error = %e, "Error starting session");
                // Only unwind if nothing has replaced this attempt meanwhile.
                if let Some(sub) = self.ctx.take_subscription_if(subscription) {
                    sub.release();
                    self.ctx.set_session_state(SessionState::Inactive);
                }
                Err(e.into())
            }
        }
    }

    /// Registers the event channel on `handle` and spawns its dispatcher.
    fn attach_events(&self, handle: &SessionHandle) -> SubscriptionId {
        let (tx, rx) = mpsc::unbounded_channel();
        let (detach, detached) = oneshot::channel();
        let id = handle.backend().subscribe(tx);
        let previous = self.ctx.attach_subscription(ActiveSubscription {
            id,
            backend: handle.backend().clone(),
            detach,
        });
        if let Some(previous) = previous {
            previous.release();
        }
        tokio::spawn(self.clone().dispatch_events(id, rx, detached));
        id
    }

    async fn dispatch_events(
        self,
        id: SubscriptionId,
        mut rx: mpsc::UnboundedReceiver<AvatarEvent>,
        mut detached: oneshot::Receiver<()>,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut detached => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if !self.ctx.is_current_subscription(id) {
                debug!(event = event.name(), "Dropping event for a released subscription");
                break;
            }
            self.apply_event(&event).await;
            // Nobody listening is fine.
            let _ = self.events_tx.send(event);
        }
        debug!(subscription = id.0, "Event dispatcher finished");
    }

    async fn apply_event(&self, event: &AvatarEvent) {
        match event {
            AvatarEvent::StreamReady(stream) => self.handle_stream(stream.clone()),
            AvatarEvent::StreamDisconnected => {
                warn!("Stream disconnected");
                self.stop().await;
            }
            AvatarEvent::ConnectionQualityChanged(quality) => {
                self.ctx.set_connection_quality(*quality);
                self.ctx.mark("Connection quality changed");
            }
            AvatarEvent::UserStartTalking => {
                self.ctx.set_user_talking(true);
                self.ctx.mark("User started talking");
            }
            AvatarEvent::UserStopTalking => {
                self.ctx.set_user_talking(false);
                self.ctx.mark("User stopped talking");
            }
            AvatarEvent::AvatarStartTalking => {
                self.ctx.set_avatar_talking(true);
                self.ctx.mark("Avatar started talking");
            }
            AvatarEvent::AvatarStopTalking => {
                self.ctx.set_avatar_talking(false);
                self.ctx.mark("Avatar stopped talking");
            }
            AvatarEvent::UserTalkingMessage { text } => self
                .ctx
                .with_history(|h| h.handle_user_talking_message(text)),
            AvatarEvent::AvatarTalkingMessage { text } => self
                .ctx
                .with_history(|h| h.handle_streaming_talking_message(text)),
            AvatarEvent::UserEndMessage { .. } | AvatarEvent::AvatarEndMessage => {
                self.ctx.with_history(|h| h.handle_end_message())
            }
        }
    }

    /// Stores a newly ready stream and marks the session connected.
    ///
    /// A previous stream is stopped unless it is the same stream again.
    pub fn handle_stream(&self, stream: MediaStream) {
        let stream_id = stream.id().to_string();
        if let Some(previous) = self.ctx.replace_stream(stream) {
            if previous.id() != stream_id {
                previous.stop_all_tracks();
            }
        }
        self.ctx.set_session_state(SessionState::Connected);
        self.ctx.mark("Stream ready");
        info!(stream_id = %stream_id, "Stream ready");
    }

    /// Tears the session down. Safe to call in any state and any number of
    /// times; never fails. Whatever goes wrong, the session ends up
    /// `Inactive` with no stream.
    #[instrument(skip_all)]
    pub async fn stop(&self) {
        if let Err(e) = self.try_stop().await {
            error!(error = %e, "Error stopping session");
            if let Some(stream) = self.ctx.take_stream() {
                stream.stop_all_tracks();
            }
            self.ctx.set_session_state(SessionState::Inactive);
        }
    }

    async fn try_stop(&self) -> SessionResult<()> {
        self.ctx.mark("Stopping session");

        if let Some(subscription) = self.ctx.take_subscription() {
            subscription.release();
        }

        self.ctx.clear_messages();
        self.voice.stop_voice_chat().await;
        self.ctx.reset_talking_flags();

        if let Some(stream) = self.ctx.take_stream() {
            stream.stop_all_tracks();
        }

        if let Some(handle) = self.ctx.handle() {
            handle.backend().stop_avatar().await?;
        }
        self.ctx.set_session_state(SessionState::Inactive);

        self.ctx.mark("Session stopped");
        let timings = self.ctx.timings();
        let metrics: Vec<String> = timings
            .entries()
            .iter()
            .map(|(op, elapsed)| format!("{op}: {:.2}ms", elapsed.as_secs_f64() * 1000.0))
            .collect();
        info!(?metrics, "Session performance metrics");
        Ok(())
    }
}
