//! Conversation shell.
//!
//! Glues the lifecycle controller, reconnection supervisor, end-command
//! matcher and access gate into the behavior of one conversation page:
//! starting text or voice sessions, routing backend events, ending the dialog
//! on a spoken closing phrase and rendering a [`ShellView`] for the UI.

use crate::{
    access::AccessGate,
    command::EndCommandMatcher,
    config::ConversationConfig,
    context::SessionState,
    credentials::CredentialSource,
    error::{BackendError, SessionError, SessionResult},
    events::{AvatarEvent, ConnectionQuality},
    history::ChatMessage,
    lifecycle::SessionController,
    reconnect::{ReconnectPolicy, ReconnectStatus, ReconnectSupervisor},
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

#[derive(Default)]
pub struct ConversationOptions {
    pub reconnect: ReconnectPolicy,
    pub end_command: EndCommandMatcher,
    /// When set, sessions can only start once the gate is verified.
    pub access_gate: Option<Arc<AccessGate>>,
}

/// Which controls the page shows for the current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionControls {
    /// "Start Voice Chat" / "Start Text Chat", disabled while reconnecting.
    Start { enabled: bool },
    Loading,
    /// Voice/text controls plus "end dialog".
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryButton {
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionBanner {
    pub message: String,
    /// Only offered once automatic attempts are exhausted.
    pub retry: Option<RetryButton>,
}

/// Everything the conversation page renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellView {
    pub session_state: SessionState,
    pub controls: SessionControls,
    pub show_video: bool,
    pub show_config: bool,
    pub banner: Option<ConnectionBanner>,
    pub connection_quality: ConnectionQuality,
    pub messages: Vec<ChatMessage>,
    pub dialog_complete: bool,
    pub access_required: bool,
    pub is_muted: bool,
    pub is_voice_chat_active: bool,
    pub is_voice_chat_loading: bool,
    pub is_user_talking: bool,
    pub is_avatar_talking: bool,
}

impl ShellView {
    fn render(
        snapshot: crate::context::ContextSnapshot,
        reconnect: ReconnectStatus,
        dialog_complete: bool,
        access_required: bool,
    ) -> Self {
        let state = snapshot.session_state;
        let controls = match state {
            SessionState::Inactive => SessionControls::Start {
                enabled: !reconnect.in_progress,
            },
            SessionState::Connecting => SessionControls::Loading,
            SessionState::Connected => SessionControls::Active,
        };
        let banner = reconnect.message.clone().map(|message| ConnectionBanner {
            message,
            retry: reconnect.is_exhausted().then(|| RetryButton {
                label: if reconnect.in_progress {
                    "Переподключение...".to_string()
                } else {
                    "Попробовать снова".to_string()
                },
                enabled: !reconnect.in_progress,
            }),
        });
        let messages = if state == SessionState::Connected {
            snapshot.messages
        } else {
            Vec::new()
        };

        Self {
            session_state: state,
            controls,
            show_video: state != SessionState::Inactive,
            show_config: state == SessionState::Inactive,
            banner,
            connection_quality: snapshot.connection_quality,
            messages,
            dialog_complete,
            access_required,
            is_muted: snapshot.is_muted,
            is_voice_chat_active: snapshot.is_voice_chat_active,
            is_voice_chat_loading: snapshot.is_voice_chat_loading,
            is_user_talking: snapshot.is_user_talking,
            is_avatar_talking: snapshot.is_avatar_talking,
        }
    }
}

#[derive(Clone)]
pub struct Conversation {
    controller: SessionController,
    supervisor: ReconnectSupervisor,
    credentials: Arc<dyn CredentialSource>,
    matcher: Arc<EndCommandMatcher>,
    access_gate: Option<Arc<AccessGate>>,
    dialog_complete: Arc<AtomicBool>,
    /// Set while the user wants a session open.
    session_requested: Arc<AtomicBool>,
    router: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Conversation {
    /// Wires up a conversation and starts routing backend events.
    pub fn mount(
        controller: SessionController,
        credentials: Arc<dyn CredentialSource>,
        config: ConversationConfig,
        options: ConversationOptions,
    ) -> Self {
        let supervisor = ReconnectSupervisor::new(
            controller.clone(),
            credentials.clone(),
            config,
            options.reconnect,
        );
        let events = controller.subscribe_events();
        let conversation = Self {
            controller,
            supervisor,
            credentials,
            matcher: Arc::new(options.end_command),
            access_gate: options.access_gate,
            dialog_complete: Arc::new(AtomicBool::new(false)),
            session_requested: Arc::new(AtomicBool::new(false)),
            router: Arc::new(Mutex::new(None)),
        };
        let router = tokio::spawn(conversation.clone().route_events(events));
        *conversation
            .router
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(router);
        conversation
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn supervisor(&self) -> &ReconnectSupervisor {
        &self.supervisor
    }

    pub fn is_dialog_complete(&self) -> bool {
        self.dialog_complete.load(Ordering::SeqCst)
    }

    /// Replaces the configuration for the next session. Rejected while a
    /// session is active.
    pub fn set_config(&self, config: ConversationConfig) -> SessionResult<()> {
        let state = self.controller.session_state();
        if state != SessionState::Inactive {
            return Err(SessionError::InvalidState(state));
        }
        self.supervisor.set_config(config);
        Ok(())
    }

    /// Fetches a credential and opens a session, optionally with voice chat.
    ///
    /// Precondition errors are returned. Any other failure is handed to the
    /// reconnection supervisor and surfaces through [`Conversation::view`].
    #[instrument(skip(self))]
    pub async fn start_session(&self, voice: bool) -> SessionResult<()> {
        if let Some(gate) = &self.access_gate {
            if !gate.is_verified() {
                return Err(SessionError::AccessDenied);
            }
        }
        let state = self.controller.session_state();
        if state != SessionState::Inactive {
            return Err(SessionError::InvalidState(state));
        }

        self.supervisor.reset();
        self.dialog_complete.store(false, Ordering::SeqCst);
        self.session_requested.store(true, Ordering::SeqCst);

        match self.open_session(voice).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_precondition() => Err(e),
            Err(e) => {
                warn!(error = %e, voice, "Error starting avatar session");
                self.supervisor.handle_connection_error(&e).await;
                Ok(())
            }
        }
    }

    async fn open_session(&self, voice: bool) -> SessionResult<()> {
        let token = self.credentials.fetch_token().await?;
        let config = self.supervisor.config();
        debug!(?config, "Starting avatar");
        self.controller.init_and_start(&config, &token).await?;
        if voice {
            self.controller.voice().start_voice_chat(None).await?;
        }
        Ok(())
    }

    /// Ends the dialog at the user's request and closes the session.
    pub async fn complete_dialog(&self) {
        self.dialog_complete.store(true, Ordering::SeqCst);
        self.session_requested.store(false, Ordering::SeqCst);
        self.controller.stop().await;
    }

    pub async fn manual_reconnect(&self) {
        self.session_requested.store(true, Ordering::SeqCst);
        self.supervisor.handle_manual_reconnect().await;
    }

    /// Stops routing events, cancels any pending retry and closes the session.
    pub async fn shutdown(&self) {
        if let Some(router) = self
            .router
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            router.abort();
        }
        self.session_requested.store(false, Ordering::SeqCst);
        self.supervisor.cancel_pending();
        self.controller.stop().await;
    }

    pub fn view(&self) -> ShellView {
        ShellView::render(
            self.controller.context().snapshot(),
            self.supervisor.status(),
            self.is_dialog_complete(),
            self.access_gate
                .as_ref()
                .is_some_and(|gate| !gate.is_verified()),
        )
    }

    async fn route_events(self, mut events: broadcast::Receiver<AvatarEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.route(&event),
                Err(RecvError::Lagged(skipped)) => self.recover_after_lag(skipped),
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Skipped events may have included a disconnect. If the session is gone
    /// while the user still wants one, treat it as a connection failure.
    fn recover_after_lag(&self, skipped: u64) {
        let state = self.controller.session_state();
        warn!(skipped, %state, "Event router lagged");
        if state != SessionState::Inactive
            || !self.session_requested.load(Ordering::SeqCst)
            || self.is_dialog_complete()
        {
            return;
        }
        let supervisor = self.supervisor.clone();
        tokio::spawn(async move {
            supervisor
                .handle_connection_error(&SessionError::Backend(BackendError::Disconnected))
                .await;
        });
    }

    fn route(&self, event: &AvatarEvent) {
        match event {
            AvatarEvent::StreamReady(_) => self.supervisor.reset(),
            AvatarEvent::StreamDisconnected => {
                let supervisor = self.supervisor.clone();
                tokio::spawn(async move {
                    supervisor
                        .handle_connection_error(&SessionError::Backend(BackendError::Disconnected))
                        .await;
                });
            }
            _ => {}
        }

        if let Some(text) = event.user_transcript() {
            if !self.is_dialog_complete() && self.matcher.matches(text) {
                info!(text, "End command recognized");
                self.dialog_complete.store(true, Ordering::SeqCst);
                let conversation = self.clone();
                tokio::spawn(async move { conversation.complete_dialog().await });
            }
        }
    }
}
