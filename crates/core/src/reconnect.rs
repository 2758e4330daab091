//! Reconnection Supervisor
//!
//! Reacts to connection failures with a bounded number of automatic
//! stop → fetch credential → init → start cycles. The first attempt runs
//! immediately; each failure schedules the next one after
//! [`ReconnectPolicy::delay`] on a spawned timer task. Once
//! [`ReconnectPolicy::max_attempts`] attempts have failed the supervisor stops
//! retrying, shows a terminal message and waits for a manual reconnect.
//!
//! Voice chat is not restarted by a reconnect.

use crate::{
    config::ConversationConfig,
    credentials::CredentialSource,
    error::{SessionError, SessionResult},
    lifecycle::SessionController,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Shown once every automatic attempt has failed.
    pub exhausted_message: String,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            delay: RECONNECT_DELAY,
            exhausted_message:
                "Не удалось восстановить соединение. Пожалуйста, перезагрузите страницу.".to_string(),
        }
    }
}

impl ReconnectPolicy {
    pub fn progress_message(&self, attempt: u32) -> String {
        format!(
            "Ошибка соединения. Попытка переподключения {attempt}/{}...",
            self.max_attempts
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPhase {
    #[default]
    Idle,
    Retrying {
        attempt: u32,
    },
    Exhausted,
}

/// What the supervisor currently reports to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectStatus {
    pub phase: ReconnectPhase,
    pub attempts: u32,
    pub max_attempts: u32,
    pub in_progress: bool,
    pub message: Option<String>,
}

impl ReconnectStatus {
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[derive(Default)]
struct SupervisorState {
    phase: ReconnectPhase,
    attempts: u32,
    in_progress: bool,
    message: Option<String>,
    pending: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct ReconnectSupervisor {
    controller: SessionController,
    credentials: Arc<dyn CredentialSource>,
    config: Arc<Mutex<ConversationConfig>>,
    policy: Arc<ReconnectPolicy>,
    state: Arc<Mutex<SupervisorState>>,
}

impl ReconnectSupervisor {
    pub fn new(
        controller: SessionController,
        credentials: Arc<dyn CredentialSource>,
        config: ConversationConfig,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            controller,
            credentials,
            config: Arc::new(Mutex::new(config)),
            policy: Arc::new(policy),
            state: Arc::new(Mutex::new(SupervisorState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// The configuration used for every reconnect attempt.
    pub fn config(&self) -> ConversationConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_config(&self, config: ConversationConfig) {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn status(&self) -> ReconnectStatus {
        let state = self.lock();
        ReconnectStatus {
            phase: state.phase,
            attempts: state.attempts,
            max_attempts: self.policy.max_attempts,
            in_progress: state.in_progress,
            message: state.message.clone(),
        }
    }

    /// Whether a retry timer is still waiting to fire.
    pub fn has_pending_retry(&self) -> bool {
        self.lock()
            .pending
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Cancels any pending retry and returns to `Idle`.
    pub fn reset(&self) {
        let mut state = self.lock();
        if let Some(task) = state.pending.take() {
            task.abort();
        }
        state.phase = ReconnectPhase::Idle;
        state.attempts = 0;
        state.in_progress = false;
        state.message = None;
    }

    /// Cancels a pending retry without touching the counter.
    pub fn cancel_pending(&self) {
        if let Some(task) = self.lock().pending.take() {
            task.abort();
        }
    }

    /// Entry point for every connection failure.
    ///
    /// Ignored while a reconnection is already running. Runs the next attempt
    /// immediately and schedules further attempts on failure.
    #[instrument(skip_all)]
    pub async fn handle_connection_error(&self, error: &SessionError) {
        error!(error = %error, "Connection error");
        let Some(attempt) = self.begin_attempt(false) else {
            return;
        };
        if !self.run_attempt(attempt).await {
            self.schedule_retry();
        }
    }

    /// Clears the counter and tries once more right away. A failure falls
    /// back to the automatic path.
    #[instrument(skip_all)]
    pub async fn handle_manual_reconnect(&self) {
        self.reset();
        self.lock().in_progress = true;
        let result = self.reconnect().await;
        self.lock().in_progress = false;
        if let Err(e) = result {
            self.handle_connection_error(&e).await;
        }
    }

    /// Claims the next attempt number. Flags are updated before any await so
    /// concurrent failure signals cannot both pass the guard.
    fn begin_attempt(&self, chained: bool) -> Option<u32> {
        let mut state = self.lock();
        if !chained {
            if state.in_progress {
                info!("Already attempting to reconnect");
                return None;
            }
            if let Some(task) = state.pending.take() {
                task.abort();
            }
        }

        if state.attempts >= self.policy.max_attempts {
            warn!(attempts = state.attempts, "Reconnection attempts exhausted");
            state.phase = ReconnectPhase::Exhausted;
            state.in_progress = false;
            state.message = Some(self.policy.exhausted_message.clone());
            state.pending = None;
            return None;
        }

        state.in_progress = true;
        state.attempts += 1;
        let attempt = state.attempts;
        state.phase = ReconnectPhase::Retrying { attempt };
        state.message = Some(self.policy.progress_message(attempt));
        Some(attempt)
    }

    /// Returns `true` when the session was restored.
    async fn run_attempt(&self, attempt: u32) -> bool {
        info!(attempt, max_attempts = self.policy.max_attempts, "Reconnecting");
        match self.reconnect().await {
            Ok(()) => {
                info!(attempt, "Reconnected");
                self.reset();
                true
            }
            Err(SessionError::InvalidState(state)) => {
                info!(attempt, %state, "Session opened elsewhere, abandoning reconnection");
                self.reset();
                true
            }
            Err(SessionError::Superseded) => {
                info!(attempt, "Session stopped while reconnecting, abandoning reconnection");
                self.reset();
                true
            }
            Err(e) => {
                error!(attempt, error = %e, "Reconnection failed");
                false
            }
        }
    }

    fn schedule_retry(&self) {
        let mut state = self.lock();
        let supervisor = self.clone();
        state.pending = Some(tokio::spawn(supervisor.retry_chain()));
    }

    async fn retry_chain(self) {
        loop {
            tokio::time::sleep(self.policy.delay).await;
            let Some(attempt) = self.begin_attempt(true) else {
                return;
            };
            if self.run_attempt(attempt).await {
                return;
            }
        }
    }

    async fn reconnect(&self) -> SessionResult<()> {
        self.controller.stop().await;
        let token = self.credentials.fetch_token().await?;
        let config = self.config();
        self.controller.init_and_start(&config, &token).await?;
        Ok(())
    }
}
