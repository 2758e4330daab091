//! Voice Sub-session Controller
//!
//! Starts, stops and mutes the voice-chat channel layered on an open session.
//!
//! Only `start_voice_chat` reports failures. Stopping and muting are best
//! effort: the local flag is forced to the requested value even when the
//! remote call fails, so the indicator follows the user's intent rather than
//! getting stuck on a stale "unmuted".

use crate::{
    backend::VoiceChatOptions,
    context::SessionContext,
    error::SessionResult,
};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Retry policy for opening the voice-chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceChatPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for VoiceChatPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Clone)]
pub struct VoiceChatController {
    ctx: SessionContext,
    policy: VoiceChatPolicy,
}

impl VoiceChatController {
    pub fn new(ctx: SessionContext, policy: VoiceChatPolicy) -> Self {
        Self { ctx, policy }
    }

    /// Opens the voice-chat channel, retrying transient failures.
    ///
    /// Does nothing when no session handle exists. The handle is looked up
    /// again before every retry, so a session torn down during the delay ends
    /// the attempt quietly.
    #[instrument(skip(self))]
    pub async fn start_voice_chat(&self, muted: Option<bool>) -> SessionResult<()> {
        let mut retries = 0;
        loop {
            let Some(handle) = self.ctx.handle() else {
                self.ctx.set_voice_chat_loading(false);
                return Ok(());
            };

            self.ctx.set_voice_chat_loading(true);
            let options = VoiceChatOptions {
                is_input_audio_muted: muted,
            };
            match handle.backend().start_voice_chat(options).await {
                Ok(()) => {
                    self.ctx.set_voice_chat_loading(false);
                    self.ctx.set_voice_chat(true, muted.unwrap_or(false));
                    info!(handle_id = handle.id(), "Voice chat started");
                    return Ok(());
                }
                Err(e) if retries < self.policy.max_retries => {
                    retries += 1;
                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = self.policy.max_retries,
                        "Error starting voice chat, retrying"
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Err(e) => {
                    error!(error = %e, "Error starting voice chat");
                    self.ctx.set_voice_chat_loading(false);
                    return Err(e.into());
                }
            }
        }
    }

    pub async fn stop_voice_chat(&self) {
        let Some(handle) = self.ctx.handle() else {
            return;
        };
        if let Err(e) = handle.backend().close_voice_chat().await {
            error!(error = %e, "Error stopping voice chat");
        }
        self.ctx.set_voice_chat(false, true);
    }

    pub async fn mute_input_audio(&self) {
        let Some(handle) = self.ctx.handle() else {
            return;
        };
        if let Err(e) = handle.backend().mute_input_audio().await {
            error!(error = %e, "Error muting input audio");
        }
        self.ctx.set_muted(true);
    }

    pub async fn unmute_input_audio(&self) {
        let Some(handle) = self.ctx.handle() else {
            return;
        };
        if let Err(e) = handle.backend().unmute_input_audio().await {
            error!(error = %e, "Error unmuting input audio");
        }
        self.ctx.set_muted(false);
    }
}
