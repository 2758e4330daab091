//! Capability interface of the external avatar streaming backend.
//!
//! The backend is opaque: it accepts a configuration, produces a media stream
//! and emits lifecycle events. Events are delivered as messages over a channel
//! registered with [`AvatarBackend::subscribe`]; the session side owns the
//! receiving end and is responsible for calling [`AvatarBackend::unsubscribe`]
//! during teardown.

use crate::{config::ConversationConfig, error::BackendError, events::AvatarEvent};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sending half handed to the backend for event delivery.
pub type EventSender = mpsc::UnboundedSender<AvatarEvent>;

/// Identifies one event subscription on a backend handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Options for opening the voice-chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_input_audio_muted: Option<bool>,
}

/// Operations available on one backend connection.
#[async_trait]
pub trait AvatarBackend: Send + Sync {
    /// Registers an event channel. Events are delivered in emission order.
    fn subscribe(&self, events: EventSender) -> SubscriptionId;

    /// Drops a previously registered event channel. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Creates the remote avatar session and starts streaming.
    async fn create_start_avatar(&self, config: &ConversationConfig) -> Result<(), BackendError>;

    /// Closes the remote avatar session.
    async fn stop_avatar(&self) -> Result<(), BackendError>;

    async fn start_voice_chat(&self, options: VoiceChatOptions) -> Result<(), BackendError>;

    async fn close_voice_chat(&self) -> Result<(), BackendError>;

    async fn mute_input_audio(&self) -> Result<(), BackendError>;

    async fn unmute_input_audio(&self) -> Result<(), BackendError>;
}

/// Builds a backend connection bound to one short-lived credential.
pub trait BackendFactory: Send + Sync {
    fn connect(&self, token: &str, base_path: &str) -> Arc<dyn AvatarBackend>;
}

/// The live connection object for one session.
///
/// Handles are recreated on every `init`; the id distinguishes a handle from
/// the ones it replaced.
#[derive(Clone)]
pub struct SessionHandle {
    id: u64,
    backend: Arc<dyn AvatarBackend>,
}

impl SessionHandle {
    pub(crate) fn new(id: u64, backend: Arc<dyn AvatarBackend>) -> Self {
        Self { id, backend }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn backend(&self) -> &Arc<dyn AvatarBackend> {
        &self.backend
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_chat_options_wire_format() {
        let muted = VoiceChatOptions {
            is_input_audio_muted: Some(true),
        };
        assert_eq!(
            serde_json::to_string(&muted).unwrap(),
            r#"{"isInputAudioMuted":true}"#
        );
        assert_eq!(
            serde_json::to_string(&VoiceChatOptions::default()).unwrap(),
            "{}"
        );
    }
}
