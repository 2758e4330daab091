//! Lifecycle events emitted by the avatar backend.

use crate::media::MediaStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection quality label as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionQuality {
    #[default]
    Unknown,
    Good,
    Bad,
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionQuality::Unknown => write!(f, "UNKNOWN"),
            ConnectionQuality::Good => write!(f, "GOOD"),
            ConnectionQuality::Bad => write!(f, "BAD"),
        }
    }
}

/// Every event kind the session consumes from the backend.
#[derive(Debug, Clone)]
pub enum AvatarEvent {
    /// The media stream is ready to be attached.
    StreamReady(MediaStream),
    /// The backend lost the media connection.
    StreamDisconnected,
    ConnectionQualityChanged(ConnectionQuality),
    UserStartTalking,
    UserStopTalking,
    AvatarStartTalking,
    AvatarStopTalking,
    /// A partial transcript of the user's speech.
    UserTalkingMessage { text: String },
    /// The final transcript of the user's utterance.
    UserEndMessage { text: String },
    /// A chunk of the avatar's spoken reply.
    AvatarTalkingMessage { text: String },
    AvatarEndMessage,
}

impl AvatarEvent {
    /// A short stable name, used for logging and timing labels.
    pub fn name(&self) -> &'static str {
        match self {
            AvatarEvent::StreamReady(_) => "stream_ready",
            AvatarEvent::StreamDisconnected => "stream_disconnected",
            AvatarEvent::ConnectionQualityChanged(_) => "connection_quality_changed",
            AvatarEvent::UserStartTalking => "user_start",
            AvatarEvent::UserStopTalking => "user_stop",
            AvatarEvent::AvatarStartTalking => "avatar_start_talking",
            AvatarEvent::AvatarStopTalking => "avatar_stop_talking",
            AvatarEvent::UserTalkingMessage { .. } => "user_talking_message",
            AvatarEvent::UserEndMessage { .. } => "user_end_message",
            AvatarEvent::AvatarTalkingMessage { .. } => "avatar_talking_message",
            AvatarEvent::AvatarEndMessage => "avatar_end_message",
        }
    }

    /// Transcript text of the user's speech, if this event carries any.
    pub fn user_transcript(&self) -> Option<&str> {
        match self {
            AvatarEvent::UserTalkingMessage { text } | AvatarEvent::UserEndMessage { text } => {
                Some(text)
            }
            _ => None,
        }
    }
}
