//! Streaming Avatar Session Core
//!
//! This crate holds the client-side orchestration for a real-time avatar
//! streaming session: credential acquisition, the session lifecycle state
//! machine, voice-chat sub-sessions, automatic reconnection and detection of
//! spoken end-of-conversation commands. The avatar backend itself is an
//! external collaborator reached only through the [`backend::AvatarBackend`]
//! capability trait.

pub mod access;
pub mod backend;
pub mod command;
pub mod config;
pub mod context;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod events;
pub mod history;
pub mod lifecycle;
pub mod media;
pub mod reconnect;
pub mod timings;
pub mod voice;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{SessionContext, SessionState};
pub use conversation::Conversation;
pub use error::{BackendError, CredentialError, SessionError, SessionResult};
pub use lifecycle::SessionController;
