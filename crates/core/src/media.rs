//! Media stream handles received from the backend.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single live audio or video track. Stopping a track releases the
/// underlying device or decoder; it must be safe to call more than once.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn kind(&self) -> TrackKind;
    fn stop(&self);
}

/// The live audio/video feed of a connected session.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// Stops every track of the stream.
    pub fn stop_all_tracks(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
