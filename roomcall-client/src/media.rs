use std::sync::atomic::{AtomicBool, Ordering};

use roomcall_proto::MediaFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A captured local track. Muting flips `enabled`; the track itself and
/// every peer connection carrying it stay in place.
#[derive(Debug)]
pub struct LocalTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
}

impl LocalTrack {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn kind(&self) -> TrackKind {
        self.kind
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

/// Local capture, acquired once and shared by every peer connection
#[derive(Debug)]
pub struct LocalMedia {
    audio: Option<LocalTrack>,
    video: Option<LocalTrack>,
}

impl LocalMedia {
    #[must_use]
    pub const fn new(audio: Option<LocalTrack>, video: Option<LocalTrack>) -> Self {
        Self { audio, video }
    }

    /// Audio and camera tracks with generated ids
    #[must_use]
    pub fn audio_video(label: &str) -> Self {
        Self::new(
            Some(LocalTrack::new(format!("{label}-audio"), TrackKind::Audio)),
            Some(LocalTrack::new(format!("{label}-video"), TrackKind::Video)),
        )
    }

    #[must_use]
    pub const fn track(&self, kind: TrackKind) -> Option<&LocalTrack> {
        match kind {
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Video => self.video.as_ref(),
        }
    }

    /// Returns false when no such track was captured
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        self.track(kind).map(|track| track.set_enabled(enabled)).is_some()
    }

    #[must_use]
    pub fn flags(&self, screen_share: bool) -> MediaFlags {
        MediaFlags {
            video: self.track(TrackKind::Video).is_some_and(LocalTrack::is_enabled),
            audio: self.track(TrackKind::Audio).is_some_and(LocalTrack::is_enabled),
            screen_share,
        }
    }
}
