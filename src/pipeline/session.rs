// Snapshots of sequencer state. The clock thread owns the real thing; the
// UI reads a copy published behind an Arc<RwLock> so it can draw while the
// sequencer keeps playing, and the offline renderer gets a deep copy.

use std::sync::{Arc, RwLock};

use crate::audio::{TrackId, VoiceParams};

use super::pattern::Pattern;
use super::transport::Bpm;

#[derive(Clone, Debug)]
pub struct Session {
    pub pattern: Pattern,
    pub voices: Vec<(TrackId, VoiceParams)>,
    pub bpm: Bpm,
}

impl Session {
    /// One default voice on `bass-1` and an empty pattern with its track.
    pub fn new(bpm: Bpm) -> Self {
        let id = TrackId::bass(1);
        let mut pattern = Pattern::default();
        pattern.register_track(id.clone());
        Self { pattern, voices: vec![(id, VoiceParams::default())], bpm }
    }

    pub fn demo(bpm: Bpm) -> Self {
        Self { pattern: Pattern::demo(), ..Self::new(bpm) }
    }

    pub fn voice_params(&self, id: &TrackId) -> Option<&VoiceParams> {
        self.voices.iter().find(|(v, _)| v == id).map(|(_, p)| p)
    }
}

/// What the clock thread publishes after every change.
#[derive(Clone, Debug)]
pub struct SequencerState {
    pub session: Session,
    pub is_playing: bool,
    pub current_step: usize,
    pub current_block: usize,
}

impl SequencerState {
    pub fn new_shared(session: Session) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(SequencerState {
            session,
            is_playing: false,
            current_step: 0,
            current_block: 0,
        }))
    }
}
