//! Look-ahead scheduling.
//!
//! The clock that wakes the scheduler is coarse (tens of milliseconds, with
//! jitter), but every onset is stamped with an exact audio-clock time. Each
//! wake-up dispatches every step that falls inside the lookahead window, so
//! as long as the scheduler wakes up more often than the window is long, no
//! note is ever late.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::audio::{AudioEngine, BassVoice, DrumKind, DrumKit, NotePlan, TrackId, VoiceParams};
use crate::config::EngineConfig;

use super::pattern::PatternSource;
use super::transport::{Bpm, Transport};
use super::visual::{VisualEvent, VisualSender};

/// The bass voices plus the drum kit, everything a step can trigger.
pub struct Instruments {
    engine: AudioEngine,
    voices: BTreeMap<TrackId, BassVoice>,
    drums: DrumKit,
}

impl Instruments {
    pub fn new(engine: &AudioEngine) -> Self {
        Self {
            engine: engine.clone(),
            voices: BTreeMap::new(),
            drums: DrumKit::new(engine),
        }
    }

    /// Fresh voices (new buses, fresh runtime state) from saved parameters.
    pub fn from_params(engine: &AudioEngine, voices: &[(TrackId, VoiceParams)]) -> Self {
        let mut instruments = Self::new(engine);
        for (id, params) in voices {
            instruments.insert_voice(id.clone(), params.clone());
        }
        instruments
    }

    pub fn insert_voice(&mut self, id: TrackId, params: VoiceParams) -> bool {
        if self.voices.contains_key(&id) {
            return false;
        }
        let voice = BassVoice::with_default_fx(&self.engine, id.clone(), params);
        self.voices.insert(id, voice);
        true
    }

    /// Adds a voice under the next free `bass-N` id.
    pub fn add_voice(&mut self, params: VoiceParams) -> TrackId {
        let next = self.voices.keys().filter_map(TrackId::bass_number).max().unwrap_or(0) + 1;
        let id = TrackId::bass(next);
        self.insert_voice(id.clone(), params);
        id
    }

    /// Refuses to remove the last voice.
    pub fn remove_voice(&mut self, id: &TrackId) -> bool {
        if self.voices.len() <= 1 {
            return false;
        }
        match self.voices.remove(id) {
            Some(voice) => {
                voice.retire();
                true
            }
            None => false,
        }
    }

    pub fn voice(&self, id: &TrackId) -> Option<&BassVoice> {
        self.voices.get(id)
    }

    pub fn voice_mut(&mut self, id: &TrackId) -> Option<&mut BassVoice> {
        self.voices.get_mut(id)
    }

    pub fn voice_ids(&self) -> impl Iterator<Item = &TrackId> {
        self.voices.keys()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn drums(&self) -> &DrumKit {
        &self.drums
    }

    pub fn params(&self) -> Vec<(TrackId, VoiceParams)> {
        self.voices.iter().map(|(id, v)| (id.clone(), v.params().clone())).collect()
    }
}

/// What one dispatched step did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub block: usize,
    pub time: f64,
    pub drums: Vec<DrumKind>,
    pub notes: Vec<(TrackId, NotePlan)>,
}

/// Triggers everything at (step, block) at `time`. Shared by the live
/// scheduler and the offline renderer. Missing data is an empty step and
/// notes for tracks without a voice are skipped.
pub fn dispatch_step(
    pattern: &impl PatternSource,
    instruments: &mut Instruments,
    step: usize,
    block: usize,
    time: f64,
    note_duration: f64,
) -> StepReport {
    let mut report = StepReport { step, block, time, ..Default::default() };
    let Some(data) = pattern.step_data(step, block) else {
        return report;
    };

    for kind in data.drums {
        instruments.drums.trigger(kind, time);
        report.drums.push(kind);
    }
    for (track, note) in data.notes {
        let Some(voice) = instruments.voices.get_mut(&track) else {
            continue;
        };
        let plan = voice.play(note.pitch, note.octave, time, note_duration, note.slide, note.accent);
        report.notes.push((track, plan));
    }
    report
}

pub struct Scheduler {
    transport: Transport,
    lookahead: f64,
    start_delay: f64,
    note_duration: f64,
    visual: VisualSender,
}

impl Scheduler {
    pub fn new(config: &EngineConfig, bpm: Bpm, visual: VisualSender) -> Self {
        Self {
            transport: Transport::new(bpm),
            lookahead: config.lookahead_secs,
            start_delay: config.start_delay_secs,
            note_duration: config.note_duration_secs,
            visual,
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn note_duration(&self) -> f64 {
        self.note_duration
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing
    }

    /// Takes effect from the next scheduled step.
    pub fn set_bpm(&mut self, bpm: Bpm) {
        self.transport.bpm = bpm;
    }

    pub fn start(&mut self, start_block: usize, pattern: &impl PatternSource, now: f64) {
        self.transport.rewind(start_block, pattern.block_count(), now + self.start_delay);
        self.transport.is_playing = true;
        self.visual.clear();
        info!(block = self.transport.current_block, bpm = self.transport.bpm.get(), "transport started");
    }

    /// Stops dispatching. Notes already handed to the engine play out.
    pub fn stop(&mut self) {
        if self.transport.is_playing {
            self.transport.is_playing = false;
            info!("transport stopped");
        }
    }

    /// One wake-up: dispatch every step whose time falls before
    /// `now + lookahead`.
    pub fn tick(&mut self, now: f64, pattern: &impl PatternSource, instruments: &mut Instruments) -> Vec<StepReport> {
        let mut reports = Vec::new();
        if !self.transport.is_playing {
            return reports;
        }
        while self.transport.next_note_time < now + self.lookahead {
            reports.push(self.dispatch(pattern, instruments));
            self.advance(pattern);
        }
        if !reports.is_empty() {
            debug!(steps = reports.len(), now, "dispatched");
        }
        reports
    }

    /// Dispatches the current step at `next_note_time`.
    pub fn dispatch(&mut self, pattern: &impl PatternSource, instruments: &mut Instruments) -> StepReport {
        let t = &self.transport;
        let (step, block, time) = (t.current_step, t.current_block, t.next_note_time);
        self.visual.push(VisualEvent { step, block, time });
        dispatch_step(pattern, instruments, step, block, time, self.note_duration)
    }

    pub fn advance(&mut self, pattern: &impl PatternSource) {
        self.transport.advance(pattern.steps_per_block(), pattern.block_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Mixer, PitchClass};
    use crate::pipeline::pattern::{NoteEvent, Pattern};
    use crate::pipeline::visual::{visual_channel, VisualQueue};
    use approx::assert_relative_eq;

    struct Rig {
        engine: AudioEngine,
        mixer: Mixer,
        instruments: Instruments,
        pattern: Pattern,
        scheduler: Scheduler,
        visual: VisualQueue,
    }

    fn rig() -> Rig {
        let (engine, mixer) = AudioEngine::offline(44_100, 1.0);
        let mut pattern = Pattern::default();
        pattern.register_track(TrackId::bass(1));
        let instruments = Instruments::from_params(&engine, &[(TrackId::bass(1), VoiceParams::default())]);
        let (tx, visual) = visual_channel();
        let scheduler = Scheduler::new(&EngineConfig::default(), Bpm::new(174.0).unwrap(), tx);
        Rig { engine, mixer, instruments, pattern, scheduler, visual }
    }

    #[test]
    fn idle_scheduler_does_nothing() {
        let mut r = rig();
        assert!(r.scheduler.tick(10.0, &r.pattern, &mut r.instruments).is_empty());
    }

    #[test]
    fn start_sets_up_transport() {
        let mut r = rig();
        r.pattern.add_block();
        r.scheduler.start(7, &r.pattern, 2.0);
        let t = r.scheduler.transport();
        assert!(t.is_playing);
        assert_eq!((t.current_step, t.current_block), (0, 1));
        assert_relative_eq!(t.next_note_time, 2.05, epsilon = 1e-12);
    }

    #[test]
    fn tick_fills_the_lookahead_window() {
        let mut r = rig();
        r.scheduler.start(0, &r.pattern, 0.0);
        let spb = 15.0 / 174.0;
        // first step at 0.05; window ends at 0.1 -> only step 0 fits
        let reports = r.scheduler.tick(0.0, &r.pattern, &mut r.instruments);
        assert_eq!(reports.len(), 1);
        assert_relative_eq!(reports[0].time, 0.05, epsilon = 1e-12);

        // step 1 is due at ~0.136: not yet in the 0.125 window, but in the 0.15 one
        assert!(r.scheduler.tick(0.025, &r.pattern, &mut r.instruments).is_empty());
        let reports = r.scheduler.tick(0.05, &r.pattern, &mut r.instruments);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].step, 1);
        assert_relative_eq!(reports[0].time, 0.05 + spb, epsilon = 1e-12);
    }

    #[test]
    fn late_wakeup_catches_up_without_drift() {
        let mut r = rig();
        r.scheduler.start(0, &r.pattern, 0.0);
        let reports = r.scheduler.tick(1.0, &r.pattern, &mut r.instruments);
        let spb: f64 = 15.0 / 174.0;
        // every step before 1.1 s, at its exact grid time
        assert_eq!(reports.len(), ((1.1 - 0.05) / spb).ceil() as usize);
        for (i, rep) in reports.iter().enumerate() {
            assert_eq!(rep.step, i % 16);
            assert_relative_eq!(rep.time, 0.05 + i as f64 * spb, epsilon = 1e-9);
        }
    }

    #[test]
    fn dispatch_plays_notes_and_drums() {
        let mut r = rig();
        r.pattern.set_note(0, &TrackId::bass(1), 0, PitchClass::C, 3);
        r.pattern.toggle_drum(0, 0, DrumKind::Kick);
        r.pattern.toggle_drum(0, 0, DrumKind::Hat);
        r.scheduler.start(0, &r.pattern, 0.0);
        let rep = r.scheduler.dispatch(&r.pattern, &mut r.instruments);
        assert_eq!(rep.drums, vec![DrumKind::Kick, DrumKind::Hat]);
        assert_eq!(rep.notes.len(), 1);
        r.mixer.drain_commands();
        assert_eq!(r.mixer.active_sounds(), 3);
    }

    #[test]
    fn notes_for_unknown_tracks_are_skipped() {
        let mut r = rig();
        r.pattern.register_track(TrackId::bass(7));
        r.pattern.set_note(0, &TrackId::bass(7), 0, PitchClass::C, 3);
        let rep = dispatch_step(&r.pattern, &mut r.instruments, 0, 0, 0.0, 0.25);
        assert!(rep.notes.is_empty());
        let rep = dispatch_step(&r.pattern, &mut r.instruments, 3, 9, 0.0, 0.25);
        assert_eq!(rep, StepReport { step: 3, block: 9, time: 0.0, ..Default::default() });
    }

    #[test]
    fn stop_halts_dispatch_but_not_sound() {
        let mut r = rig();
        r.pattern.set_note(0, &TrackId::bass(1), 0, PitchClass::C, 3);
        r.scheduler.start(0, &r.pattern, 0.0);
        r.scheduler.tick(0.0, &r.pattern, &mut r.instruments);
        r.scheduler.stop();
        assert!(r.scheduler.tick(5.0, &r.pattern, &mut r.instruments).is_empty());
        r.mixer.drain_commands();
        assert_eq!(r.mixer.active_sounds(), 1);
    }

    #[test]
    fn visual_events_follow_the_audio_clock() {
        let mut r = rig();
        r.scheduler.start(0, &r.pattern, r.engine.current_time());
        r.scheduler.tick(0.0, &r.pattern, &mut r.instruments);
        assert_eq!(r.visual.poll(r.engine.current_time()), None);
        r.mixer.render(44_100 / 10);
        let shown = r.visual.poll(r.engine.current_time()).unwrap();
        assert_eq!((shown.step, shown.block), (0, 0));
    }

    #[test]
    fn voice_bank() {
        let mut r = rig();
        let id = r.instruments.add_voice(VoiceParams::default());
        assert_eq!(id, TrackId::bass(2));
        assert!(r.instruments.remove_voice(&TrackId::bass(1)));
        assert!(!r.instruments.remove_voice(&id));
        assert_eq!(r.instruments.add_voice(VoiceParams::default()), TrackId::bass(3));
        assert_eq!(r.instruments.voice_count(), 2);
    }

    #[test]
    fn slide_notes_carry_pitch_across_steps() {
        let mut r = rig();
        let bass = TrackId::bass(1);
        r.pattern.set_note(0, &bass, 0, PitchClass::C, 2);
        r.pattern.set_note(0, &bass, 1, PitchClass::C, 3);
        r.pattern.apply(crate::pipeline::pattern::PatternEdit::ToggleSlide { block: 0, track: bass.clone(), step: 1 });
        let first = dispatch_step(&r.pattern, &mut r.instruments, 0, 0, 0.0, 0.25);
        let second = dispatch_step(&r.pattern, &mut r.instruments, 1, 0, 0.1, 0.25);
        assert_eq!(second.notes[0].1.start_frequency, first.notes[0].1.frequency);
        assert_eq!(r.pattern.block(0).unwrap().note(&bass, 1), Some(NoteEvent::new(PitchClass::C, 3).slide()));
    }
}
