//! The bass voice: one logical synth track.
//!
//! `BassVoice` lives with the sequencer and decides, per `play()`, every
//! envelope a note will go through. The result is a `BassNote`, a
//! self-contained sound that is shipped to the mixer and rendered onto the
//! voice's bus. Notes never share state, so calls may overlap freely.

use std::fmt;

use crate::audio_api::ScheduledSound;

use super::automation::Automation;
use super::bus_id::BusId;
use super::effect::FxChain;
use super::filter::{resonance_db_to_q, Biquad, FilterEnvelope, FilterType};
use super::frame::{active_range, seconds_to_frame, StereoFrame};
use super::oscillator::{Oscillator, Waveform};
use super::shaper::DriveSettings;
use super::AudioEngine;

pub const INITIAL_FREQUENCY: f64 = 110.0;
pub const GLIDE_TIME: f64 = 0.12;
pub const ACCENT_GAIN: f64 = 0.9;
pub const NORMAL_GAIN: f64 = 0.5;
pub const RELEASE_FLOOR: f64 = 0.001;
pub const SAFETY_TAIL: f64 = 0.5;

const VCA_ATTACK: f64 = 0.01;
const SLIDE_VCA_ATTACK: f64 = 0.005;
const SLIDE_SUSTAIN: f64 = 0.1;
const SLIDE_RELEASE: f64 = 0.06;
const MIN_RESONANCE: f64 = 0.0001;
const MAX_RESONANCE: f64 = 30.0;
// the cutoff automation is only pushed into the biquad this often
const FILTER_UPDATE_FRAMES: u32 = 16;

// ── Pitch ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    pub fn index(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
        NAMES[self as usize]
    }

    /// Sharps and flats are both accepted ("C#", "Db"); anything else is `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let pc = match name.trim() {
            "C" | "B#" => PitchClass::C,
            "C#" | "Db" => PitchClass::CSharp,
            "D" => PitchClass::D,
            "D#" | "Eb" => PitchClass::DSharp,
            "E" | "Fb" => PitchClass::E,
            "F" | "E#" => PitchClass::F,
            "F#" | "Gb" => PitchClass::FSharp,
            "G" => PitchClass::G,
            "G#" | "Ab" => PitchClass::GSharp,
            "A" => PitchClass::A,
            "A#" | "Bb" => PitchClass::ASharp,
            "B" | "Cb" => PitchClass::B,
            _ => return None,
        };
        Some(pc)
    }

    /// Semitone steps with wraparound, for editing.
    pub fn transpose(self, semitones: i32) -> Self {
        Self::ALL[(self.index() + semitones).rem_euclid(12) as usize]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equal temperament, A4 = 440 Hz, C4 = MIDI 60.
pub fn note_frequency(pitch: PitchClass, octave: i32) -> f64 {
    let midi = (octave + 1) * 12 + pitch.index();
    440.0 * 2f64.powf((midi - 69) as f64 / 12.0)
}

// ── Track identity ────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `bass-1`, `bass-2`, ...
    pub fn bass(n: usize) -> Self {
        Self(format!("bass-{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bass_number(&self) -> Option<usize> {
        self.0.strip_prefix("bass-")?.parse().ok()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Parameters ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BassWaveform {
    Saw,
    Square,
}

impl BassWaveform {
    pub fn toggled(self) -> Self {
        match self {
            BassWaveform::Saw => BassWaveform::Square,
            BassWaveform::Square => BassWaveform::Saw,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BassWaveform::Saw => "SAW",
            BassWaveform::Square => "SQR",
        }
    }

    fn oscillator(self) -> Waveform {
        match self {
            BassWaveform::Saw => Waveform::Sawtooth,
            BassWaveform::Square => Waveform::Square,
        }
    }
}

/// Knob values of one voice. Percentages are 0-100, resonance is in dB.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceParams {
    pub distortion: f64,
    pub cutoff: f64,
    pub resonance: f64,
    pub env_mod: f64,
    pub decay: f64,
    pub waveform: BassWaveform,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            distortion: 20.0,
            cutoff: 40.0,
            resonance: 4.0,
            env_mod: 50.0,
            decay: 50.0,
            waveform: BassWaveform::Saw,
        }
    }
}

impl VoiceParams {
    pub fn apply(&mut self, change: ParamChange) {
        match change {
            ParamChange::Distortion(v) => self.distortion = clamp_percent(v),
            ParamChange::Cutoff(v) => self.cutoff = clamp_percent(v),
            ParamChange::Resonance(v) => self.resonance = clamp_or(v, MIN_RESONANCE, MAX_RESONANCE, self.resonance),
            ParamChange::EnvMod(v) => self.env_mod = clamp_percent(v),
            ParamChange::Decay(v) => self.decay = clamp_percent(v),
            ParamChange::Waveform(w) => self.waveform = w,
            ParamChange::ToggleWaveform => self.waveform = self.waveform.toggled(),
        }
    }
}

fn clamp_percent(v: f64) -> f64 {
    clamp_or(v, 0.0, 100.0, 0.0)
}

// NaN keeps `fallback`
fn clamp_or(v: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if v.is_nan() { fallback } else { v.clamp(lo, hi) }
}

/// One knob move, as sent from the UI to the sequencer thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamChange {
    Distortion(f64),
    Cutoff(f64),
    Resonance(f64),
    EnvMod(f64),
    Decay(f64),
    Waveform(BassWaveform),
    ToggleWaveform,
}

// ── Note planning ─────────────────────────────────────────────────

/// Everything decided about one note before it sounds.
#[derive(Clone, Debug, PartialEq)]
pub struct NotePlan {
    pub start: f64,
    pub duration: f64,
    pub frequency: f64,
    /// Where the oscillator starts; differs from `frequency` only on a slide.
    pub start_frequency: f64,
    pub slide: bool,
    pub accent: bool,
    pub peak_gain: f64,
    pub vca_attack: f64,
    pub filter: FilterEnvelope,
    /// Time the VCA reaches its floor.
    pub release_end: f64,
    pub stop_time: f64,
}

impl NotePlan {
    pub fn release_time(&self) -> f64 {
        self.release_end - self.start
    }

    fn frequency_automation(&self) -> Automation {
        let mut a = Automation::new(self.start_frequency);
        if self.slide {
            a.set_value_at_time(self.start_frequency, self.start)
                .exponential_ramp_to_value_at_time(self.frequency, self.start + GLIDE_TIME);
        } else {
            a.set_value_at_time(self.frequency, self.start);
        }
        a
    }

    fn cutoff_automation(&self) -> Automation {
        let mut a = Automation::new(self.filter.base_hz);
        self.filter.apply(self.start, &mut a);
        a
    }

    fn gain_automation(&self) -> Automation {
        let mut a = Automation::new(0.0);
        a.set_value_at_time(0.0, self.start)
            .linear_ramp_to_value_at_time(self.peak_gain, self.start + self.vca_attack);
        if self.slide {
            a.exponential_ramp_to_value_at_time(SLIDE_SUSTAIN, self.start + self.duration)
                .exponential_ramp_to_value_at_time(RELEASE_FLOOR, self.release_end);
        } else {
            a.exponential_ramp_to_value_at_time(RELEASE_FLOOR, self.release_end);
        }
        // silent once released, not stuck on the floor value
        a.set_value_at_time(0.0, self.release_end);
        a
    }
}

// ── The scheduled sound ───────────────────────────────────────────

/// A planned note ready to render: oscillator -> resonant low-pass -> VCA.
#[derive(Clone, Debug)]
pub struct BassNote {
    start_time: f64,
    stop_time: f64,
    start_frame: u64,
    stop_frame: u64,
    sample_rate: f64,
    q: f64,
    frequency: Automation,
    cutoff: Automation,
    gain: Automation,
    osc: Oscillator,
    filter: Biquad,
    since_update: u32,
}

impl BassNote {
    pub fn new(plan: &NotePlan, waveform: BassWaveform, sample_rate: f64) -> Self {
        let q = resonance_db_to_q(plan.filter.resonance_db);
        Self {
            start_time: plan.start,
            stop_time: plan.stop_time,
            start_frame: seconds_to_frame(plan.start, sample_rate),
            stop_frame: seconds_to_frame(plan.stop_time, sample_rate),
            sample_rate,
            q,
            frequency: plan.frequency_automation(),
            cutoff: plan.cutoff_automation(),
            gain: plan.gain_automation(),
            osc: Oscillator::new(waveform.oscillator(), sample_rate),
            filter: Biquad::new(FilterType::Lowpass, plan.filter.base_hz, q, sample_rate),
            since_update: 0,
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    pub fn gain_at(&self, t: f64) -> f64 {
        self.gain.sample(t)
    }

    pub fn frequency_at(&self, t: f64) -> f64 {
        self.frequency.sample(t)
    }

    pub fn cutoff_at(&self, t: f64) -> f64 {
        self.cutoff.sample(t)
    }

    pub fn render_into(&mut self, block_start: u64, out: &mut [StereoFrame]) {
        let Some(range) = active_range(block_start, out.len(), self.start_frame, self.stop_frame) else {
            return;
        };
        for i in range {
            let t = (block_start + i as u64) as f64 / self.sample_rate;
            if self.since_update == 0 {
                let cutoff = self.cutoff.value_at(t);
                self.filter.set(cutoff, self.q);
            }
            self.since_update = (self.since_update + 1) % FILTER_UPDATE_FRAMES;

            let freq = self.frequency.value_at(t);
            let x = self.osc.next_sample(freq);
            let y = self.filter.process(x) * self.gain.value_at(t);
            out[i].add_mono(y as f32);
        }
    }
}

// ── The voice ─────────────────────────────────────────────────────

pub struct BassVoice {
    engine: AudioEngine,
    id: TrackId,
    params: VoiceParams,
    bus: BusId,
    has_fx: bool,
    last_frequency: f64,
}

impl BassVoice {
    /// Creates the voice's bus on the engine. With `fx: None` the bus is a
    /// plain passthrough and distortion settings are ignored.
    pub fn new(engine: &AudioEngine, id: TrackId, params: VoiceParams, fx: Option<FxChain>) -> Self {
        let has_fx = fx.is_some();
        let bus = engine.create_bus(fx);
        let voice = Self {
            engine: engine.clone(),
            id,
            params,
            bus,
            has_fx,
            last_frequency: INITIAL_FREQUENCY,
        };
        voice.push_drive();
        voice
    }

    /// The usual setup: a bus carrying the distortion chain.
    pub fn with_default_fx(engine: &AudioEngine, id: TrackId, params: VoiceParams) -> Self {
        let fx = FxChain::new(engine.sample_rate() as f64);
        Self::new(engine, id, params, Some(fx))
    }

    pub fn id(&self) -> &TrackId {
        &self.id
    }

    pub fn params(&self) -> &VoiceParams {
        &self.params
    }

    pub fn bus(&self) -> BusId {
        self.bus
    }

    pub fn last_frequency(&self) -> f64 {
        self.last_frequency
    }

    /// Works out a note without scheduling it or touching voice state.
    pub fn plan(&self, frequency: f64, start: f64, duration: f64, slide: bool, accent: bool) -> NotePlan {
        let duration = if duration.is_nan() { 0.0 } else { duration.max(0.0) };
        let p = &self.params;
        let filter = FilterEnvelope::new(p.cutoff, p.resonance, p.env_mod, p.decay, self.engine.sample_rate() as f64)
            .accented(accent)
            .sliding(slide);

        let release_end = if slide {
            start + duration + SLIDE_RELEASE
        } else {
            start + duration.max(filter.length())
        };
        let envelope_end = release_end.max(start + filter.length());

        NotePlan {
            start,
            duration,
            frequency,
            start_frequency: if slide { self.last_frequency } else { frequency },
            slide,
            accent,
            peak_gain: if accent { ACCENT_GAIN } else { NORMAL_GAIN },
            vca_attack: if slide { SLIDE_VCA_ATTACK } else { VCA_ATTACK },
            filter,
            release_end,
            stop_time: start + duration.max(envelope_end - start) + SAFETY_TAIL,
        }
    }

    /// Schedules one note at `start` (audio-clock seconds).
    pub fn play(
        &mut self,
        pitch: PitchClass,
        octave: i32,
        start: f64,
        duration: f64,
        slide: bool,
        accent: bool,
    ) -> NotePlan {
        let frequency = note_frequency(pitch, octave);
        let plan = self.plan(frequency, start, duration, slide, accent);
        self.last_frequency = frequency;

        let note = BassNote::new(&plan, self.params.waveform, self.engine.sample_rate() as f64);
        self.engine.schedule(Some(self.bus), ScheduledSound::Bass(note));
        plan
    }

    /// Like [`play`](Self::play) with a note name; unknown names do nothing.
    pub fn play_named(
        &mut self,
        name: &str,
        octave: i32,
        start: f64,
        duration: f64,
        slide: bool,
        accent: bool,
    ) -> Option<NotePlan> {
        let pitch = PitchClass::from_name(name)?;
        Some(self.play(pitch, octave, start, duration, slide, accent))
    }

    pub fn apply(&mut self, change: ParamChange) {
        let before = self.params.distortion;
        self.params.apply(change);
        if self.params.distortion != before {
            self.push_drive();
        }
    }

    pub fn set_distortion(&mut self, amount: f64) {
        self.apply(ParamChange::Distortion(amount));
    }

    pub fn set_cutoff(&mut self, cutoff: f64) {
        self.apply(ParamChange::Cutoff(cutoff));
    }

    pub fn set_resonance(&mut self, resonance: f64) {
        self.apply(ParamChange::Resonance(resonance));
    }

    pub fn set_env_mod(&mut self, env_mod: f64) {
        self.apply(ParamChange::EnvMod(env_mod));
    }

    pub fn set_decay(&mut self, decay: f64) {
        self.apply(ParamChange::Decay(decay));
    }

    pub fn set_waveform(&mut self, waveform: BassWaveform) {
        self.apply(ParamChange::Waveform(waveform));
    }

    pub fn toggle_waveform(&mut self) {
        self.apply(ParamChange::ToggleWaveform);
    }

    /// The drive the voice's bus is currently set to.
    pub fn drive(&self) -> DriveSettings {
        DriveSettings::for_amount(self.params.distortion as f32, self.engine.curves())
    }

    /// Removes the voice's bus. Notes still ringing fall through to master.
    pub fn retire(self) {
        self.engine.remove_bus(self.bus);
    }

    fn push_drive(&self) {
        if self.has_fx {
            self.engine.configure_bus(self.bus, self.drive());
        }
    }
}

impl fmt::Debug for BassVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BassVoice")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("bus", &self.bus)
            .field("last_frequency", &self.last_frequency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Mixer;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    const SR: u32 = 44_100;

    fn voice() -> (BassVoice, Mixer) {
        let (engine, mixer) = AudioEngine::offline(SR, 1.0);
        (BassVoice::with_default_fx(&engine, TrackId::bass(1), VoiceParams::default()), mixer)
    }

    #[test]
    fn reference_pitches() {
        assert_eq!(note_frequency(PitchClass::A, 4), 440.0);
        assert_relative_eq!(note_frequency(PitchClass::C, 4), 261.63, epsilon = 0.01);
        assert_relative_eq!(note_frequency(PitchClass::A, 3), 220.0, epsilon = 1e-9);
    }

    #[test]
    fn pitch_names_round_trip() {
        for pc in PitchClass::ALL {
            assert_eq!(PitchClass::from_name(pc.name()), Some(pc));
        }
        assert_eq!(PitchClass::from_name("Bb"), Some(PitchClass::ASharp));
        assert_eq!(PitchClass::from_name("H"), None);
        assert_eq!(PitchClass::B.transpose(1), PitchClass::C);
        assert_eq!(PitchClass::C.transpose(-1), PitchClass::B);
    }

    #[test]
    fn slide_starts_from_previous_target() {
        let (mut v, _m) = voice();
        assert_eq!(v.last_frequency(), INITIAL_FREQUENCY);
        let first = v.play(PitchClass::C, 3, 0.0, 0.25, false, false);
        let second = v.play(PitchClass::G, 3, 0.25, 0.25, true, false);
        assert_eq!(second.start_frequency, first.frequency);
        assert_eq!(v.last_frequency(), second.frequency);
    }

    #[test]
    fn slide_glides_exponentially() {
        let (mut v, _m) = voice();
        v.play(PitchClass::A, 2, 0.0, 0.25, false, false);
        let plan = v.play(PitchClass::A, 3, 1.0, 0.25, true, false);
        let note = BassNote::new(&plan, BassWaveform::Saw, SR as f64);
        assert_relative_eq!(note.frequency_at(1.0), 110.0, epsilon = 1e-9);
        // halfway through the glide is one half octave up
        assert_relative_eq!(note.frequency_at(1.0 + GLIDE_TIME / 2.0), 110.0 * 2f64.sqrt(), epsilon = 1e-6);
        assert_relative_eq!(note.frequency_at(1.5), 220.0, epsilon = 1e-9);
    }

    #[test]
    fn release_covers_filter_decay() {
        let (mut v, _m) = voice();
        for decay in [0.0, 25.0, 50.0, 100.0] {
            v.set_decay(decay);
            for accent in [false, true] {
                let plan = v.play(PitchClass::C, 2, 0.0, 0.05, false, accent);
                assert!(
                    plan.release_time() >= plan.filter.decay,
                    "release {} shorter than decay {}",
                    plan.release_time(),
                    plan.filter.decay
                );
            }
        }
    }

    #[test]
    fn accent_is_louder_and_brighter() {
        let (v, _m) = voice();
        let plain = v.plan(110.0, 0.0, 0.25, false, false);
        let accent = v.plan(110.0, 0.0, 0.25, false, true);
        assert_eq!(plain.peak_gain, NORMAL_GAIN);
        assert_eq!(accent.peak_gain, ACCENT_GAIN);
        assert!(accent.filter.peak_hz() > plain.filter.peak_hz());
        assert!(accent.filter.resonance_db > plain.filter.resonance_db);
        assert!(accent.filter.decay < plain.filter.decay);
    }

    #[test]
    fn vca_shape() {
        let (v, _m) = voice();
        let plan = v.plan(110.0, 1.0, 0.25, false, false);
        let note = BassNote::new(&plan, BassWaveform::Saw, SR as f64);
        assert_eq!(note.gain_at(0.99), 0.0);
        assert_relative_eq!(note.gain_at(1.0 + VCA_ATTACK), NORMAL_GAIN, epsilon = 1e-9);
        assert!(note.gain_at(plan.release_end - 1e-4) < 0.01);
        assert_eq!(note.gain_at(plan.release_end + 0.01), 0.0);
        assert!(plan.stop_time >= plan.release_end + SAFETY_TAIL - 1e-9);
    }

    #[test]
    fn slide_gain_holds_then_releases() {
        let (v, _m) = voice();
        let plan = v.plan(110.0, 0.0, 0.25, true, false);
        let note = BassNote::new(&plan, BassWaveform::Saw, SR as f64);
        assert_relative_eq!(note.gain_at(0.25), SLIDE_SUSTAIN, epsilon = 1e-9);
        assert_relative_eq!(plan.release_end, 0.25 + SLIDE_RELEASE, epsilon = 1e-12);
        assert_eq!(plan.vca_attack, SLIDE_VCA_ATTACK);
    }

    #[test]
    fn negative_duration_is_clamped() {
        let (v, _m) = voice();
        let plan = v.plan(110.0, 0.0, -1.0, false, false);
        assert_eq!(plan.duration, 0.0);
        assert!(plan.stop_time > 0.0);
    }

    #[test]
    fn unknown_note_name_is_a_no_op() {
        let (mut v, mut m) = voice();
        assert!(v.play_named("X", 3, 0.0, 0.25, false, false).is_none());
        assert_eq!(v.last_frequency(), INITIAL_FREQUENCY);
        m.drain_commands();
        assert_eq!(m.active_sounds(), 0);
    }

    #[test]
    fn overlapping_notes_are_independent() {
        let (mut v, mut m) = voice();
        v.play(PitchClass::C, 2, 0.0, 1.0, false, false);
        v.play(PitchClass::E, 2, 0.01, 1.0, false, false);
        m.drain_commands();
        assert_eq!(m.active_sounds(), 2);
        assert!(m.scheduled().all(|(bus, _)| bus == Some(v.bus())));
    }

    #[test]
    fn repeated_distortion_reuses_curve() {
        let (mut v, _m) = voice();
        v.set_distortion(63.0);
        let a = v.drive().curve.unwrap();
        v.set_distortion(63.0);
        let b = v.drive().curve.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        v.set_distortion(0.0);
        assert!(v.drive().curve.is_none());
    }

    #[test]
    fn setters_clamp() {
        let (mut v, _m) = voice();
        v.set_cutoff(250.0);
        v.set_resonance(-3.0);
        v.set_env_mod(f64::NAN);
        assert_eq!(v.params().cutoff, 100.0);
        assert_eq!(v.params().resonance, MIN_RESONANCE);
        assert_eq!(v.params().env_mod, 0.0);
        v.toggle_waveform();
        assert_eq!(v.params().waveform, BassWaveform::Square);
    }

    #[test]
    fn note_renders_sound_then_silence() {
        let (mut v, mut m) = voice();
        v.set_distortion(0.0);
        v.play(PitchClass::A, 2, 0.0, 0.25, false, true);
        let out = m.render(SR as usize * 2);
        let peak = out[..SR as usize / 2].iter().fold(0.0f32, |p, f| p.max(f.left.abs()));
        assert!(peak > 0.05, "note should be audible, peak {peak}");
        assert_eq!(m.active_sounds(), 0);
        assert!(out[out.len() - 10..].iter().all(|f| f.left.abs() < 1e-4));
    }

    #[test]
    fn retire_removes_bus() {
        let (v, mut m) = voice();
        m.drain_commands();
        assert_eq!(m.bus_count(), 1);
        v.retire();
        m.drain_commands();
        assert_eq!(m.bus_count(), 0);
    }
}
