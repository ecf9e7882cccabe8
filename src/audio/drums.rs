//! Synthesized percussion. Every hit is one or two layers (a pitched tone or
//! the shared noise buffer) with fixed envelopes; there are no knobs.

use std::fmt;
use std::sync::Arc;

use crate::audio_api::ScheduledSound;

use super::automation::Automation;
use super::filter::{resonance_db_to_q, Biquad, FilterType};
use super::frame::{active_range, seconds_to_frame, StereoFrame};
use super::noise::NoiseBuffer;
use super::oscillator::{Oscillator, Waveform};
use super::AudioEngine;

// default resonance of a graph-style high-pass, in dB
const HIGHPASS_RESONANCE_DB: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrumKind {
    Kick,
    Snare,
    Hat,
    Tom,
}

impl DrumKind {
    pub const ALL: [DrumKind; 4] = [DrumKind::Kick, DrumKind::Snare, DrumKind::Hat, DrumKind::Tom];

    pub fn id(self) -> &'static str {
        match self {
            DrumKind::Kick => "kick",
            DrumKind::Snare => "snare",
            DrumKind::Hat => "hat",
            DrumKind::Tom => "tom",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DrumKind::Kick => "KICK",
            DrumKind::Snare => "SNARE",
            DrumKind::Hat => "HI-HAT",
            DrumKind::Tom => "LOW TOM",
        }
    }

    /// Parses a kit id. `perc` is the old name of the tom slot.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "kick" => Some(DrumKind::Kick),
            "snare" => Some(DrumKind::Snare),
            "hat" => Some(DrumKind::Hat),
            "tom" | "perc" => Some(DrumKind::Tom),
            _ => None,
        }
    }
}

impl fmt::Display for DrumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug)]
enum Source {
    Tone { osc: Oscillator, frequency: Automation },
    Noise { buffer: Arc<NoiseBuffer>, filters: Vec<Biquad> },
}

#[derive(Clone, Debug)]
struct Layer {
    source: Source,
    gain: Automation,
    start_frame: u64,
    stop_frame: u64,
}

impl Layer {
    fn render_into(&mut self, block_start: u64, out: &mut [StereoFrame], sample_rate: f64) {
        let Some(range) = active_range(block_start, out.len(), self.start_frame, self.stop_frame) else {
            return;
        };
        for i in range {
            let frame = block_start + i as u64;
            let t = frame as f64 / sample_rate;
            let x = match &mut self.source {
                Source::Tone { osc, frequency } => osc.next_sample(frequency.value_at(t)),
                Source::Noise { buffer, filters } => {
                    let offset = (frame - self.start_frame) as usize;
                    filters
                        .iter_mut()
                        .fold(buffer.get(offset) as f64, |x, f| f.process(x))
                }
            };
            out[i].add_mono((x * self.gain.value_at(t)) as f32);
        }
    }
}

/// One drum hit, ready for the mixer.
#[derive(Clone, Debug)]
pub struct DrumHit {
    kind: DrumKind,
    start_time: f64,
    stop_time: f64,
    sample_rate: f64,
    layers: Vec<Layer>,
}

impl DrumHit {
    pub fn kind(&self) -> DrumKind {
        self.kind
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    /// (start, stop) of every layer, in seconds.
    pub fn layer_spans(&self) -> Vec<(f64, f64)> {
        self.layers
            .iter()
            .map(|l| (l.start_frame as f64 / self.sample_rate, l.stop_frame as f64 / self.sample_rate))
            .collect()
    }

    pub fn render_into(&mut self, block_start: u64, out: &mut [StereoFrame]) {
        for layer in &mut self.layers {
            layer.render_into(block_start, out, self.sample_rate);
        }
    }
}

struct HitBuilder<'a> {
    time: f64,
    sample_rate: f64,
    noise: &'a Arc<NoiseBuffer>,
    layers: Vec<Layer>,
}

impl HitBuilder<'_> {
    fn decay(&self, from: f64, to: f64, length: f64) -> Automation {
        let mut gain = Automation::new(from);
        gain.set_value_at_time(from, self.time)
            .exponential_ramp_to_value_at_time(to, self.time + length);
        gain
    }

    fn push(&mut self, source: Source, gain: Automation, length: f64) {
        self.layers.push(Layer {
            source,
            gain,
            start_frame: seconds_to_frame(self.time, self.sample_rate),
            stop_frame: seconds_to_frame(self.time + length, self.sample_rate),
        });
    }

    fn tone(&mut self, waveform: Waveform, frequency: Automation, gain: Automation, length: f64) {
        let osc = Oscillator::new(waveform, self.sample_rate);
        self.push(Source::Tone { osc, frequency }, gain, length);
    }

    fn noise(&mut self, filters: Vec<Biquad>, gain: Automation, length: f64) {
        let buffer = Arc::clone(self.noise);
        self.push(Source::Noise { buffer, filters }, gain, length);
    }

    fn sweep(&self, from: f64, to: f64, length: f64) -> Automation {
        self.decay(from, to, length)
    }

    fn fixed(&self, hz: f64) -> Automation {
        let mut f = Automation::new(hz);
        f.set_value_at_time(hz, self.time);
        f
    }
}

/// Builds the hit for `kind` at `time` without sending it anywhere.
pub fn build_hit(kind: DrumKind, time: f64, sample_rate: f64, noise: &Arc<NoiseBuffer>) -> DrumHit {
    let mut b = HitBuilder { time, sample_rate, noise, layers: Vec::with_capacity(2) };
    let highpass = |hz| Biquad::new(FilterType::Highpass, hz, resonance_db_to_q(HIGHPASS_RESONANCE_DB), sample_rate);

    match kind {
        DrumKind::Kick => {
            let freq = b.sweep(150.0, 0.01, 0.5);
            let gain = b.decay(1.0, 0.001, 0.5);
            b.tone(Waveform::Sine, freq, gain, 0.5);
        }
        DrumKind::Snare => {
            // body
            let freq = b.fixed(180.0);
            let gain = b.decay(0.4, 0.01, 0.15);
            b.tone(Waveform::Triangle, freq, gain, 0.2);
            // snares
            let gain = b.decay(0.6, 0.01, 0.25);
            b.noise(vec![highpass(2_000.0)], gain, 0.3);
        }
        DrumKind::Hat => {
            let bandpass = Biquad::new(FilterType::Bandpass, 10_000.0, 1.0, sample_rate);
            let gain = b.decay(0.6, 0.01, 0.08);
            b.noise(vec![bandpass, highpass(7_000.0)], gain, 0.1);
        }
        DrumKind::Tom => {
            let freq = b.sweep(200.0, 60.0, 0.4);
            let gain = b.decay(0.8, 0.01, 0.4);
            b.tone(Waveform::Sine, freq, gain, 0.4);
        }
    }

    let stop_frame = b.layers.iter().map(|l| l.stop_frame).max().unwrap_or(0);
    DrumHit {
        kind,
        start_time: time,
        stop_time: stop_frame as f64 / sample_rate,
        sample_rate,
        layers: b.layers,
    }
}

/// The percussion engine: sends hits straight to the master bus.
#[derive(Clone)]
pub struct DrumKit {
    engine: AudioEngine,
}

impl DrumKit {
    pub fn new(engine: &AudioEngine) -> Self {
        Self { engine: engine.clone() }
    }

    pub fn trigger(&self, kind: DrumKind, time: f64) {
        let hit = build_hit(kind, time, self.engine.sample_rate() as f64, self.engine.noise());
        self.engine.schedule(None, ScheduledSound::Drum(hit));
    }

    /// Triggers by kit id; unknown ids are ignored.
    pub fn trigger_id(&self, id: &str, time: f64) -> Option<DrumKind> {
        let kind = DrumKind::from_id(id)?;
        self.trigger(kind, time);
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 44_100.0;

    fn hit(kind: DrumKind, time: f64) -> DrumHit {
        build_hit(kind, time, SR, &Arc::new(NoiseBuffer::white(SR as u32)))
    }

    fn render(mut hit: DrumHit, frames: usize) -> Vec<StereoFrame> {
        let mut out = vec![StereoFrame::zero(); frames];
        for (i, chunk) in out.chunks_mut(128).enumerate() {
            hit.render_into((i * 128) as u64, chunk);
        }
        out
    }

    #[test]
    fn ids_and_labels() {
        for kind in DrumKind::ALL {
            assert_eq!(DrumKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(DrumKind::from_id("perc"), Some(DrumKind::Tom));
        assert_eq!(DrumKind::from_id("cowbell"), None);
        assert_eq!(DrumKind::Hat.label(), "HI-HAT");
        assert_eq!(DrumKind::Tom.to_string(), "LOW TOM");
    }

    #[test]
    fn stop_times_follow_recipes() {
        let cases = [(DrumKind::Kick, 0.5), (DrumKind::Snare, 0.3), (DrumKind::Hat, 0.1), (DrumKind::Tom, 0.4)];
        for (kind, len) in cases {
            let h = hit(kind, 1.0);
            assert_relative_eq!(h.stop_time() - h.start_time(), len, epsilon = 1.0 / SR);
        }
        let spans = hit(DrumKind::Snare, 0.0).layer_spans();
        assert_eq!(spans.len(), 2);
        assert_relative_eq!(spans[0].1, 0.2, epsilon = 1.0 / SR);
        assert_relative_eq!(spans[1].1, 0.3, epsilon = 1.0 / SR);
    }

    #[test]
    fn nothing_before_start_or_after_stop() {
        let start = 0.01;
        let out = render(hit(DrumKind::Kick, start), SR as usize);
        let first = seconds_to_frame(start, SR) as usize;
        assert!(out[..first].iter().all(|f| *f == StereoFrame::zero()));
        assert!(out[first..first + 2000].iter().any(|f| f.left.abs() > 0.1));
        assert!(out[first + (0.5 * SR) as usize + 1..].iter().all(|f| *f == StereoFrame::zero()));
    }

    #[test]
    fn hat_is_bright() {
        let out = render(hit(DrumKind::Hat, 0.0), (0.1 * SR) as usize);
        let energy: f32 = out.iter().map(|f| f.left * f.left).sum();
        // mean absolute first difference is large for high-passed noise
        let roughness: f32 = out.windows(2).map(|w| (w[1].left - w[0].left).abs()).sum();
        assert!(energy > 0.0);
        assert!(roughness > out.iter().map(|f| f.left.abs()).sum::<f32>());
    }

    #[test]
    fn hits_are_deterministic() {
        let a = render(hit(DrumKind::Snare, 0.0), 8_820);
        let b = render(hit(DrumKind::Snare, 0.0), 8_820);
        assert_eq!(a, b);
    }

    #[test]
    fn kit_routes_to_master() {
        let (engine, mut mixer) = AudioEngine::offline(SR as u32, 1.0);
        let kit = DrumKit::new(&engine);
        kit.trigger(DrumKind::Kick, 0.0);
        assert_eq!(kit.trigger_id("perc", 0.1), Some(DrumKind::Tom));
        assert_eq!(kit.trigger_id("nope", 0.1), None);
        mixer.drain_commands();
        assert_eq!(mixer.active_sounds(), 2);
        assert!(mixer.scheduled().all(|(bus, _)| bus.is_none()));
        mixer.render(SR as usize);
        assert_eq!(mixer.active_sounds(), 0);
    }
}
