//! Biquad filters and the bass filter envelope.
//!
//! Coefficients follow the RBJ Audio EQ Cookbook in Direct Form II
//! Transposed. Resonance for the bass low-pass is expressed in dB, the same
//! unit an audio-graph low-pass uses for its Q.

use std::f64::consts::PI;

use super::automation::Automation;

pub const MIN_CUTOFF_HZ: f64 = 50.0;
pub const MAX_CUTOFF_HZ: f64 = 10_000.0;
pub const MAX_RESONANCE_DB: f64 = 30.0;

const FILTER_ATTACK: f64 = 0.01;
const SLIDE_FILTER_ATTACK: f64 = 0.08;
const MAX_ENV_DEPTH_HZ: f64 = 3_000.0;
const ACCENT_DEPTH_SCALE: f64 = 2.0;
const ACCENT_DECAY_SCALE: f64 = 0.6;
const SLIDE_DECAY_SCALE: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

#[derive(Clone, Debug)]
pub struct Biquad {
    pub filter_type: FilterType,
    frequency: f64,
    q: f64,
    sample_rate: f64,
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    pub fn new(filter_type: FilterType, frequency: f64, q: f64, sample_rate: f64) -> Self {
        let mut f = Self {
            filter_type,
            frequency,
            q,
            sample_rate,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };
        f.update_coefficients();
        f
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Retunes the filter; coefficients are only recomputed on change.
    pub fn set(&mut self, frequency: f64, q: f64) {
        if frequency != self.frequency || q != self.q {
            self.frequency = frequency;
            self.q = q;
            self.update_coefficients();
        }
    }

    fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate * 0.5;
        let freq = self.frequency.clamp(10.0, nyquist * 0.98);
        let q = self.q.max(1e-4);
        let w0 = 2.0 * PI * freq / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2) = match self.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let out = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * out + self.z2;
        self.z2 = self.b2 * input - self.a2 * out;
        out
    }
}

/// Resonance in dB to the linear Q of the cookbook formulas.
pub fn resonance_db_to_q(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Maps the 0-100 cutoff knob onto 50 Hz..10 kHz on a log scale, so equal
/// knob moves sound like equal pitch moves.
pub fn cutoff_to_hz(percent: f64) -> f64 {
    let p = percent.clamp(0.0, 100.0) / 100.0;
    MIN_CUTOFF_HZ * (MAX_CUTOFF_HZ / MIN_CUTOFF_HZ).powf(p)
}

/// The per-note cutoff sweep: base -> peak over `attack`, then an
/// exponential fall back to base over `decay`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterEnvelope {
    pub base_hz: f64,
    pub depth_hz: f64,
    pub ceiling_hz: f64,
    pub resonance_db: f64,
    pub attack: f64,
    pub decay: f64,
}

impl FilterEnvelope {
    /// `cutoff`, `env_mod` and `decay` are 0-100 knob values, `resonance`
    /// is in dB.
    pub fn new(cutoff: f64, resonance: f64, env_mod: f64, decay: f64, sample_rate: f64) -> Self {
        let decay = decay.clamp(0.0, 100.0) / 100.0;
        Self {
            base_hz: cutoff_to_hz(cutoff),
            depth_hz: env_mod.clamp(0.0, 100.0) / 100.0 * MAX_ENV_DEPTH_HZ,
            ceiling_hz: sample_rate * 0.45,
            resonance_db: resonance.clamp(0.0, MAX_RESONANCE_DB),
            attack: FILTER_ATTACK,
            decay: 0.08 + decay * 0.9,
        }
    }

    /// Accent opens the filter further, snaps it shut faster and pushes
    /// the resonance up.
    pub fn accented(mut self, accent: bool) -> Self {
        if accent {
            self.depth_hz *= ACCENT_DEPTH_SCALE;
            self.decay *= ACCENT_DECAY_SCALE;
            self.resonance_db = (self.resonance_db * 2.5 + 5.0).min(MAX_RESONANCE_DB);
        }
        self
    }

    /// Sliding notes get a softer attack and a longer tail.
    pub fn sliding(mut self, slide: bool) -> Self {
        if slide {
            self.attack = SLIDE_FILTER_ATTACK;
            self.decay *= SLIDE_DECAY_SCALE;
        }
        self
    }

    pub fn peak_hz(&self) -> f64 {
        (self.base_hz + self.depth_hz).min(self.ceiling_hz)
    }

    /// Seconds from note start until the sweep is back at base.
    pub fn length(&self) -> f64 {
        self.attack + self.decay
    }

    /// Writes the sweep into `cutoff` and returns the decay time so the
    /// amplitude envelope can be aligned with it.
    pub fn apply(&self, start: f64, cutoff: &mut Automation) -> f64 {
        cutoff
            .set_value_at_time(self.base_hz, start)
            .linear_ramp_to_value_at_time(self.peak_hz(), start + self.attack)
            .exponential_ramp_to_value_at_time(self.base_hz, start + self.length());
        self.decay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn peak_after_transient(f: &mut Biquad, freq: f64) -> f64 {
        let mut peak = 0.0f64;
        for i in 0..8820 {
            let x = (2.0 * PI * freq * i as f64 / 44_100.0).sin();
            let y = f.process(x);
            if i > 4410 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = Biquad::new(FilterType::Lowpass, 2_000.0, 0.707, 44_100.0);
        let mut y = 0.0;
        for _ in 0..2000 {
            y = f.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3, "lowpass should pass DC, got {y}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = Biquad::new(FilterType::Highpass, 2_000.0, 0.707, 44_100.0);
        let mut y = 1.0;
        for _ in 0..2000 {
            y = f.process(1.0);
        }
        assert!(y.abs() < 1e-3, "highpass should block DC, got {y}");
    }

    #[test]
    fn bandpass_prefers_its_center() {
        let mut at_center = Biquad::new(FilterType::Bandpass, 10_000.0, 1.0, 44_100.0);
        let mut below = Biquad::new(FilterType::Bandpass, 10_000.0, 1.0, 44_100.0);
        assert!(peak_after_transient(&mut at_center, 10_000.0) > 4.0 * peak_after_transient(&mut below, 500.0));
    }

    #[test]
    fn resonance_boosts_the_cutoff() {
        let mut flat = Biquad::new(FilterType::Lowpass, 1_000.0, resonance_db_to_q(0.0), 44_100.0);
        let mut peaky = Biquad::new(FilterType::Lowpass, 1_000.0, resonance_db_to_q(20.0), 44_100.0);
        assert!(peak_after_transient(&mut peaky, 1_000.0) > 5.0 * peak_after_transient(&mut flat, 1_000.0));
    }

    #[test]
    fn cutoff_mapping_is_logarithmic() {
        assert_relative_eq!(cutoff_to_hz(0.0), MIN_CUTOFF_HZ);
        assert_relative_eq!(cutoff_to_hz(100.0), MAX_CUTOFF_HZ, epsilon = 1e-9);
        // the midpoint is the geometric mean, not the arithmetic one
        assert_relative_eq!(cutoff_to_hz(50.0), (MIN_CUTOFF_HZ * MAX_CUTOFF_HZ).sqrt(), epsilon = 1e-9);
        assert_eq!(cutoff_to_hz(-10.0), cutoff_to_hz(0.0));
        assert_eq!(cutoff_to_hz(250.0), cutoff_to_hz(100.0));
    }

    #[test]
    fn accent_deepens_and_shortens() {
        let plain = FilterEnvelope::new(40.0, 4.0, 50.0, 50.0, 44_100.0);
        let accent = plain.accented(true);
        assert!(accent.peak_hz() > plain.peak_hz());
        assert!(accent.decay < plain.decay);
        assert!(accent.resonance_db > plain.resonance_db);
        assert!(accent.resonance_db <= MAX_RESONANCE_DB);
    }

    #[test]
    fn slide_lengthens() {
        let plain = FilterEnvelope::new(40.0, 4.0, 50.0, 50.0, 44_100.0);
        let slide = plain.sliding(true);
        assert!(slide.attack > plain.attack);
        assert!(slide.decay > plain.decay);
    }

    #[test]
    fn peak_stays_below_nyquist() {
        let env = FilterEnvelope::new(100.0, 0.0, 100.0, 0.0, 22_050.0).accented(true);
        assert!(env.peak_hz() < 11_025.0);
    }

    #[test]
    fn apply_writes_the_sweep() {
        let env = FilterEnvelope::new(40.0, 4.0, 50.0, 50.0, 44_100.0);
        let mut cutoff = Automation::new(0.0);
        let decay = env.apply(1.0, &mut cutoff);
        assert_eq!(decay, env.decay);
        assert_relative_eq!(cutoff.sample(1.0), env.base_hz);
        assert_relative_eq!(cutoff.sample(1.0 + env.attack), env.peak_hz());
        assert_relative_eq!(cutoff.sample(1.0 + env.length() + 1.0), env.base_hz);
    }
}
