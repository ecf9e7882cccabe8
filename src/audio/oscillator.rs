//! Band-limited oscillators (PolyBLEP on the discontinuous shapes).

use std::f64::consts::TAU;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

/// Phase accumulator whose frequency is supplied per sample, so pitch
/// automation (slides, kick sweeps) is applied without any extra state.
#[derive(Clone, Debug)]
pub struct Oscillator {
    pub waveform: Waveform,
    phase: f64, // [0, 1)
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Self { waveform, phase: 0.0, sample_rate }
    }

    pub fn next_sample(&mut self, frequency: f64) -> f64 {
        let dt = (frequency / self.sample_rate).clamp(0.0, 0.5);
        let p = self.phase;
        let out = match self.waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Triangle => {
                if p < 0.5 { 4.0 * p - 1.0 } else { 3.0 - 4.0 * p }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0 - poly_blep(p, dt),
            Waveform::Square => {
                let naive = if p < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(p, dt) - poly_blep((p + 0.5) % 1.0, dt)
            }
        };
        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }
}

// residual subtracted around a unit step, `t` = phase, `dt` = increment
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let x = t / dt;
        2.0 * x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + 2.0 * x + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_starts_at_zero() {
        let mut osc = Oscillator::new(Waveform::Sine, 44_100.0);
        assert!(osc.next_sample(440.0).abs() < 1e-12);
    }

    #[test]
    fn shapes_stay_bounded() {
        for wf in [Waveform::Sine, Waveform::Triangle, Waveform::Sawtooth, Waveform::Square] {
            let mut osc = Oscillator::new(wf, 44_100.0);
            for _ in 0..44_100 {
                let s = osc.next_sample(523.25);
                assert!(s.abs() <= 1.5, "{wf:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn saw_has_no_dc() {
        let mut osc = Oscillator::new(Waveform::Sawtooth, 44_100.0);
        // exactly 100 periods of 441 Hz
        let mean: f64 = (0..10_000).map(|_| osc.next_sample(441.0)).sum::<f64>() / 10_000.0;
        assert!(mean.abs() < 0.01, "saw mean should be ~0, got {mean}");
    }

    #[test]
    fn zero_frequency_is_silent_for_sine() {
        let mut osc = Oscillator::new(Waveform::Sine, 44_100.0);
        for _ in 0..100 {
            assert_eq!(osc.next_sample(0.0), 0.0);
        }
    }
}
