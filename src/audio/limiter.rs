//! Master-bus limiter: a feed-forward soft-knee compressor with a high
//! ratio, sitting after the master gain.

#[derive(Clone, Debug)]
pub struct Limiter {
    threshold_db: f64,
    knee_db: f64,
    ratio: f64,
    attack_coef: f64,
    release_coef: f64,
    envelope: f64, // smoothed peak, linear
}

impl Limiter {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_params(sample_rate, -1.0, 30.0, 12.0, 0.003, 0.25)
    }

    pub fn with_params(
        sample_rate: f64,
        threshold_db: f64,
        knee_db: f64,
        ratio: f64,
        attack: f64,
        release: f64,
    ) -> Self {
        Self {
            threshold_db,
            knee_db: knee_db.max(0.0),
            ratio: ratio.max(1.0),
            attack_coef: (-1.0 / (attack.max(1e-5) * sample_rate)).exp(),
            release_coef: (-1.0 / (release.max(1e-5) * sample_rate)).exp(),
            envelope: 0.0,
        }
    }

    // gain change in dB (<= 0) for a detector level in dB
    fn gain_db(&self, level_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let over = level_db - self.threshold_db;
        let half_knee = self.knee_db / 2.0;
        if over <= -half_knee {
            0.0
        } else if over >= half_knee || self.knee_db == 0.0 {
            -over * slope
        } else {
            let x = over + half_knee;
            -slope * x * x / (2.0 * self.knee_db)
        }
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak = left.abs().max(right.abs()) as f64;
        let coef = if peak > self.envelope { self.attack_coef } else { self.release_coef };
        self.envelope = coef * self.envelope + (1.0 - coef) * peak;

        let level_db = if self.envelope > 1e-9 { 20.0 * self.envelope.log10() } else { -180.0 };
        let gain = 10f64.powf(self.gain_db(level_db) / 20.0) as f32;
        (left * gain, right * gain)
    }
}
