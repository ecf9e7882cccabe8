use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// fixed seed: the same session always renders to the same bytes
const NOISE_SEED: u64 = 0x23_0ac1d;

/// One second of white noise shared (read-only) by every noise-based hit.
#[derive(Debug)]
pub struct NoiseBuffer {
    samples: Vec<f32>,
}

impl NoiseBuffer {
    pub fn white(sample_rate: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(NOISE_SEED);
        let samples = (0..sample_rate.max(1))
            .map(|_| rng.gen_range(-1.0f32..=1.0))
            .collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    // one-shot playback: silent once the buffer runs out
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.samples.get(index).copied().unwrap_or(0.0)
    }
}
