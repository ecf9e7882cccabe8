// where the sequencer is and when the next step is due

use std::fmt;

use crate::error::{Error, Result};

pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 999.0;
pub const STEPS_PER_BEAT: f64 = 4.0; // sixteenth notes

/// A tempo that is known to be usable: finite, above zero, clamped to
/// 20..=999 so a step is never longer than 0.75 s.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Bpm(f64);

impl Bpm {
    pub fn new(bpm: f64) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(Error::InvalidBpm(bpm));
        }
        Ok(Self(bpm.clamp(MIN_BPM, MAX_BPM)))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// (60 / bpm) / 4
    pub fn seconds_per_step(self) -> f64 {
        60.0 / self.0 / STEPS_PER_BEAT
    }
}

impl Default for Bpm {
    fn default() -> Self {
        Self(174.0)
    }
}

impl fmt::Display for Bpm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transport {
    pub is_playing: bool,
    pub bpm: Bpm,
    pub current_step: usize,
    pub current_block: usize,
    pub next_note_time: f64,
}

impl Transport {
    pub fn new(bpm: Bpm) -> Self {
        Self {
            is_playing: false,
            bpm,
            current_step: 0,
            current_block: 0,
            next_note_time: 0.0,
        }
    }

    pub fn seconds_per_step(&self) -> f64 {
        self.bpm.seconds_per_step()
    }

    /// Moves to the next step, wrapping into the next block and past the
    /// last block back to the first. Zero-sized patterns keep the counters
    /// at 0.
    pub fn advance(&mut self, steps_per_block: usize, block_count: usize) {
        self.next_note_time += self.seconds_per_step();
        self.current_step += 1;
        if self.current_step >= steps_per_block {
            self.current_step = 0;
            self.current_block += 1;
            if self.current_block >= block_count {
                self.current_block = 0;
            }
        }
    }

    /// Resets position for a fresh start at `time`.
    pub fn rewind(&mut self, start_block: usize, block_count: usize, time: f64) {
        self.current_step = 0;
        self.current_block = if block_count == 0 { 0 } else { start_block.min(block_count - 1) };
        self.next_note_time = time;
    }
}
