// Offline bounce: replays a session through a fresh engine with no device
// behind it and encodes the result as 16-bit stereo WAV.

use std::io::Cursor;
use std::path::Path;

use tracing::info;

use crate::audio::{AudioEngine, StereoFrame};
use crate::config::EngineConfig;
use crate::error::Result;

use super::pattern::PatternSource;
use super::scheduler::{dispatch_step, Instruments};
use super::session::Session;

#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    pub repetitions: usize,
    pub sample_rate: u32,
    pub master_gain: f32,
    pub tail_secs: f64,
    pub note_duration: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default(), 1)
    }
}

impl RenderOptions {
    pub fn from_config(config: &EngineConfig, repetitions: usize) -> Self {
        Self {
            repetitions,
            sample_rate: config.render_sample_rate,
            master_gain: config.render_master_gain,
            tail_secs: config.render_tail_secs,
            note_duration: config.note_duration_secs,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedAudio {
    pub sample_rate: u32,
    pub frames: Vec<StereoFrame>,
}

impl RenderedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }

    pub fn peak(&self) -> f32 {
        self.frames.iter().fold(0.0f32, |p, f| p.max(f.left.abs()).max(f.right.abs()))
    }

    /// The whole file in memory: 44-byte header, then interleaved
    /// little-endian 16-bit samples.
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.frames.len() * 4));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for f in &self.frames {
                writer.write_sample(to_i16(f.left))?;
                writer.write_sample(to_i16(f.right))?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    pub fn write_wav(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_wav()?)?;
        Ok(())
    }
}

/// Clamp to [-1, 1], scale negatives by 32768 and positives by 32767,
/// truncate.
pub fn to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 { (s * 32_768.0) as i16 } else { (s * 32_767.0) as i16 }
}

/// Renders `repetitions` passes over every block of the session. Voices are
/// rebuilt from the session's parameters, so nothing live is touched.
pub fn render_session(session: &Session, options: &RenderOptions) -> RenderedAudio {
    let (engine, mut mixer) = AudioEngine::offline(options.sample_rate, options.master_gain);
    let mut instruments = Instruments::from_params(&engine, &session.voices);

    let pattern = &session.pattern;
    let steps_per_block = pattern.steps_per_block();
    let blocks = pattern.block_count();
    let seconds_per_step = session.bpm.seconds_per_step();
    let total_steps = options.repetitions * blocks * steps_per_block;

    let mut t = 0.0;
    for _ in 0..options.repetitions {
        for block in 0..blocks {
            for step in 0..steps_per_block {
                dispatch_step(pattern, &mut instruments, step, block, t, options.note_duration);
                t += seconds_per_step;
            }
        }
    }

    let duration = total_steps as f64 * seconds_per_step + options.tail_secs;
    let frames = (duration * options.sample_rate as f64) as usize;
    info!(total_steps, duration, frames, "rendering offline");

    RenderedAudio { sample_rate: options.sample_rate, frames: mixer.render(frames) }
}
