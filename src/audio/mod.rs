use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Sender, TrySendError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

use crate::audio_api::{AudioCommand, ScheduledSound};
use crate::config::EngineConfig;
use crate::error::{Error, Result};

pub mod automation;
mod bus_id;
pub mod drums;
pub mod effect;
pub mod engine;
pub mod filter;
mod frame;
pub mod limiter;
pub mod noise;
pub mod oscillator;
pub mod shaper;
pub mod voice;

pub use bus_id::BusId;
pub use drums::{DrumHit, DrumKind, DrumKit};
pub use effect::{Effect, FxChain};
pub use engine::Mixer;
pub use frame::{active_range, seconds_to_frame, StereoFrame};
pub use noise::NoiseBuffer;
pub use shaper::{CurveCache, DriveSettings};
pub use voice::{BassNote, BassVoice, BassWaveform, NotePlan, ParamChange, PitchClass, TrackId, VoiceParams};

use bus_id::BusIds;

const LIVE_QUEUE: usize = 1024;
const MAX_CALLBACK_FRAMES: usize = 4096;

/// Handle to an audio context. Voices, drums, the scheduler and the offline
/// renderer all get one of these passed in; cloning it is cheap and every
/// clone talks to the same render side.
#[derive(Clone)]
pub struct AudioEngine {
    sample_rate: u32,
    tx: Sender<AudioCommand>,
    clock: Arc<AtomicU64>, // frames rendered so far
    bus_ids: Arc<BusIds>,
    curves: Arc<CurveCache>,
    noise: Arc<NoiseBuffer>,
}

impl AudioEngine {
    fn with_sender(sample_rate: u32, tx: Sender<AudioCommand>, clock: Arc<AtomicU64>) -> Self {
        Self {
            sample_rate,
            tx,
            clock,
            bus_ids: Arc::new(BusIds::default()),
            curves: Arc::new(CurveCache::new()),
            noise: Arc::new(NoiseBuffer::white(sample_rate)),
        }
    }

    /// A context with no device behind it. The returned mixer renders
    /// whatever was scheduled, as fast as the CPU allows.
    pub fn offline(sample_rate: u32, master_gain: f32) -> (Self, Mixer) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let clock = Arc::new(AtomicU64::new(0));
        let mixer = Mixer::new(rx, Arc::clone(&clock), sample_rate, master_gain);
        (Self::with_sender(sample_rate, tx, clock), mixer)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The audio clock, in seconds of audio rendered.
    pub fn current_time(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    pub fn curves(&self) -> &CurveCache {
        &self.curves
    }

    pub fn noise(&self) -> &Arc<NoiseBuffer> {
        &self.noise
    }

    pub fn create_bus(&self, fx: Option<FxChain>) -> BusId {
        let bus = self.bus_ids.next_id();
        self.send(AudioCommand::CreateBus { bus, fx });
        bus
    }

    pub fn configure_bus(&self, bus: BusId, drive: DriveSettings) {
        self.send(AudioCommand::ConfigureBus { bus, drive });
    }

    pub fn remove_bus(&self, bus: BusId) {
        self.send(AudioCommand::RemoveBus(bus));
    }

    pub fn schedule(&self, bus: Option<BusId>, sound: ScheduledSound) {
        self.send(AudioCommand::Schedule { bus, sound });
    }

    fn send(&self, cmd: AudioCommand) {
        match self.tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("audio command queue full, dropping command"),
            Err(TrySendError::Disconnected(_)) => {} // render side already gone
        }
    }
}

pub struct LiveAudio {
    engine: AudioEngine,
    _output_stream: cpal::Stream,
}

impl LiveAudio {
    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }
}

/// Opens the default output device and starts pulling audio from a mixer.
pub fn start_live(config: &EngineConfig) -> Result<LiveAudio> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(LIVE_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
    let supported = device.default_output_config()?;

    let sample_rate: u32 = supported.sample_rate();
    let channels = supported.channels() as usize;
    info!(sample_rate, channels, "opening output stream");

    match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let clock = Arc::new(AtomicU64::new(0));
            let mixer = Mixer::new(rx, Arc::clone(&clock), sample_rate, config.live_master_gain);
            let stream = build_output_stream_f32(&device, &supported.into(), mixer, channels)?;
            stream.play()?;
            Ok(LiveAudio {
                engine: AudioEngine::with_sender(sample_rate, tx, clock),
                _output_stream: stream,
            })
        }
        other => Err(Error::UnsupportedSampleFormat(other)),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
    channels: usize,
) -> Result<cpal::Stream> {
    let mut scratch = vec![StereoFrame::zero(); MAX_CALLBACK_FRAMES];
    let err_fn = |err| error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            mixer.drain_commands();

            for out in data.chunks_mut(MAX_CALLBACK_FRAMES * channels) {
                let n_frames = out.len() / channels;
                let frames = &mut scratch[..n_frames];
                mixer.render_block(frames);
                for (dst, src) in out.chunks_exact_mut(channels).zip(frames.iter()) {
                    match dst {
                        [mono] => *mono = 0.5 * (src.left + src.right),
                        [l, r, rest @ ..] => {
                            *l = src.left;
                            *r = src.right;
                            rest.fill(0.0);
                        }
                        [] => {}
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_clock_follows_rendering() {
        let (engine, mut mixer) = AudioEngine::offline(1_000, 1.0);
        assert_eq!(engine.current_time(), 0.0);
        mixer.render(500);
        assert!((engine.current_time() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn clones_share_resources() {
        let (engine, _mixer) = AudioEngine::offline(8_000, 1.0);
        let other = engine.clone();
        assert!(Arc::ptr_eq(engine.noise(), other.noise()));
        let a = engine.curves().get(10.0).unwrap();
        let b = other.curves().get(10.0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn buses_come_and_go() {
        let (engine, mut mixer) = AudioEngine::offline(8_000, 1.0);
        let bus = engine.create_bus(None);
        engine.create_bus(Some(FxChain::new(8_000.0)));
        mixer.drain_commands();
        assert_eq!(mixer.bus_count(), 2);
        engine.remove_bus(bus);
        mixer.drain_commands();
        assert_eq!(mixer.bus_count(), 1);
    }

    #[test]
    fn every_voice_keeps_its_distortion_bus() {
        let (engine, mut mixer) = AudioEngine::offline(8_000, 1.0);
        let params = VoiceParams { distortion: 80.0, ..VoiceParams::default() };
        let voices: Vec<BassVoice> = (1..=40)
            .map(|n| BassVoice::with_default_fx(&engine, TrackId::bass(n), params.clone()))
            .collect();
        mixer.drain_commands();
        assert_eq!(mixer.bus_count(), voices.len());
    }

    #[test]
    fn empty_engine_renders_silence() {
        let (_engine, mut mixer) = AudioEngine::offline(8_000, 1.0);
        let out = mixer.render(1000);
        assert_eq!(out.len(), 1000);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
    }
}
