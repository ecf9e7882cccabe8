use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Receiver;

use crate::audio_api::{AudioCommand, ScheduledSound};

use super::bus_id::BusId;
use super::effect::{Effect, FxChain};
use super::frame::{seconds_to_frame, StereoFrame};
use super::limiter::Limiter;

pub const BLOCK_FRAMES: usize = 128; // render granularity; callbacks get chunked to this
const SOUND_CAPACITY: usize = 256; // reserved up front so the callback rarely allocates
const BUS_CAPACITY: usize = 32; // grows past this if more voices are added

struct Bus {
    id: BusId,
    fx: Option<FxChain>,
    buf: Vec<StereoFrame>,
}

struct Routed {
    bus: Option<BusId>,
    stop_frame: u64,
    sound: ScheduledSound,
}

/// The render side of the engine: receives scheduled sounds, mixes them per
/// bus, runs each bus's effect chain, then master gain and the limiter.
/// A sound is dropped as soon as its stop frame has been rendered, which is
/// all the cleanup a note ever needs.
pub struct Mixer {
    rx: Receiver<AudioCommand>,
    clock: Arc<AtomicU64>,
    sample_rate: f64,
    frame: u64,
    sounds: Vec<Routed>,
    buses: Vec<Bus>,
    master: Vec<StereoFrame>,
    master_gain: f32,
    limiter: Limiter,
}

impl Mixer {
    pub(crate) fn new(rx: Receiver<AudioCommand>, clock: Arc<AtomicU64>, sample_rate: u32, master_gain: f32) -> Self {
        let sample_rate = sample_rate as f64;
        Self {
            rx,
            clock,
            sample_rate,
            frame: 0,
            sounds: Vec::with_capacity(SOUND_CAPACITY),
            buses: Vec::with_capacity(BUS_CAPACITY),
            master: vec![StereoFrame::zero(); BLOCK_FRAMES],
            master_gain,
            limiter: Limiter::new(sample_rate),
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::CreateBus { bus, fx } => {
                if !self.buses.iter().any(|b| b.id == bus) {
                    self.buses.push(Bus { id: bus, fx, buf: vec![StereoFrame::zero(); BLOCK_FRAMES] });
                }
            }
            AudioCommand::ConfigureBus { bus, drive } => {
                if let Some(fx) = self.buses.iter_mut().find(|b| b.id == bus).and_then(|b| b.fx.as_mut()) {
                    fx.set_drive(drive);
                }
            }
            AudioCommand::RemoveBus(bus) => self.buses.retain(|b| b.id != bus),
            AudioCommand::Schedule { bus, sound } => {
                let stop_frame = seconds_to_frame(sound.stop_time(), self.sample_rate);
                if stop_frame > self.frame {
                    self.sounds.push(Routed { bus, stop_frame, sound });
                }
            }
        }
    }

    pub fn drain_commands(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            self.handle_cmd(cmd);
        }
    }

    /// Fills `out` (overwriting it) and advances the audio clock.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for chunk in out.chunks_mut(BLOCK_FRAMES) {
            self.render_chunk(chunk);
        }
    }

    /// Offline use: take everything queued so far and render `frames` frames.
    pub fn render(&mut self, frames: usize) -> Vec<StereoFrame> {
        self.drain_commands();
        let mut out = vec![StereoFrame::zero(); frames];
        self.render_block(&mut out);
        out
    }

    pub fn active_sounds(&self) -> usize {
        self.sounds.len()
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    pub fn scheduled(&self) -> impl Iterator<Item = (Option<BusId>, &ScheduledSound)> {
        self.sounds.iter().map(|r| (r.bus, &r.sound))
    }

    fn render_chunk(&mut self, out: &mut [StereoFrame]) {
        let n = out.len();
        let block_start = self.frame;
        let block_end = block_start + n as u64;

        let Self { sounds, buses, master, .. } = &mut *self;
        master[..n].fill(StereoFrame::zero());
        for bus in buses.iter_mut() {
            bus.buf[..n].fill(StereoFrame::zero());
        }

        for routed in sounds.iter_mut() {
            // a bus removed while its notes still ring falls back to master
            let target = match routed.bus.and_then(|id| buses.iter_mut().find(|b| b.id == id)) {
                Some(bus) => &mut bus.buf[..n],
                None => &mut master[..n],
            };
            routed.sound.render_into(block_start, target);
        }
        sounds.retain(|r| r.stop_frame > block_end);

        for bus in buses.iter_mut() {
            if let Some(fx) = bus.fx.as_mut() {
                fx.process(&mut bus.buf[..n]);
            }
            for (m, b) in master[..n].iter_mut().zip(&bus.buf[..n]) {
                m.left += b.left;
                m.right += b.right;
            }
        }

        let gain = self.master_gain;
        for (o, m) in out.iter_mut().zip(&self.master[..n]) {
            let (left, right) = self.limiter.process(m.left * gain, m.right * gain);
            *o = StereoFrame { left, right };
        }

        self.frame = block_end;
        self.clock.store(self.frame, Ordering::Release);
    }
}
