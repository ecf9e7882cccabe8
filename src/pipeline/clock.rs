// The clock thread. It owns the pattern, the voices and the scheduler, wakes
// up on a fixed tick to run the scheduler, and in between takes commands from
// the UI. Nothing else touches that state, so nothing here needs a lock; the
// UI sees a copy published after every change.

use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, Sender};
use tracing::{debug, info, warn};

use crate::audio::{AudioEngine, DrumKind, ParamChange, PitchClass, TrackId, VoiceParams};
use crate::config::EngineConfig;
use crate::error::Result;

use super::pattern::{PatternEdit, Pattern};
use super::scheduler::{Instruments, Scheduler};
use super::session::{SequencerState, Session};
use super::transport::Bpm;
use super::visual::VisualSender;

/// Something to play right now, outside the sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum Audition {
    Note { track: TrackId, pitch: PitchClass, octave: i32 },
    Drum(DrumKind),
}

#[derive(Debug)]
pub enum SequencerCommand {
    Play { start_block: usize },
    Stop,
    SetBpm(Bpm),
    SetParam { track: TrackId, change: ParamChange },
    AddVoice,
    RemoveVoice(TrackId),
    Edit(PatternEdit),
    Audition(Audition),
    Snapshot(Sender<Session>),
    Shutdown,
}

struct Sequencer {
    engine: AudioEngine,
    pattern: Pattern,
    instruments: Instruments,
    scheduler: Scheduler,
    state: Arc<RwLock<SequencerState>>,
}

impl Sequencer {
    fn handle(&mut self, cmd: SequencerCommand) {
        match cmd {
            SequencerCommand::Play { start_block } => {
                let now = self.engine.current_time();
                self.scheduler.start(start_block, &self.pattern, now);
                self.tick();
            }
            SequencerCommand::Stop => self.scheduler.stop(),
            SequencerCommand::SetBpm(bpm) => {
                info!(bpm = bpm.get(), "tempo changed");
                self.scheduler.set_bpm(bpm);
            }
            SequencerCommand::SetParam { track, change } => match self.instruments.voice_mut(&track) {
                Some(voice) => voice.apply(change),
                None => debug!(%track, "parameter change for unknown voice"),
            },
            SequencerCommand::AddVoice => {
                let id = self.instruments.add_voice(VoiceParams::default());
                self.pattern.register_track(id.clone());
                info!(%id, "voice added");
            }
            SequencerCommand::RemoveVoice(id) => {
                if self.instruments.remove_voice(&id) {
                    self.pattern.remove_track(&id);
                    info!(%id, "voice removed");
                } else {
                    warn!(%id, "voice not removed (unknown or last voice)");
                }
            }
            SequencerCommand::Edit(edit) => {
                if !self.pattern.apply(edit) {
                    debug!("pattern edit had no effect");
                }
            }
            SequencerCommand::Audition(audition) => self.audition(audition),
            SequencerCommand::Snapshot(reply) => {
                let _ = reply.send(self.session());
            }
            SequencerCommand::Shutdown => {}
        }
        self.publish();
    }

    fn audition(&mut self, audition: Audition) {
        let now = self.engine.current_time();
        match audition {
            Audition::Note { track, pitch, octave } => {
                let duration = self.scheduler.note_duration();
                if let Some(voice) = self.instruments.voice_mut(&track) {
                    voice.play(pitch, octave, now, duration, false, false);
                }
            }
            Audition::Drum(kind) => self.instruments.drums().trigger(kind, now),
        }
    }

    fn tick(&mut self) {
        if !self.scheduler.is_playing() {
            return;
        }
        let now = self.engine.current_time();
        let reports = self.scheduler.tick(now, &self.pattern, &mut self.instruments);
        if !reports.is_empty() {
            self.publish();
        }
    }

    fn session(&self) -> Session {
        Session {
            pattern: self.pattern.clone(),
            voices: self.instruments.params(),
            bpm: self.scheduler.transport().bpm,
        }
    }

    fn publish(&self) {
        let t = self.scheduler.transport();
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.session = self.session();
        state.is_playing = t.is_playing;
        state.current_step = t.current_step;
        state.current_block = t.current_block;
    }
}

/// Returned from [`spawn`]. Dropping it stops the clock thread.
pub struct SequencerHandle {
    tx: Option<Sender<SequencerCommand>>,
    state: Arc<RwLock<SequencerState>>,
    thread: Option<JoinHandle<()>>,
}

impl SequencerHandle {
    /// Non-blocking. Returns false once the clock thread is gone.
    pub fn send(&self, cmd: SequencerCommand) -> bool {
        match self.tx.as_ref() {
            Some(tx) => tx.send(cmd).is_ok(),
            None => false,
        }
    }

    /// The state as of the last change the clock thread published.
    pub fn state(&self) -> SequencerState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// A deep copy taken on the clock thread, after every command sent
    /// before it has been applied.
    pub fn snapshot(&self, timeout: Duration) -> Option<Session> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if !self.send(SequencerCommand::Snapshot(reply_tx)) {
            return None;
        }
        reply_rx.recv_timeout(timeout).ok()
    }

    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SequencerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(SequencerCommand::Shutdown);
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn spawn(
    engine: AudioEngine,
    session: Session,
    config: &EngineConfig,
    visual: VisualSender,
) -> Result<SequencerHandle> {
    let (tx, rx) = crossbeam_channel::unbounded::<SequencerCommand>();
    let state = SequencerState::new_shared(session.clone());
    let poll = config.poll_interval();

    let mut seq = Sequencer {
        instruments: Instruments::from_params(&engine, &session.voices),
        scheduler: Scheduler::new(config, session.bpm, visual),
        pattern: session.pattern,
        engine,
        state: Arc::clone(&state),
    };

    let thread = thread::Builder::new().name("sequencer".into()).spawn(move || {
        let ticker = crossbeam_channel::tick(poll);
        info!(poll_ms = poll.as_millis() as u64, "sequencer clock running");
        loop {
            select! {
                recv(rx) -> msg => match msg {
                    Ok(SequencerCommand::Shutdown) | Err(_) => break,
                    Ok(cmd) => seq.handle(cmd),
                },
                recv(ticker) -> _ => seq.tick(),
            }
        }
        info!("sequencer clock stopped");
    })?;

    Ok(SequencerHandle { tx: Some(tx), state, thread: Some(thread) })
}
