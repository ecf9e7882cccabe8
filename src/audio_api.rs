pub use crate::audio::{BassNote, BusId, DriveSettings, DrumHit, FxChain, StereoFrame};

// A fully scheduled sub-graph. Everything it will do is decided before it is
// sent, so the render side only has to evaluate it frame by frame and drop it
// once its stop time has passed.
#[derive(Clone, Debug)]
pub enum ScheduledSound {
    Bass(BassNote),
    Drum(DrumHit),
}

impl ScheduledSound {
    pub fn start_time(&self) -> f64 {
        match self {
            ScheduledSound::Bass(n) => n.start_time(),
            ScheduledSound::Drum(h) => h.start_time(),
        }
    }

    pub fn stop_time(&self) -> f64 {
        match self {
            ScheduledSound::Bass(n) => n.stop_time(),
            ScheduledSound::Drum(h) => h.stop_time(),
        }
    }

    // mixes this sound into `out`, whose first frame is `block_start`
    pub fn render_into(&mut self, block_start: u64, out: &mut [StereoFrame]) {
        match self {
            ScheduledSound::Bass(n) => n.render_into(block_start, out),
            ScheduledSound::Drum(h) => h.render_into(block_start, out),
        }
    }
}

#[derive(Debug)]
pub enum AudioCommand {
    // Each bass voice owns a bus so its distortion runs over everything the
    // voice plays, overlapping notes included. `fx: None` is a plain bus.
    CreateBus { bus: BusId, fx: Option<FxChain> },
    ConfigureBus { bus: BusId, drive: DriveSettings },
    RemoveBus(BusId),

    // `bus: None` goes straight to the master bus (drums)
    Schedule { bus: Option<BusId>, sound: ScheduledSound },
}
