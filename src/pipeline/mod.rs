//! Everything between the pattern and the audio engine: transport, the
//! look-ahead scheduler, the clock thread that drives it, and the offline
//! renderer that reuses its dispatch path.

pub mod clock;
pub mod pattern;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod visual;

pub use clock::{spawn, Audition, SequencerCommand, SequencerHandle};
pub use pattern::{Block, NoteEvent, Pattern, PatternEdit, PatternSource, StepData};
pub use render::{render_session, RenderOptions, RenderedAudio};
pub use scheduler::{dispatch_step, Instruments, Scheduler, StepReport};
pub use session::{SequencerState, Session};
pub use transport::{Bpm, Transport};
pub use visual::{visual_channel, VisualEvent, VisualQueue, VisualSender};
