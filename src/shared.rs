// Types passed between the TUI and the middle layer.
//
// Keys (resolved in tui/input.rs):
//   1 2 3 4 / q w e r / a s d f / z x c v   select step 1-16
//   Space        play / stop
//   Tab          next lane (bass voices, then drums)
//   Enter        write note at cursor pitch      Backspace  clear note
//   , .          pitch down / up                 < >        octave down / up
//   u i          toggle slide / accent
//   5 6 7 8      toggle kick / snare / hat / tom (drum lane)
//   h l          edit previous / next block      { }        move block left / right
//   + _          add / delete block              X          clear block
//   C V          copy block / paste after        F          follow playhead
//   A R          add voice / remove current voice
//   b B          bpm down / up
//   p            next param page, [ ] and - = turn knobs A and B
//   W            render the session to a WAV file
//   Esc          quit

use neurodark::audio::PitchClass;

pub const STEPS_SHOWN: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Quit,
    PlayPress,
    SelectStep(u8),
    NextLane,
    WriteNote,
    ClearNote,
    Pitch(i32),
    Octave(i32),
    ToggleSlide,
    ToggleAccent,
    ToggleDrum(u8),
    EditBlock(isize),
    MoveBlock(isize),
    AddBlock,
    RemoveBlock,
    ClearBlock,
    CopyBlock,
    PasteBlock,
    ToggleFollow,
    AddVoice,
    RemoveVoice,
    AdjustBpm(f64),
    NextParamPage,
    KnobTurnA(f64),
    KnobTurnB(f64),
    Render,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedState {
    Off,
    OnMedium,
    OnHigh,
    // the playhead; the TUI decides when it is lit
    Blink,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamPage {
    Filter,
    Envelope,
    Drive,
}

impl ParamPage {
    pub fn next(self) -> Self {
        match self {
            ParamPage::Filter => ParamPage::Envelope,
            ParamPage::Envelope => ParamPage::Drive,
            ParamPage::Drive => ParamPage::Filter,
        }
    }

    pub fn knob_labels(self) -> (&'static str, &'static str) {
        match self {
            ParamPage::Filter => ("CUTOFF", "RESO"),
            ParamPage::Envelope => ("ENVMOD", "DECAY"),
            ParamPage::Drive => ("DIST", "WAVE"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub leds: [LedState; STEPS_SHOWN],
    pub step_text: [String; STEPS_SHOWN], // note name or drum initials per step
    pub selected_step: usize,
    pub playing: bool,
    pub beat: bool, // lit on every 4th step while playing
    pub bpm: f64,
    pub lane_label: String,
    pub editing_block: usize,
    pub playing_block: Option<usize>,
    pub block_count: usize,
    pub follow: bool,
    pub cursor_pitch: PitchClass,
    pub octave: i32,
    pub param_page: ParamPage,
    pub knob_a_label: &'static str,
    pub knob_b_label: &'static str,
    pub knob_a_value: String,
    pub knob_b_value: String,
    pub display_text: String,
}
