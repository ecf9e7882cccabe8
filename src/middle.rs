// Sits between the TUI and the sequencer thread: turns input events into
// sequencer commands and builds the DisplayState the TUI draws each frame.
// The TUI never looks at the pattern itself.

use neurodark::audio::{DrumKind, ParamChange, PitchClass, TrackId, VoiceParams};
use neurodark::pipeline::{
    Audition, Bpm, NoteEvent, PatternEdit, PatternSource, SequencerCommand, SequencerState, VisualEvent,
};

use crate::shared::{DisplayState, InputEvent, LedState, ParamPage, STEPS_SHOWN};

const MIN_OCTAVE: i32 = 1;
const MAX_OCTAVE: i32 = 6;
const KNOB_STEP: f64 = 2.0; // percent per knob click
const RESONANCE_STEP: f64 = 1.0; // dB per knob click

#[derive(Clone, Debug, PartialEq)]
enum Lane {
    Bass(TrackId),
    Drums,
}

pub struct Middle {
    lane: usize,
    selected_step: usize,
    editing_block: usize,
    cursor_pitch: PitchClass,
    octave: i32,
    param_page: ParamPage,
    follow: bool,
    playhead: Option<VisualEvent>,
    message: String,
}

impl Default for Middle {
    fn default() -> Self {
        Self {
            lane: 0,
            selected_step: 0,
            editing_block: 0,
            cursor_pitch: PitchClass::C,
            octave: 2,
            param_page: ParamPage::Filter,
            follow: true,
            playhead: None,
            message: String::from("READY"),
        }
    }
}

impl Middle {
    pub fn set_message(&mut self, msg: impl Into<String>) {
        self.message = msg.into();
    }

    /// The playhead moved (the audio clock reached a dispatched step).
    pub fn on_visual(&mut self, event: VisualEvent) {
        self.playhead = Some(event);
        if self.follow {
            self.editing_block = event.block;
        }
    }

    pub fn handle_input(&mut self, event: InputEvent, state: &SequencerState) -> Vec<SequencerCommand> {
        let pattern = &state.session.pattern;
        let block_count = pattern.block_count();
        self.editing_block = self.editing_block.min(block_count.saturating_sub(1));
        let lane = self.current_lane(state);
        let block = self.editing_block;
        let step = self.selected_step;
        let note_here = match &lane {
            Lane::Bass(id) => pattern.block(block).and_then(|b| b.note(id, step)),
            Lane::Drums => None,
        };

        let mut cmds = Vec::new();
        match event {
            InputEvent::Quit | InputEvent::Render => {} // main handles these
            InputEvent::PlayPress => {
                if state.is_playing {
                    self.playhead = None;
                    cmds.push(SequencerCommand::Stop);
                } else {
                    cmds.push(SequencerCommand::Play { start_block: block });
                }
            }
            InputEvent::SelectStep(n) => {
                self.selected_step = (n as usize).min(STEPS_SHOWN - 1);
                if let (Lane::Bass(id), Some(b)) = (&lane, pattern.block(block)) {
                    if let Some(note) = b.note(id, self.selected_step) {
                        self.cursor_pitch = note.pitch;
                        self.octave = note.octave;
                        cmds.push(audition(id, note.pitch, note.octave));
                    }
                }
            }
            InputEvent::NextLane => {
                self.lane = (self.lane + 1) % (state.session.voices.len() + 1);
            }
            InputEvent::WriteNote => {
                if let Lane::Bass(id) = &lane {
                    cmds.push(self.set_note(id, self.cursor_pitch));
                    cmds.push(audition(id, self.cursor_pitch, self.octave));
                }
            }
            InputEvent::ClearNote => {
                if let Lane::Bass(id) = lane {
                    cmds.push(SequencerCommand::Edit(PatternEdit::ClearNote { block, track: id, step }));
                }
            }
            InputEvent::Pitch(delta) => {
                self.cursor_pitch = self.cursor_pitch.transpose(delta);
                if let (Lane::Bass(id), Some(_)) = (&lane, note_here) {
                    cmds.push(self.set_note(id, self.cursor_pitch));
                    cmds.push(audition(id, self.cursor_pitch, self.octave));
                }
            }
            InputEvent::Octave(delta) => {
                self.octave = (self.octave + delta).clamp(MIN_OCTAVE, MAX_OCTAVE);
            }
            InputEvent::ToggleSlide => {
                if let Lane::Bass(id) = lane {
                    cmds.push(SequencerCommand::Edit(PatternEdit::ToggleSlide { block, track: id, step }));
                }
            }
            InputEvent::ToggleAccent => {
                if let Lane::Bass(id) = lane {
                    cmds.push(SequencerCommand::Edit(PatternEdit::ToggleAccent { block, track: id, step }));
                }
            }
            InputEvent::ToggleDrum(i) => {
                if let Some(&kind) = DrumKind::ALL.get(i as usize) {
                    let present = pattern.block(block).is_some_and(|b| b.drums(step).contains(&kind));
                    cmds.push(SequencerCommand::Edit(PatternEdit::ToggleDrum { block, step, kind }));
                    if !present {
                        cmds.push(SequencerCommand::Audition(Audition::Drum(kind)));
                    }
                }
            }
            InputEvent::EditBlock(delta) => {
                self.follow = false;
                self.editing_block = block.saturating_add_signed(delta).min(block_count.saturating_sub(1));
            }
            InputEvent::MoveBlock(offset) => {
                if let Some(target) = block.checked_add_signed(offset).filter(|&t| t < block_count) {
                    cmds.push(SequencerCommand::Edit(PatternEdit::MoveBlock { block, offset }));
                    self.editing_block = target;
                }
            }
            InputEvent::AddBlock => {
                cmds.push(SequencerCommand::Edit(PatternEdit::AddBlock));
                self.editing_block = block_count;
                self.follow = false;
            }
            InputEvent::RemoveBlock => {
                if block_count > 1 {
                    cmds.push(SequencerCommand::Edit(PatternEdit::RemoveBlock(block)));
                    self.editing_block = block.min(block_count - 2);
                }
            }
            InputEvent::ClearBlock => {
                cmds.push(SequencerCommand::Edit(PatternEdit::ClearBlock(block)));
            }
            InputEvent::CopyBlock => {
                cmds.push(SequencerCommand::Edit(PatternEdit::CopyBlock(block)));
                self.set_message("PATTERN COPIED");
            }
            InputEvent::PasteBlock => {
                if pattern.has_clipboard() {
                    cmds.push(SequencerCommand::Edit(PatternEdit::PasteBlock { after: block }));
                    self.editing_block = block + 1;
                    self.follow = false;
                    self.set_message("PATTERN PASTED");
                }
            }
            InputEvent::ToggleFollow => self.follow = !self.follow,
            InputEvent::AddVoice => cmds.push(SequencerCommand::AddVoice),
            InputEvent::RemoveVoice => {
                if let Lane::Bass(id) = lane {
                    if state.session.voices.len() > 1 {
                        cmds.push(SequencerCommand::RemoveVoice(id));
                        self.lane = self.lane.saturating_sub(1);
                    } else {
                        self.set_message("LAST VOICE");
                    }
                }
            }
            InputEvent::AdjustBpm(delta) => match Bpm::new(state.session.bpm.get() + delta) {
                Ok(bpm) => cmds.push(SequencerCommand::SetBpm(bpm)),
                Err(e) => self.set_message(e.to_string()),
            },
            InputEvent::NextParamPage => self.param_page = self.param_page.next(),
            InputEvent::KnobTurnA(delta) | InputEvent::KnobTurnB(delta) => {
                if let Lane::Bass(id) = &lane {
                    let knob_a = matches!(event, InputEvent::KnobTurnA(_));
                    if let Some(params) = state.session.voice_params(id) {
                        let change = knob_change(self.param_page, knob_a, params, delta);
                        cmds.push(SequencerCommand::SetParam { track: id.clone(), change });
                    }
                }
            }
        }
        cmds
    }

    pub fn display_state(&self, state: &SequencerState) -> DisplayState {
        let pattern = &state.session.pattern;
        let block_count = pattern.block_count();
        let editing_block = self.editing_block.min(block_count.saturating_sub(1));
        let lane = self.current_lane(state);
        let playhead = self.playhead.filter(|_| state.is_playing);

        let mut leds = [LedState::Off; STEPS_SHOWN];
        let mut step_text: [String; STEPS_SHOWN] = Default::default();
        if let Some(b) = pattern.block(editing_block) {
            for step in 0..STEPS_SHOWN.min(pattern.steps_per_block()) {
                let (led, text) = match &lane {
                    Lane::Bass(id) => match b.note(id, step) {
                        Some(n) => (if n.accent { LedState::OnHigh } else { LedState::OnMedium }, note_text(&n)),
                        None => (LedState::Off, String::new()),
                    },
                    Lane::Drums => {
                        let drums = b.drums(step);
                        let text: String = drums.iter().map(|d| &d.label()[..1]).collect();
                        (if drums.is_empty() { LedState::Off } else { LedState::OnMedium }, text)
                    }
                };
                leds[step] = led;
                step_text[step] = text;
            }
        }
        if let Some(p) = playhead.filter(|p| p.block == editing_block && p.step < STEPS_SHOWN) {
            leds[p.step] = LedState::Blink;
        }

        let (knob_a_label, knob_b_label) = self.param_page.knob_labels();
        let (knob_a_value, knob_b_value) = match &lane {
            Lane::Bass(id) => state
                .session
                .voice_params(id)
                .map(|p| knob_values(self.param_page, p))
                .unwrap_or_default(),
            Lane::Drums => (String::from("--"), String::from("--")),
        };

        DisplayState {
            leds,
            step_text,
            selected_step: self.selected_step,
            playing: state.is_playing,
            beat: playhead.is_some_and(|p| p.step % 4 == 0),
            bpm: state.session.bpm.get(),
            lane_label: match &lane {
                Lane::Bass(id) => id.to_string().to_uppercase(),
                Lane::Drums => String::from("DRUMS"),
            },
            editing_block,
            playing_block: playhead.map(|p| p.block),
            block_count,
            follow: self.follow,
            cursor_pitch: self.cursor_pitch,
            octave: self.octave,
            param_page: self.param_page,
            knob_a_label,
            knob_b_label,
            knob_a_value,
            knob_b_value,
            display_text: self.message.clone(),
        }
    }

    fn current_lane(&self, state: &SequencerState) -> Lane {
        state
            .session
            .voices
            .get(self.lane)
            .map_or(Lane::Drums, |(id, _)| Lane::Bass(id.clone()))
    }

    fn set_note(&self, track: &TrackId, pitch: PitchClass) -> SequencerCommand {
        SequencerCommand::Edit(PatternEdit::SetNote {
            block: self.editing_block,
            track: track.clone(),
            step: self.selected_step,
            pitch,
            octave: self.octave,
        })
    }
}

fn audition(track: &TrackId, pitch: PitchClass, octave: i32) -> SequencerCommand {
    SequencerCommand::Audition(Audition::Note { track: track.clone(), pitch, octave })
}

fn note_text(n: &NoteEvent) -> String {
    let mut s = format!("{}{}", n.pitch, n.octave);
    if n.slide {
        s.push('~');
    }
    s
}

fn knob_change(page: ParamPage, knob_a: bool, p: &VoiceParams, delta: f64) -> ParamChange {
    match (page, knob_a) {
        (ParamPage::Filter, true) => ParamChange::Cutoff(p.cutoff + delta * KNOB_STEP),
        (ParamPage::Filter, false) => ParamChange::Resonance(p.resonance + delta * RESONANCE_STEP),
        (ParamPage::Envelope, true) => ParamChange::EnvMod(p.env_mod + delta * KNOB_STEP),
        (ParamPage::Envelope, false) => ParamChange::Decay(p.decay + delta * KNOB_STEP),
        (ParamPage::Drive, true) => ParamChange::Distortion(p.distortion + delta * KNOB_STEP),
        (ParamPage::Drive, false) => ParamChange::ToggleWaveform,
    }
}

fn knob_values(page: ParamPage, p: &VoiceParams) -> (String, String) {
    match page {
        ParamPage::Filter => (format!("{:.0}", p.cutoff), format!("{:.1}dB", p.resonance)),
        ParamPage::Envelope => (format!("{:.0}", p.env_mod), format!("{:.0}", p.decay)),
        ParamPage::Drive => (format!("{:.0}", p.distortion), p.waveform.label().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurodark::pipeline::Session;

    fn state() -> SequencerState {
        SequencerState {
            session: Session::demo(Bpm::default()),
            is_playing: false,
            current_step: 0,
            current_block: 0,
        }
    }

    #[test]
    fn play_press_toggles() {
        let mut m = Middle::default();
        let mut st = state();
        let cmds = m.handle_input(InputEvent::PlayPress, &st);
        assert!(matches!(cmds[..], [SequencerCommand::Play { start_block: 0 }]));
        st.is_playing = true;
        let cmds = m.handle_input(InputEvent::PlayPress, &st);
        assert!(matches!(cmds[..], [SequencerCommand::Stop]));
    }

    #[test]
    fn write_note_edits_and_auditions() {
        let mut m = Middle::default();
        let st = state();
        m.handle_input(InputEvent::SelectStep(1), &st);
        let cmds = m.handle_input(InputEvent::WriteNote, &st);
        assert_eq!(cmds.len(), 2);
        assert!(matches!(&cmds[0], SequencerCommand::Edit(PatternEdit::SetNote { step: 1, octave: 2, .. })));
        assert!(matches!(&cmds[1], SequencerCommand::Audition(Audition::Note { .. })));
    }

    #[test]
    fn drum_lane_shows_hits() {
        let mut m = Middle::default();
        let st = state();
        m.handle_input(InputEvent::NextLane, &st);
        let ds = m.display_state(&st);
        assert_eq!(ds.lane_label, "DRUMS");
        assert_eq!(ds.leds[0], LedState::OnMedium);
        assert_eq!(ds.step_text[0], "K");
        assert_eq!(ds.leds[1], LedState::Off);
    }

    #[test]
    fn accents_light_brighter_and_playhead_blinks() {
        let mut m = Middle::default();
        let mut st = state();
        st.is_playing = true;
        m.on_visual(VisualEvent { step: 4, block: 0, time: 0.0 });
        let ds = m.display_state(&st);
        assert_eq!(ds.leds[0], LedState::OnHigh);
        assert_eq!(ds.leds[2], LedState::OnMedium);
        assert_eq!(ds.leds[4], LedState::Blink);
        assert!(ds.beat);
        assert_eq!(ds.playing_block, Some(0));
    }

    #[test]
    fn bad_bpm_is_reported_not_sent() {
        let mut m = Middle::default();
        let st = state();
        let cmds = m.handle_input(InputEvent::AdjustBpm(-1000.0), &st);
        assert!(cmds.is_empty());
        assert!(m.display_state(&st).display_text.contains("invalid bpm"));
    }

    #[test]
    fn last_voice_is_kept() {
        let mut m = Middle::default();
        let st = state();
        assert!(m.handle_input(InputEvent::RemoveVoice, &st).is_empty());
    }
}
