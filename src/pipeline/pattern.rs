// The pattern store: blocks of steps, each step holding drum hits and one
// optional note per bass track.
//
// "block": a fixed-length run of steps, played one after another.
// "track": the lane of notes for one bass voice, keyed by its TrackId.
// "step": a sixteenth-note slot.

use std::collections::BTreeMap;

use crate::audio::{DrumKind, PitchClass, TrackId};

pub const DEFAULT_STEPS_PER_BLOCK: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    pub pitch: PitchClass,
    pub octave: i32,
    pub slide: bool,
    pub accent: bool,
}

impl NoteEvent {
    pub fn new(pitch: PitchClass, octave: i32) -> Self {
        Self { pitch, octave, slide: false, accent: false }
    }

    pub fn slide(mut self) -> Self {
        self.slide = true;
        self
    }

    pub fn accent(mut self) -> Self {
        self.accent = true;
        self
    }
}

/// Everything that sounds at one (step, block).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepData {
    pub drums: Vec<DrumKind>,
    pub notes: Vec<(TrackId, NoteEvent)>,
}

impl StepData {
    pub fn is_empty(&self) -> bool {
        self.drums.is_empty() && self.notes.is_empty()
    }
}

/// Read side of the pattern store, which is all the scheduler needs.
pub trait PatternSource {
    fn steps_per_block(&self) -> usize;
    fn block_count(&self) -> usize;
    /// `None` for positions outside the pattern.
    fn step_data(&self, step: usize, block: usize) -> Option<StepData>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    // ordered, so notes in a step always come out in the same order
    tracks: BTreeMap<TrackId, Vec<Option<NoteEvent>>>,
    drums: Vec<Vec<DrumKind>>,
}

impl Block {
    fn empty<'a>(steps: usize, tracks: impl IntoIterator<Item = &'a TrackId>) -> Self {
        Self {
            tracks: tracks.into_iter().map(|id| (id.clone(), vec![None; steps])).collect(),
            drums: vec![Vec::new(); steps],
        }
    }

    pub fn note(&self, track: &TrackId, step: usize) -> Option<NoteEvent> {
        self.tracks.get(track)?.get(step).copied().flatten()
    }

    pub fn drums(&self, step: usize) -> &[DrumKind] {
        self.drums.get(step).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.drums.iter().all(Vec::is_empty) && self.tracks.values().flatten().all(Option::is_none)
    }

    fn note_mut(&mut self, track: &TrackId, step: usize) -> Option<&mut Option<NoteEvent>> {
        self.tracks.get_mut(track)?.get_mut(step)
    }
}

/// One edit to the pattern, as sent from the UI.
#[derive(Clone, Debug, PartialEq)]
pub enum PatternEdit {
    SetNote { block: usize, track: TrackId, step: usize, pitch: PitchClass, octave: i32 },
    ClearNote { block: usize, track: TrackId, step: usize },
    ToggleSlide { block: usize, track: TrackId, step: usize },
    ToggleAccent { block: usize, track: TrackId, step: usize },
    ToggleDrum { block: usize, step: usize, kind: DrumKind },
    AddBlock,
    RemoveBlock(usize),
    ClearBlock(usize),
    MoveBlock { block: usize, offset: isize },
    CopyBlock(usize),
    PasteBlock { after: usize },
}

#[derive(Clone, Debug)]
pub struct Pattern {
    steps_per_block: usize,
    tracks: Vec<TrackId>,
    blocks: Vec<Block>,
    clipboard: Option<Block>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS_PER_BLOCK)
    }
}

impl Pattern {
    /// One empty block, no tracks.
    pub fn new(steps_per_block: usize) -> Self {
        let steps_per_block = steps_per_block.max(1);
        Self {
            steps_per_block,
            tracks: Vec::new(),
            blocks: vec![Block::empty(steps_per_block, std::iter::empty())],
            clipboard: None,
        }
    }

    /// A short acid line on `bass-1` over a plain beat.
    pub fn demo() -> Self {
        use PitchClass::*;

        let mut p = Self::new(DEFAULT_STEPS_PER_BLOCK);
        let bass = TrackId::bass(1);
        p.register_track(bass.clone());

        let line: [(usize, PitchClass, i32, bool, bool); 8] = [
            (0, C, 2, false, true),
            (2, C, 3, false, false),
            (3, DSharp, 2, true, false),
            (6, C, 2, false, true),
            (8, G, 2, false, false),
            (10, ASharp, 2, true, false),
            (11, C, 3, false, true),
            (14, F, 2, false, false),
        ];
        for (step, pitch, octave, slide, accent) in line {
            if let Some(cell) = p.blocks[0].note_mut(&bass, step) {
                *cell = Some(NoteEvent { pitch, octave, slide, accent });
            }
        }
        for step in 0..DEFAULT_STEPS_PER_BLOCK {
            let drums = &mut p.blocks[0].drums[step];
            if step % 4 == 0 {
                drums.push(DrumKind::Kick);
            }
            if step % 4 == 2 {
                drums.push(DrumKind::Hat);
            }
            if step == 4 || step == 12 {
                drums.push(DrumKind::Snare);
            }
        }
        p.blocks[0].drums[15].push(DrumKind::Tom);
        p
    }

    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn has_clipboard(&self) -> bool {
        self.clipboard.is_some()
    }

    /// Adds an empty lane for `id` to every block. Returns false if it
    /// already exists.
    pub fn register_track(&mut self, id: TrackId) -> bool {
        if self.tracks.contains(&id) {
            return false;
        }
        for block in &mut self.blocks {
            block.tracks.insert(id.clone(), vec![None; self.steps_per_block]);
        }
        if let Some(clip) = self.clipboard.as_mut() {
            clip.tracks.insert(id.clone(), vec![None; self.steps_per_block]);
        }
        self.tracks.push(id);
        true
    }

    pub fn remove_track(&mut self, id: &TrackId) -> bool {
        let Some(pos) = self.tracks.iter().position(|t| t == id) else {
            return false;
        };
        self.tracks.remove(pos);
        for block in self.blocks.iter_mut().chain(self.clipboard.as_mut()) {
            block.tracks.remove(id);
        }
        true
    }

    /// Applies one edit. Returns whether anything changed; edits that point
    /// outside the pattern are ignored.
    pub fn apply(&mut self, edit: PatternEdit) -> bool {
        match edit {
            PatternEdit::SetNote { block, track, step, pitch, octave } => {
                self.set_note(block, &track, step, pitch, octave)
            }
            PatternEdit::ClearNote { block, track, step } => self
                .cell(block, &track, step)
                .is_some_and(|cell| cell.take().is_some()),
            PatternEdit::ToggleSlide { block, track, step } => self.toggle_note(block, &track, step, |n| {
                n.slide = !n.slide;
            }),
            PatternEdit::ToggleAccent { block, track, step } => self.toggle_note(block, &track, step, |n| {
                n.accent = !n.accent;
            }),
            PatternEdit::ToggleDrum { block, step, kind } => self.toggle_drum(block, step, kind),
            PatternEdit::AddBlock => {
                self.add_block();
                true
            }
            PatternEdit::RemoveBlock(index) => self.remove_block(index),
            PatternEdit::ClearBlock(index) => self.clear_block(index),
            PatternEdit::MoveBlock { block, offset } => self.move_block(block, offset),
            PatternEdit::CopyBlock(index) => self.copy_block(index),
            PatternEdit::PasteBlock { after } => self.paste_block(after).is_some(),
        }
    }

    /// Writes a note, keeping the slide/accent flags of whatever was there.
    pub fn set_note(&mut self, block: usize, track: &TrackId, step: usize, pitch: PitchClass, octave: i32) -> bool {
        let Some(cell) = self.cell(block, track, step) else {
            return false;
        };
        let (slide, accent) = cell.map_or((false, false), |n| (n.slide, n.accent));
        *cell = Some(NoteEvent { pitch, octave, slide, accent });
        true
    }

    pub fn toggle_drum(&mut self, block: usize, step: usize, kind: DrumKind) -> bool {
        let Some(drums) = self.blocks.get_mut(block).and_then(|b| b.drums.get_mut(step)) else {
            return false;
        };
        match drums.iter().position(|&d| d == kind) {
            Some(i) => {
                drums.remove(i);
            }
            None => drums.push(kind),
        }
        true
    }

    /// Appends an empty block and returns its index.
    pub fn add_block(&mut self) -> usize {
        self.blocks.push(Block::empty(self.steps_per_block, &self.tracks));
        self.blocks.len() - 1
    }

    /// The last block cannot be removed.
    pub fn remove_block(&mut self, index: usize) -> bool {
        if self.blocks.len() <= 1 || index >= self.blocks.len() {
            return false;
        }
        self.blocks.remove(index);
        true
    }

    pub fn clear_block(&mut self, index: usize) -> bool {
        let Some(block) = self.blocks.get_mut(index) else {
            return false;
        };
        *block = Block::empty(self.steps_per_block, &self.tracks);
        true
    }

    /// Swaps a block with its neighbour `offset` positions away.
    pub fn move_block(&mut self, index: usize, offset: isize) -> bool {
        let Some(target) = index.checked_add_signed(offset) else {
            return false;
        };
        if index >= self.blocks.len() || target >= self.blocks.len() || target == index {
            return false;
        }
        self.blocks.swap(index, target);
        true
    }

    pub fn copy_block(&mut self, index: usize) -> bool {
        let Some(block) = self.blocks.get(index) else {
            return false;
        };
        self.clipboard = Some(block.clone());
        true
    }

    /// Inserts the clipboard right after `after` and returns the new index.
    pub fn paste_block(&mut self, after: usize) -> Option<usize> {
        let clip = self.clipboard.clone()?;
        let at = after.saturating_add(1).min(self.blocks.len());
        self.blocks.insert(at, clip);
        Some(at)
    }

    fn cell(&mut self, block: usize, track: &TrackId, step: usize) -> Option<&mut Option<NoteEvent>> {
        self.blocks.get_mut(block)?.note_mut(track, step)
    }

    fn toggle_note(&mut self, block: usize, track: &TrackId, step: usize, f: impl FnOnce(&mut NoteEvent)) -> bool {
        match self.cell(block, track, step) {
            Some(Some(note)) => {
                f(note);
                true
            }
            _ => false,
        }
    }
}

impl PatternSource for Pattern {
    fn steps_per_block(&self) -> usize {
        self.steps_per_block
    }

    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn step_data(&self, step: usize, block: usize) -> Option<StepData> {
        let b = self.blocks.get(block)?;
        if step >= self.steps_per_block {
            return None;
        }
        let notes = b
            .tracks
            .iter()
            .filter_map(|(id, lane)| lane[step].map(|n| (id.clone(), n)))
            .collect();
        Some(StepData { drums: b.drums[step].clone(), notes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bass1() -> TrackId {
        TrackId::bass(1)
    }

    fn pattern() -> Pattern {
        let mut p = Pattern::default();
        p.register_track(bass1());
        p
    }

    #[test]
    fn empty_and_out_of_range_steps() {
        let p = pattern();
        assert_eq!(p.step_data(0, 0), Some(StepData::default()));
        assert_eq!(p.step_data(16, 0), None);
        assert_eq!(p.step_data(0, 1), None);
    }

    #[test]
    fn set_note_keeps_flags() {
        let mut p = pattern();
        assert!(p.set_note(0, &bass1(), 3, PitchClass::C, 3));
        assert!(p.apply(PatternEdit::ToggleAccent { block: 0, track: bass1(), step: 3 }));
        assert!(p.set_note(0, &bass1(), 3, PitchClass::E, 2));
        let note = p.block(0).unwrap().note(&bass1(), 3).unwrap();
        assert_eq!(note, NoteEvent::new(PitchClass::E, 2).accent());
    }

    #[test]
    fn toggles_need_a_note() {
        let mut p = pattern();
        assert!(!p.apply(PatternEdit::ToggleSlide { block: 0, track: bass1(), step: 0 }));
        assert!(!p.set_note(0, &TrackId::bass(9), 0, PitchClass::C, 3));
        assert!(!p.apply(PatternEdit::ClearNote { block: 0, track: bass1(), step: 0 }));
    }

    #[test]
    fn step_data_lists_drums_and_notes() {
        let mut p = pattern();
        p.register_track(TrackId::bass(2));
        p.set_note(0, &TrackId::bass(2), 4, PitchClass::G, 2);
        p.set_note(0, &bass1(), 4, PitchClass::C, 3);
        p.toggle_drum(0, 4, DrumKind::Kick);
        p.toggle_drum(0, 4, DrumKind::Hat);
        p.toggle_drum(0, 4, DrumKind::Kick);
        let data = p.step_data(4, 0).unwrap();
        assert_eq!(data.drums, vec![DrumKind::Hat]);
        let ids: Vec<_> = data.notes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["bass-1", "bass-2"]);
    }

    #[test]
    fn last_block_stays() {
        let mut p = pattern();
        assert!(!p.remove_block(0));
        let i = p.add_block();
        assert_eq!(i, 1);
        assert!(p.remove_block(0));
        assert_eq!(p.block_count(), 1);
    }

    #[test]
    fn copy_paste_inserts_after() {
        let mut p = pattern();
        p.set_note(0, &bass1(), 0, PitchClass::A, 2);
        p.add_block();
        assert_eq!(p.paste_block(0), None);
        assert!(p.copy_block(0));
        assert_eq!(p.paste_block(0), Some(1));
        assert_eq!(p.block_count(), 3);
        assert_eq!(p.block(1), p.block(0));
        assert!(p.block(2).unwrap().is_empty());
        // clipboard is a copy, not a reference
        p.apply(PatternEdit::ClearNote { block: 0, track: bass1(), step: 0 });
        assert!(p.block(1).unwrap().note(&bass1(), 0).is_some());
    }

    #[test]
    fn move_block_bounds() {
        let mut p = pattern();
        p.add_block();
        p.set_note(1, &bass1(), 0, PitchClass::D, 2);
        assert!(!p.move_block(0, -1));
        assert!(!p.move_block(1, 1));
        assert!(p.move_block(1, -1));
        assert!(p.block(0).unwrap().note(&bass1(), 0).is_some());
    }

    #[test]
    fn tracks_come_and_go() {
        let mut p = pattern();
        assert!(!p.register_track(bass1()));
        p.add_block();
        p.register_track(TrackId::bass(2));
        assert!(p.set_note(1, &TrackId::bass(2), 0, PitchClass::C, 2));
        assert!(p.remove_track(&TrackId::bass(2)));
        assert!(p.step_data(0, 1).unwrap().notes.is_empty());
        assert!(!p.remove_track(&TrackId::bass(2)));
    }

    #[test]
    fn clear_block_empties_it() {
        let mut p = Pattern::demo();
        assert!(!p.block(0).unwrap().is_empty());
        assert!(p.clear_block(0));
        assert!(p.block(0).unwrap().is_empty());
        assert_eq!(p.tracks(), [bass1()]);
    }

    #[test]
    fn demo_starts_on_an_accent() {
        let p = Pattern::demo();
        let data = p.step_data(0, 0).unwrap();
        assert_eq!(data.drums, vec![DrumKind::Kick]);
        assert!(data.notes[0].1.accent);
    }
}
