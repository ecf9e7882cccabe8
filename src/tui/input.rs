use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::shared::InputEvent;

// poll the terminal for one key press and resolve it to input events
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code).into_iter().collect());
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode) -> Option<InputEvent> {
    let event = match code {
        KeyCode::Esc => InputEvent::Quit,
        KeyCode::Char(' ') => InputEvent::PlayPress,
        KeyCode::Tab => InputEvent::NextLane,
        KeyCode::Enter => InputEvent::WriteNote,
        KeyCode::Backspace | KeyCode::Delete => InputEvent::ClearNote,

        // the 4x4 grid selects a step
        KeyCode::Char(c) if char_to_step(c).is_some() => InputEvent::SelectStep(char_to_step(c)?),

        KeyCode::Char(',') => InputEvent::Pitch(-1),
        KeyCode::Char('.') => InputEvent::Pitch(1),
        KeyCode::Char('<') => InputEvent::Octave(-1),
        KeyCode::Char('>') => InputEvent::Octave(1),
        KeyCode::Char('u') => InputEvent::ToggleSlide,
        KeyCode::Char('i') => InputEvent::ToggleAccent,
        KeyCode::Char(c @ '5'..='8') => InputEvent::ToggleDrum(c as u8 - b'5'),

        // blocks
        KeyCode::Char('h') | KeyCode::Left => InputEvent::EditBlock(-1),
        KeyCode::Char('l') | KeyCode::Right => InputEvent::EditBlock(1),
        KeyCode::Char('{') => InputEvent::MoveBlock(-1),
        KeyCode::Char('}') => InputEvent::MoveBlock(1),
        KeyCode::Char('+') => InputEvent::AddBlock,
        KeyCode::Char('_') => InputEvent::RemoveBlock,
        KeyCode::Char('X') => InputEvent::ClearBlock,
        KeyCode::Char('C') => InputEvent::CopyBlock,
        KeyCode::Char('V') => InputEvent::PasteBlock,
        KeyCode::Char('F') => InputEvent::ToggleFollow,

        KeyCode::Char('A') => InputEvent::AddVoice,
        KeyCode::Char('R') => InputEvent::RemoveVoice,
        KeyCode::Char('b') => InputEvent::AdjustBpm(-1.0),
        KeyCode::Char('B') => InputEvent::AdjustBpm(1.0),

        // knobs for the current param page
        KeyCode::Char('p') => InputEvent::NextParamPage,
        KeyCode::Char('[') => InputEvent::KnobTurnA(-1.0),
        KeyCode::Char(']') => InputEvent::KnobTurnA(1.0),
        KeyCode::Char('-') => InputEvent::KnobTurnB(-1.0),
        KeyCode::Char('=') => InputEvent::KnobTurnB(1.0),

        KeyCode::Char('W') => InputEvent::Render,
        _ => return None,
    };
    Some(event)
}

// convert grid char to step index
fn char_to_step(c: char) -> Option<u8> {
    let idx = match c {
        '1' => 0, '2' => 1, '3' => 2, '4' => 3,
        'q' => 4, 'w' => 5, 'e' => 6, 'r' => 7,
        'a' => 8, 's' => 9, 'd' => 10, 'f' => 11,
        'z' => 12, 'x' => 13, 'c' => 14, 'v' => 15,
        _ => return None,
    };
    Some(idx)
}
