use crate::shared::DisplayState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use super::grid::draw_step_grid;

const HELP: [&str; 6] = [
    "SPC play",
    "TAB lane",
    "ENT/BKSP note",
    ", . pitch",
    "< > oct",
    "u i slide/acc",
];

const HELP_BLOCKS: [&str; 6] = [
    "5-8 drums",
    "h l block",
    "{ } move",
    "+ _ add/del",
    "C V copy/paste",
    "W render",
];

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // lcd screen
            Constraint::Length(3), // param page + knobs row
            Constraint::Min(12),   // step grid + key hints
        ])
        .split(area);

    draw_screen(frame, sections[0], state);
    draw_mode_row(frame, sections[1], state, blink_on);
    draw_keypad(frame, sections[2], state, blink_on);
}

fn draw_screen(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let playing_block = match state.playing_block {
        Some(b) => format!("{}", b + 1),
        None => String::from("-"),
    };
    let lines = vec![
        Line::from(vec![
            Span::styled(format!(" {} ", state.lane_label), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("  {:.0} BPM", state.bpm)),
            Span::raw(format!("  NOTE {}{}", state.cursor_pitch, state.octave)),
        ]),
        Line::from(format!(
            " BLOCK {}/{}  PLAYING {}  FOLLOW {}",
            state.editing_block + 1,
            state.block_count,
            playing_block,
            if state.follow { "ON" } else { "OFF" },
        )),
        Line::from(Span::styled(format!(" {}", state.display_text), Style::default().fg(Color::LightCyan))),
    ];
    let screen = Paragraph::new(lines)
        .style(Style::default().fg(Color::White).bg(Color::Black))
        .block(Block::default().borders(Borders::ALL).title("neurodark"));
    frame.render_widget(screen, area);
}

fn draw_mode_row(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(12), Constraint::Min(10), Constraint::Min(10)])
        .split(area);

    let (label, style) = if state.playing {
        let lit = state.beat && blink_on;
        ("PLAY", Style::default().fg(if lit { Color::LightGreen } else { Color::Green }))
    } else {
        ("STOP", Style::default().fg(Color::DarkGray))
    };
    let transport = Paragraph::new(label).style(style).block(Block::default().borders(Borders::ALL));
    frame.render_widget(transport, cols[0]);

    let page = format!("{:?}", state.param_page).to_uppercase();
    let knob_a = Paragraph::new(format!("[ ] {} {}", state.knob_a_label, state.knob_a_value))
        .block(Block::default().borders(Borders::ALL).title(page));
    frame.render_widget(knob_a, cols[1]);
    let knob_b = Paragraph::new(format!("- = {} {}", state.knob_b_label, state.knob_b_value))
        .block(Block::default().borders(Borders::ALL).title("p page"));
    frame.render_widget(knob_b, cols[2]);
}

fn draw_keypad(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(18)])
        .split(area);

    draw_step_grid(frame, cols[0], &state.leds, &state.step_text, state.selected_step, blink_on);

    let hints: Vec<Line> = HELP
        .iter()
        .chain(HELP_BLOCKS.iter())
        .map(|h| Line::from(*h))
        .chain(["X clear", "F follow", "A R voice", "b B bpm", "ESC quit"].map(Line::from))
        .collect();
    let side = Paragraph::new(hints)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(side, cols[1]);
}
