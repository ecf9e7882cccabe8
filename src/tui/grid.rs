use crate::shared::{LedState, STEPS_SHOWN};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

const COLS: usize = 4;
const ROWS: usize = 4;

const PAD_LABELS: [&str; STEPS_SHOWN] = [
    "1", "2", "3", "4",
    "Q", "W", "E", "R",
    "A", "S", "D", "F",
    "Z", "X", "C", "V",
];

// one pad per step, lit by its led state, showing the step's contents
pub fn draw_step_grid(
    frame: &mut Frame,
    area: Rect,
    leds: &[LedState; STEPS_SHOWN],
    text: &[String; STEPS_SHOWN],
    selected: usize,
    blink_on: bool,
) {
    let row_constraints = [Constraint::Ratio(1, ROWS as u32); ROWS];
    let col_constraints = [Constraint::Ratio(1, COLS as u32); COLS];

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(area);

    for (row_idx, row_area) in rows.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(col_constraints)
            .split(*row_area);

        for (col_idx, cell_area) in cols.iter().enumerate() {
            let step = row_idx * COLS + col_idx;
            let style = pad_style(leds[step], blink_on);
            let border = if step == selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(PAD_LABELS[step]);
            let pad = Paragraph::new(text[step].as_str())
                .alignment(Alignment::Center)
                .style(style)
                .block(block);
            frame.render_widget(pad, *cell_area);
        }
    }
}

fn pad_style(led: LedState, blink_on: bool) -> Style {
    match led {
        LedState::Off => Style::default().fg(Color::Gray),
        LedState::OnMedium => Style::default().fg(Color::White).bg(Color::Magenta),
        LedState::OnHigh => Style::default().fg(Color::Black).bg(Color::LightMagenta).add_modifier(Modifier::BOLD),
        LedState::Blink if blink_on => Style::default().fg(Color::Black).bg(Color::LightGreen),
        LedState::Blink => Style::default().fg(Color::Gray).bg(Color::Green),
    }
}
