use basalt::shared::DisplayState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use super::grid::draw_slice_grid;
use super::mode::{Focus, TuiState};

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // status
            Constraint::Length(8), // slice grid
            Constraint::Min(3),    // log
            Constraint::Length(3), // command line
        ])
        .split(area);

    draw_status(frame, sections[0], state, ts);
    draw_slice_grid(frame, sections[1], state);
    draw_log(frame, sections[2], ts);
    draw_console(frame, sections[3], ts);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::LightMagenta)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let transport = if state.running {
        Span::styled("RUN ", Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD))
    } else if state.loaded {
        Span::styled("STOP", Style::default().fg(Color::Red))
    } else {
        Span::styled("----", Style::default().fg(Color::DarkGray))
    };
    let mode = if state.frozen {
        Span::styled(" HOLD ", Style::default().fg(Color::Black).bg(Color::LightCyan))
    } else {
        Span::raw(format!(" {} ", state.mode.label()))
    };
    let line = Line::from(vec![
        transport,
        Span::raw(format!("  {:>5.1} bpm  swing {:.2}  ", state.bpm, state.swing)),
        mode,
        Span::raw(format!("  pattern {}  step {}", state.pattern, state.step)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" basalt ")
        .border_style(focus_style(ts.focus == Focus::Monitor));
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_log(frame: &mut Frame, area: Rect, ts: &TuiState) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = ts
        .log
        .iter()
        .skip(ts.log.len().saturating_sub(visible))
        .map(|l| Line::from(l.as_str()))
        .collect();
    let block = Block::default().borders(Borders::ALL).title(" log ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_console(frame: &mut Frame, area: Rect, ts: &TuiState) {
    let focused = ts.focus == Focus::Console;
    let cursor = if focused { "_" } else { "" };
    let text = Line::from(vec![
        Span::styled("> ", focus_style(focused)),
        Span::raw(format!("{}{cursor}", ts.input)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(focused));
    frame.render_widget(Paragraph::new(text).block(block), area);
}
