use basalt::shared::DisplayState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

const COLS: usize = 8;

// one cell per slice, the slice that played last is lit
pub fn draw_slice_grid(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let count = state.slice_count;
    if count == 0 {
        return;
    }
    let rows = count.div_ceil(COLS);
    let row_constraints = vec![Constraint::Ratio(1, rows as u32); rows];
    let col_constraints = vec![Constraint::Ratio(1, COLS as u32); COLS];

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(area);

    for (row_idx, row_area) in row_areas.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(col_constraints.clone())
            .split(*row_area);

        for (col_idx, cell_area) in cols.iter().enumerate() {
            let slice = row_idx * COLS + col_idx;
            if slice >= count {
                break;
            }
            let lit = state.running && state.last_slice == Some(slice);
            let style = if lit && state.frozen {
                Style::default().fg(Color::Black).bg(Color::LightCyan)
            } else if lit {
                Style::default().fg(Color::Black).bg(Color::LightMagenta).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let label = Paragraph::new(Span::styled(format!("{slice:>2}"), style))
                .block(Block::default().borders(Borders::ALL).border_style(style))
                .style(style);
            frame.render_widget(label, *cell_area);
        }
    }
}
