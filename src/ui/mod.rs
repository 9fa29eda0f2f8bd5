//! UI rendering.
//!
//! Pure functions from [`App`] state to ratatui widgets. Layout:
//! a thread sidebar on the left; conversation transcript, thinking panel
//! (while streaming), error banner, input line, and status bar on the
//! right. The model picker renders as a centered popup on top.

mod chart;
mod conversation;
mod input;
mod model_picker;
mod results;
mod sidebar;
mod thoughts;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{App, Focus};

pub use results::rows_to_lines;

/// Border color of the focused pane.
pub const COLOR_FOCUS: Color = Color::Cyan;
/// Border color of unfocused panes.
pub const COLOR_BORDER: Color = Color::DarkGray;
/// Dim text for hints and metadata.
pub const COLOR_DIM: Color = Color::DarkGray;
/// User query bubbles.
pub const COLOR_QUERY: Color = Color::LightBlue;

pub fn render(frame: &mut Frame, app: &mut App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(40)])
        .split(frame.area());

    sidebar::render(frame, app, columns[0]);
    render_main(frame, app, columns[1]);

    if app.model_picker_open {
        model_picker::render(frame, app);
    }
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
    let mut constraints = vec![Constraint::Min(5)];
    if app.show_thoughts {
        constraints.push(Constraint::Length(8));
    }
    if app.error_message.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(3));
    constraints.push(Constraint::Length(1));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut index = 0;
    conversation::render(frame, app, chunks[index]);
    index += 1;

    if app.show_thoughts {
        thoughts::render(frame, app, chunks[index]);
        index += 1;
    }

    if let Some(message) = &app.error_message {
        let banner = Paragraph::new(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::White).bg(Color::Red),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
        frame.render_widget(banner, chunks[index]);
        index += 1;
    }

    input::render(frame, app, chunks[index]);
    index += 1;

    render_status_bar(frame, app, chunks[index]);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let model = app
        .models
        .iter()
        .find(|model| model.id == app.selected_model)
        .map(|model| model.name.clone())
        .unwrap_or_else(|| app.selected_model.clone());

    let text = match &app.status_message {
        Some(message) => message.clone(),
        None => format!(
            "model: {model}  ·  Tab focus · Ctrl+P model · Ctrl+T view · Ctrl+R regen · Ctrl+E export · Esc cancel · Ctrl+C quit"
        ),
    };
    let bar = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(COLOR_DIM),
    )));
    frame.render_widget(bar, area);
}

/// Border style helper: highlighted when `focused`.
pub(crate) fn pane_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(COLOR_FOCUS)
    } else {
        Style::default().fg(COLOR_BORDER)
    }
}

/// Centered popup rect of the given size, clamped to `area`.
pub(crate) fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

pub(crate) fn focus_is(app: &App, focus: Focus) -> bool {
    app.focus == focus
}
