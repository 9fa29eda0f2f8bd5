//! Query input line.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{App, Focus};

use super::{focus_is, pane_border, COLOR_DIM};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let focused = focus_is(app, Focus::Input);
    let title = if app.loading {
        "Waiting for answer... (Esc to cancel)"
    } else {
        "Type your question (Enter to send, /tools lists tools)"
    };

    let mut spans = Vec::new();
    if app.input.is_empty() && !focused {
        spans.push(Span::styled(
            "Type your question...",
            Style::default().fg(COLOR_DIM),
        ));
    } else {
        // Show the tail when the input is wider than the pane
        let inner_width = area.width.saturating_sub(3) as usize;
        let visible: String = if app.input.chars().count() > inner_width {
            app.input
                .chars()
                .skip(app.input.chars().count() - inner_width)
                .collect()
        } else {
            app.input.clone()
        };
        spans.push(Span::raw(visible));
        if focused && !app.loading {
            spans.push(Span::styled("█", Style::default().fg(Color::Cyan)));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(pane_border(focused))
            .title(title),
    );
    frame.render_widget(paragraph, area);
}
