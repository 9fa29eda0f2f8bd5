//! Model picker popup.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::app::App;

use super::{centered_rect, COLOR_DIM};

pub fn render(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, (app.models.len() as u16 + 4).min(20), frame.area());
    frame.render_widget(Clear, area);

    let mut lines = Vec::new();
    let inner_height = area.height.saturating_sub(2) as usize;
    let first = app
        .model_picker_index
        .saturating_sub(inner_height.saturating_sub(1));
    for (index, model) in app.models.iter().enumerate().skip(first) {
        let selected = index == app.model_picker_index;
        let current = model.id == app.selected_model;
        let marker = if selected { "▸ " } else { "  " };
        let mut style = Style::default();
        if selected {
            style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        let name = if model.name.is_empty() {
            model.id.clone()
        } else {
            model.name.clone()
        };
        let mut spans = vec![
            Span::styled(marker.to_string(), style),
            Span::styled(name, style),
        ];
        if current {
            spans.push(Span::styled(" (current)", Style::default().fg(COLOR_DIM)));
        }
        lines.push(Line::from(spans));
    }

    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title("Select model (Enter to confirm, Esc to close)"),
    );
    frame.render_widget(popup, area);
}
