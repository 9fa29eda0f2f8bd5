//! Thinking trace panel, shown while a session is streaming.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::App;
use crate::stream::{ThinkingEntry, ThinkingKind};

/// Concatenate the trace the way the thoughts panel shows it: thinking
/// chunks run together, tool invocations stand out inline.
pub fn thoughts_text(thoughts: &[ThinkingEntry]) -> String {
    let mut text = String::new();
    for entry in thoughts {
        match entry.kind {
            ThinkingKind::Thinking => text.push_str(&entry.content),
            ThinkingKind::ToolUse => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&format!("⚙ using tool: {}\n", entry.content));
            }
        }
    }
    text
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title("Thinking...");

    let text = thoughts_text(&app.thoughts);
    let line_count = text.lines().count();

    // Autoscroll: keep the newest thinking in view
    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = line_count.saturating_sub(inner_height) as u16;

    let paragraph = Paragraph::new(
        text.lines()
            .map(|line| {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::DarkGray),
                ))
            })
            .collect::<Vec<_>>(),
    )
    .block(block)
    .wrap(Wrap { trim: false })
    .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}
