//! Conversation transcript: user queries, assistant answers with tabbed
//! Answer / Records / Chart views.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::{App, AssistantTurn, ChartState, Tab, TurnView};
use crate::markdown::render_markdown;

use super::{chart, results, COLOR_DIM, COLOR_QUERY};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(super::COLOR_BORDER))
        .title("Sift");

    let lines = if app.loading_thread {
        vec![Line::from(Span::styled(
            "Loading conversation...",
            Style::default().fg(COLOR_DIM),
        ))]
    } else if app.turns.is_empty() {
        empty_state(app)
    } else {
        transcript_lines(app)
    };

    // Stick to the bottom; scroll_offset counts lines scrolled back up.
    let inner_height = area.height.saturating_sub(2) as usize;
    let bottom = lines.len().saturating_sub(inner_height);
    let scroll = bottom.saturating_sub(app.scroll_offset as usize);

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));
    frame.render_widget(paragraph, area);
}

fn empty_state(app: &App) -> Vec<Line<'static>> {
    vec![
        Line::default(),
        Line::from(Span::styled(
            "Sift",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from("Ask questions about your data in natural language."),
        Line::default(),
        Line::from(Span::styled(
            if app.active_thread_id.is_some() {
                "Type your message below to start a conversation."
            } else {
                "Type a question to start a new conversation."
            },
            Style::default().fg(COLOR_DIM),
        )),
    ]
}

fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let last_assistant = app.last_assistant_index();
    let mut lines = Vec::new();
    for (index, turn) in app.turns.iter().enumerate() {
        match turn {
            TurnView::User { query } => {
                lines.push(Line::default());
                lines.push(Line::from(vec![
                    Span::styled("❯ ", Style::default().fg(COLOR_QUERY)),
                    Span::styled(
                        query.clone(),
                        Style::default()
                            .fg(COLOR_QUERY)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]));
            }
            TurnView::Assistant(turn) => {
                lines.push(Line::default());
                assistant_lines(&mut lines, turn, Some(index) == last_assistant);
            }
        }
    }
    lines
}

fn assistant_lines(lines: &mut Vec<Line<'static>>, turn: &AssistantTurn, is_last: bool) {
    // Tab bar only where it is actionable (the last answer)
    if is_last && (!turn.query_results.is_empty() || turn.show_graph) {
        lines.push(tab_bar(turn.tab));
    }

    match effective_tab(turn) {
        Tab::Answer => lines.extend(render_markdown(&turn.text)),
        Tab::Records => lines.extend(results::rows_to_lines(&turn.query_results)),
        Tab::Chart => lines.extend(chart::chart_lines(turn)),
    }

    if turn.usage.total_tokens > 0 {
        lines.push(Line::from(Span::styled(
            format!(
                "tokens: {} in / {} out · latency: {}ms",
                turn.usage.input, turn.usage.output, turn.usage.latency
            ),
            Style::default().fg(COLOR_DIM),
        )));
    }
}

/// Turns without rows have nothing behind the Records/Chart tabs.
fn effective_tab(turn: &AssistantTurn) -> Tab {
    match turn.tab {
        Tab::Records | Tab::Chart if turn.query_results.is_empty() => Tab::Answer,
        tab => tab,
    }
}

fn tab_bar(active: Tab) -> Line<'static> {
    let tab = |label: &str, this: Tab| {
        if this == active {
            Span::styled(
                format!("[{label}]"),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!(" {label} "), Style::default().fg(COLOR_DIM))
        }
    };
    Line::from(vec![
        tab("Answer", Tab::Answer),
        Span::raw(" "),
        tab("Records", Tab::Records),
        Span::raw(" "),
        tab("Chart", Tab::Chart),
        Span::styled("  (Ctrl+T to switch)", Style::default().fg(COLOR_DIM)),
    ])
}
