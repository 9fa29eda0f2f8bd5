//! Thread sidebar: search, date-grouped thread list, selection markers.

use chrono::{DateTime, Datelike, Local, Utc};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{App, Focus};
use crate::models::ThreadSummary;

use super::{focus_is, pane_border, COLOR_DIM};

/// Human date-group label, matching how the sidebar buckets threads.
pub fn group_label(timestamp: Option<DateTime<Utc>>) -> String {
    let timestamp = match timestamp {
        Some(ts) => ts.with_timezone(&Local),
        None => return "Earlier".to_string(),
    };
    let today = Local::now().date_naive();
    let date = timestamp.date_naive();
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        format!(
            "{} {}, {}",
            month_name(date.month()),
            date.day(),
            date.year()
        )
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let focused = focus_is(app, Focus::Sidebar);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(pane_border(focused))
        .title("Conversations");

    let mut lines: Vec<Line> = Vec::new();

    // Search box
    let search = if app.searching {
        Line::from(vec![
            Span::styled("/ ", Style::default().fg(Color::Yellow)),
            Span::raw(app.thread_search.clone()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ])
    } else if app.thread_search.is_empty() {
        Line::from(Span::styled(
            "/ search chats",
            Style::default().fg(COLOR_DIM),
        ))
    } else {
        Line::from(vec![
            Span::styled("/ ", Style::default().fg(COLOR_DIM)),
            Span::raw(app.thread_search.clone()),
        ])
    };
    lines.push(search);
    lines.push(Line::default());

    if app.loading_threads {
        lines.push(Line::from(Span::styled(
            "Loading threads...",
            Style::default().fg(COLOR_DIM),
        )));
    } else {
        let visible = app.visible_threads();
        if visible.is_empty() {
            lines.push(Line::from(Span::styled(
                "No conversations yet.",
                Style::default().fg(COLOR_DIM),
            )));
            lines.push(Line::from(Span::styled(
                "Press n to start one.",
                Style::default().fg(COLOR_DIM),
            )));
        } else {
            let mut current_group: Option<String> = None;
            for (index, thread) in visible.iter().enumerate() {
                let label = group_label(thread.timestamp());
                if current_group.as_deref() != Some(label.as_str()) {
                    lines.push(Line::from(Span::styled(
                        label.clone(),
                        Style::default()
                            .fg(COLOR_DIM)
                            .add_modifier(Modifier::BOLD),
                    )));
                    current_group = Some(label);
                }
                lines.push(thread_line(app, thread, index));
            }
        }
    }

    // Keep the selected entry in view with a crude scroll
    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = selected_line_offset(&lines, app).saturating_sub(inner_height.saturating_sub(1));

    let list = Paragraph::new(lines)
        .block(block)
        .scroll((scroll as u16, 0));
    frame.render_widget(list, area);
}

fn thread_line(app: &App, thread: &ThreadSummary, index: usize) -> Line<'static> {
    let selected = index == app.selected_thread;
    let active = app.active_thread_id.as_deref() == Some(thread.thread_id.as_str());

    let marker = if selected { "▸ " } else { "  " };
    let mut style = Style::default();
    if active {
        style = style.add_modifier(Modifier::BOLD);
    }
    if selected {
        style = style.fg(Color::Cyan);
    }

    let mut title = thread.thread_title.clone();
    const WIDTH: usize = 26;
    if title.chars().count() > WIDTH {
        title = title.chars().take(WIDTH - 1).collect::<String>() + "…";
    }
    Line::from(vec![
        Span::styled(marker.to_string(), style),
        Span::styled(title, style),
    ])
}

/// Line index of the selected thread inside the rendered list.
fn selected_line_offset(lines: &[Line], app: &App) -> usize {
    // Selected entry is marked with the cursor glyph
    lines
        .iter()
        .position(|line| {
            line.spans
                .first()
                .map(|span| span.content.starts_with('▸'))
                .unwrap_or(false)
        })
        .unwrap_or(0)
        .max(app.selected_thread)
}
