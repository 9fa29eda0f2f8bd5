//! Query-result rows rendered as an aligned text table.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::export::cell_text;
use crate::models::QueryRow;

/// Cap on rendered rows; large result sets get elided with a footer.
const MAX_ROWS: usize = 50;
/// Cap on one column's width.
const MAX_COLUMN_WIDTH: usize = 28;

/// Render rows as aligned text lines with a header. Column order follows
/// the first row's keys.
pub fn rows_to_lines(rows: &[QueryRow]) -> Vec<Line<'static>> {
    let headers: Vec<String> = match rows.first() {
        Some(first) => first.keys().cloned().collect(),
        None => {
            return vec![Line::from(Span::styled(
                "No records.",
                Style::default().fg(Color::DarkGray),
            ))]
        }
    };

    let shown = &rows[..rows.len().min(MAX_ROWS)];

    // Column widths: widest of header and cells, capped
    let widths: Vec<usize> = headers
        .iter()
        .map(|header| {
            let cell_max = shown
                .iter()
                .map(|row| cell_text(row, header).width())
                .max()
                .unwrap_or(0);
            header.width().max(cell_max).min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let mut lines = Vec::new();
    lines.push(Line::from(Span::styled(
        format_row(&headers, &widths),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─"),
        Style::default().fg(Color::DarkGray),
    )));

    for row in shown {
        let cells: Vec<String> = headers.iter().map(|h| cell_text(row, h)).collect();
        lines.push(Line::from(format_row(&cells, &widths)));
    }

    if rows.len() > MAX_ROWS {
        lines.push(Line::from(Span::styled(
            format!("… {} more rows", rows.len() - MAX_ROWS),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let mut text = cell.clone();
            if text.width() > *width {
                text = truncate_to_width(&text, width.saturating_sub(1));
                text.push('…');
            }
            format!("{text:<width$}", width = width)
        })
        .collect::<Vec<_>>()
        .join(" │ ")
}

fn truncate_to_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: serde_json::Value) -> Vec<QueryRow> {
        crate::models::parse_query_results(Some(&value))
    }

    fn text_of(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn header_and_rows_align() {
        let lines = rows_to_lines(&rows(json!([
            {"region": "West", "revenue": 100},
            {"region": "NorthEast", "revenue": 8}
        ])));
        let texts = text_of(&lines);
        assert!(texts[0].contains("region"));
        assert!(texts[0].contains("revenue"));
        assert!(texts[2].contains("West"));
        assert!(texts[3].contains("NorthEast"));
        // Separator between header and data
        assert!(texts[1].contains('┼'));
    }

    #[test]
    fn empty_rows_message() {
        let lines = rows_to_lines(&[]);
        assert_eq!(text_of(&lines), vec!["No records."]);
    }

    #[test]
    fn long_result_sets_are_elided() {
        let many: Vec<serde_json::Value> = (0..60).map(|i| json!({"n": i})).collect();
        let lines = rows_to_lines(&rows(serde_json::Value::Array(many)));
        let texts = text_of(&lines);
        assert!(texts.last().unwrap().contains("10 more rows"));
    }

    #[test]
    fn wide_cells_truncate() {
        let lines = rows_to_lines(&rows(json!([
            {"note": "a very very very long cell value that exceeds the column cap"}
        ])));
        let texts = text_of(&lines);
        assert!(texts[2].contains('…'));
    }
}
