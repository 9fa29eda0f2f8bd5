//! Terminal chart rendering.
//!
//! The backend designs charts for a browser charting library; a terminal
//! can honor the numeric series and labels, not the styling. Bar-like specs
//! render as horizontal bars; anything else falls back to a labeled value
//! list. A spec the renderer cannot read at all degrades to placeholder
//! text.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use serde_json::Value;

use crate::app::{AssistantTurn, ChartState};
use crate::models::ChartSpec;

use super::COLOR_DIM;

const BAR_WIDTH: usize = 30;

/// Lines for the Chart tab of one assistant turn.
pub fn chart_lines(turn: &AssistantTurn) -> Vec<Line<'static>> {
    match &turn.chart {
        ChartState::Ready(spec) => spec_lines(spec),
        ChartState::Loading => vec![Line::from(Span::styled(
            "Preparing chart...",
            Style::default().fg(COLOR_DIM),
        ))],
        ChartState::NotRequested => vec![Line::from(Span::styled(
            if turn.query_results.is_empty() {
                "No chart data available for this response."
            } else {
                "Open the Chart tab again to generate a visualization."
            },
            Style::default().fg(COLOR_DIM),
        ))],
        ChartState::Unavailable => vec![Line::from(Span::styled(
            "No chart could be generated for this data.",
            Style::default().fg(COLOR_DIM),
        ))],
    }
}

fn spec_lines(spec: &ChartSpec) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if !spec.caption.is_empty() {
        lines.push(Line::from(Span::styled(
            spec.caption.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::default());
    }

    let points = data_points(spec);
    if points.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("({} chart; no plottable series)", spec.chart_type),
            Style::default().fg(COLOR_DIM),
        )));
        return lines;
    }

    let max = points
        .iter()
        .map(|(_, value)| *value)
        .fold(f64::MIN, f64::max)
        .max(f64::EPSILON);
    let label_width = points
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0)
        .min(20);

    for (label, value) in &points {
        let filled = if *value <= 0.0 {
            0
        } else {
            ((value / max) * BAR_WIDTH as f64).round() as usize
        };
        let mut label = label.clone();
        if label.chars().count() > label_width {
            label = label.chars().take(label_width).collect();
        }
        lines.push(Line::from(vec![
            Span::raw(format!("{label:>label_width$} ")),
            Span::styled("█".repeat(filled), Style::default().fg(Color::Cyan)),
            Span::raw(format!(" {}", format_value(*value))),
        ]));
    }
    lines
}

/// Extract (label, value) pairs from the spec's series/options, tolerating
/// the common shapes a browser charting library accepts.
fn data_points(spec: &ChartSpec) -> Vec<(String, f64)> {
    let config = &spec.chart_configuration;

    // Shape A: series = [{name, data: [n, ...]}, ...] with category labels
    // under options.xaxis.categories
    if let Value::Array(series) = &config.series {
        if let Some(Value::Object(first)) = series.first() {
            if let Some(Value::Array(data)) = first.get("data") {
                let categories = config
                    .options
                    .pointer("/xaxis/categories")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                return data
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| {
                        let (label, value) = match item {
                            // Data point object {x, y}
                            Value::Object(point) => (
                                point.get("x").map(text_of).unwrap_or_else(|| format!("#{}", i + 1)),
                                point.get("y").and_then(Value::as_f64)?,
                            ),
                            other => (
                                categories
                                    .get(i)
                                    .map(text_of)
                                    .unwrap_or_else(|| format!("#{}", i + 1)),
                                other.as_f64()?,
                            ),
                        };
                        Some((label, value))
                    })
                    .collect();
            }
        }

        // Shape B (pie): series = [n, ...] with options.labels
        if series.iter().all(Value::is_number) && !series.is_empty() {
            let labels = config
                .options
                .get("labels")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            return series
                .iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    let label = labels
                        .get(i)
                        .map(text_of)
                        .unwrap_or_else(|| format!("#{}", i + 1));
                    Some((label, item.as_f64()?))
                })
                .collect();
        }
    }

    Vec::new()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_value(value: f64) -> String {
    if (value.fract()).abs() < f64::EPSILON {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}
