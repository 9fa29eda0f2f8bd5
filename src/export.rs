//! Conversation export.
//!
//! Writes one human/assistant exchange to a Markdown document: the query,
//! the answer, the query-result table, and the chart caption when one was
//! generated. The terminal-native counterpart of a PDF export.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::models::QueryRow;

/// Everything that goes into one exported document.
#[derive(Debug, Clone, Default)]
pub struct ExportData<'a> {
    pub query: &'a str,
    pub answer: &'a str,
    pub query_results: &'a [QueryRow],
    pub chart_caption: Option<&'a str>,
}

/// Write the document into `dir`, returning the path written.
pub fn export_turn(data: &ExportData, dir: &Path) -> io::Result<PathBuf> {
    let filename = format!(
        "sift-conversation-{}.md",
        Local::now().format("%Y%m%d-%H%M%S")
    );
    let path = dir.join(filename);
    std::fs::write(&path, render_document(data))?;
    tracing::info!(path = %path.display(), "exported conversation turn");
    Ok(path)
}

/// Render the export as a Markdown string.
pub fn render_document(data: &ExportData) -> String {
    let mut doc = String::new();
    doc.push_str("# Sift Conversation Export\n\n");
    doc.push_str(&format!(
        "Generated on: {}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    doc.push_str("## User Query\n\n");
    doc.push_str(data.query);
    doc.push_str("\n\n## Answer\n\n");
    doc.push_str(data.answer);
    doc.push('\n');

    if !data.query_results.is_empty() {
        doc.push_str("\n## Query Results\n\n");
        doc.push_str(&render_table(data.query_results));
    }

    if let Some(caption) = data.chart_caption {
        doc.push_str("\n## Chart\n\n");
        doc.push_str(caption);
        doc.push('\n');
    }

    doc
}

/// Render rows as a Markdown table, with columns taken from the first row.
fn render_table(rows: &[QueryRow]) -> String {
    let headers: Vec<&String> = match rows.first() {
        Some(first) => first.keys().collect(),
        None => return String::new(),
    };

    let mut table = String::new();
    table.push_str("| ");
    table.push_str(
        &headers
            .iter()
            .map(|h| h.as_str())
            .collect::<Vec<_>>()
            .join(" | "),
    );
    table.push_str(" |\n|");
    for _ in &headers {
        table.push_str("---|");
    }
    table.push('\n');

    for row in rows {
        table.push_str("| ");
        let cells: Vec<String> = headers.iter().map(|h| cell_text(row, h)).collect();
        table.push_str(&cells.join(" | "));
        table.push_str(" |\n");
    }
    table
}

/// Plain-text form of one cell; nulls render empty, strings lose quoting.
pub fn cell_text(row: &QueryRow, column: &str) -> String {
    match row.get(column) {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
