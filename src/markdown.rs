//! Minimal Markdown-to-terminal rendering.
//!
//! Turns assistant answer text into styled [`ratatui`] lines: headings,
//! paragraphs, lists, emphasis, and code. Anything fancier degrades to
//! plain text — fidelity is a non-goal, readability is not.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Render Markdown into terminal lines.
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut renderer = Renderer::default();
    for event in Parser::new(text) {
        renderer.handle(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    bold: u8,
    italic: u8,
    in_code_block: bool,
    list_depth: usize,
    heading: Option<HeadingLevel>,
}

impl Renderer {
    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush_line();
                self.blank_separator();
                self.heading = Some(level);
            }
            Event::End(TagEnd::Heading(_)) => {
                self.flush_line();
                self.heading = None;
            }
            Event::Start(Tag::Paragraph) => {
                self.flush_line();
                self.blank_separator();
            }
            Event::End(TagEnd::Paragraph) => self.flush_line(),
            Event::Start(Tag::List(_)) => {
                self.flush_line();
                self.list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                self.list_depth = self.list_depth.saturating_sub(1);
            }
            Event::Start(Tag::Item) => {
                self.flush_line();
                let indent = "  ".repeat(self.list_depth.saturating_sub(1));
                self.current.push(Span::raw(format!("{indent}• ")));
            }
            Event::End(TagEnd::Item) => self.flush_line(),
            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush_line();
                self.blank_separator();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::from(Span::styled(
                            format!("[{lang}]"),
                            Style::default().fg(Color::DarkGray),
                        )));
                    }
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                self.flush_line();
                self.in_code_block = false;
            }
            Event::Start(Tag::Emphasis) => self.italic += 1,
            Event::End(TagEnd::Emphasis) => self.italic = self.italic.saturating_sub(1),
            Event::Start(Tag::Strong) => self.bold += 1,
            Event::End(TagEnd::Strong) => self.bold = self.bold.saturating_sub(1),
            Event::Text(text) => {
                if self.in_code_block {
                    // Code blocks keep their own line structure
                    for (i, code_line) in text.lines().enumerate() {
                        if i > 0 {
                            self.flush_line();
                        }
                        self.current.push(Span::styled(
                            code_line.to_string(),
                            Style::default().fg(Color::Yellow),
                        ));
                    }
                    if text.ends_with('\n') {
                        self.flush_line();
                    }
                } else {
                    let style = self.text_style();
                    self.current.push(Span::styled(text.into_string(), style));
                }
            }
            Event::Code(code) => {
                self.current.push(Span::styled(
                    code.into_string(),
                    Style::default().fg(Color::Yellow),
                ));
            }
            Event::SoftBreak => self.current.push(Span::raw(" ")),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::from(Span::styled(
                    "────────".to_string(),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            _ => {}
        }
    }

    fn text_style(&self) -> Style {
        let mut style = Style::default();
        if self.heading.is_some() {
            style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        style
    }

    fn flush_line(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
    }

    /// Insert one blank line between blocks, never at the very top.
    fn blank_separator(&mut self) {
        if !self.lines.is_empty() {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        self.lines
    }
}
