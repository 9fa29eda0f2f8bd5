//! Frame classification and terminal-payload normalization.
//!
//! Every decoded payload is a JSON object with a `type` discriminant:
//! `heartbeat`, `thinking`, `tool_use`, `final`, or `error`. Terminal frames
//! (`final`/`error`) arrive in one of two shapes — the current `ui_msgs`
//! shape, where the last element of the array is the authoritative turn, or
//! a flat legacy shape with `content`/`query_results`/`show_graph` at the
//! top level. Both are normalized into [`FinalResult`] here, immediately on
//! classification, so nothing downstream ever branches on wire shape.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{parse_query_results, ChatTurn, QueryRow, Usage};

/// Fallback when an error frame carries no message.
pub const GENERIC_ERROR: &str = "Unknown error occurred";

/// A classified frame from the answer stream.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Liveness-only frame; no semantic payload
    Heartbeat,
    /// Intermediate reasoning text
    Thinking {
        #[serde(default)]
        content: String,
    },
    /// The agent invoked a tool
    ToolUse {
        #[serde(default)]
        tool: String,
    },
    /// Successful terminal frame
    Final(TerminalFrame),
    /// Server-reported terminal error
    Error(TerminalFrame),
}

/// Classify one decoded payload. An unparseable payload (bad JSON, unknown
/// `type`) is the caller's cue to drop the record and keep streaming.
pub fn classify(payload: &str) -> Result<Frame, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Raw payload of a `final` or `error` frame, accommodating both wire
/// shapes. Use [`FinalResult::from_final`] / [`FinalResult::from_error`]
/// rather than reading fields directly.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct TerminalFrame {
    #[serde(default)]
    pub ui_msgs: Vec<ChatTurn>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub thread_title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    // Flat legacy shape
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub query_results: Option<Value>,
    #[serde(default)]
    pub show_graph: Option<bool>,
}

/// Terminal status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Success,
    Error,
}

/// The normalized terminal payload of one session — the only shape the
/// session controller hands to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalResult {
    pub status: ResultStatus,
    /// Assistant answer text (empty on errors)
    pub response: String,
    /// Thread this exchange was persisted under, when known
    pub thread_id: Option<String>,
    /// Server-assigned title, present when the first message created a thread
    pub thread_title: Option<String>,
    pub query_results: Vec<QueryRow>,
    pub show_graph: bool,
    pub usage: Usage,
    pub error: Option<String>,
}

impl FinalResult {
    /// Normalize a `final` frame, whichever shape it arrived in.
    pub fn from_final(frame: TerminalFrame) -> Self {
        let status = match frame.status.as_deref() {
            Some("error") => ResultStatus::Error,
            _ => ResultStatus::Success,
        };

        if let Some(last) = frame.ui_msgs.last() {
            // ui_msgs shape: the last element is the authoritative turn
            Self {
                status,
                response: last.ai.clone().unwrap_or_default(),
                thread_id: frame.thread_id,
                thread_title: frame.thread_title,
                query_results: last.parsed_query_results(),
                show_graph: last.show_graph,
                usage: last.usage.clone().unwrap_or_default(),
                error: None,
            }
        } else {
            // Flat legacy shape
            Self {
                status,
                response: frame.content.unwrap_or_default(),
                thread_id: frame.thread_id,
                thread_title: frame.thread_title,
                query_results: parse_query_results(frame.query_results.as_ref()),
                show_graph: frame.show_graph.unwrap_or(false),
                usage: Usage::default(),
                error: None,
            }
        }
    }

    /// Normalize an `error` frame: the message comes from the last `ui_msgs`
    /// element's `error` field or the flat `content`, with a generic
    /// fallback.
    pub fn from_error(frame: TerminalFrame) -> Self {
        let message = frame
            .ui_msgs
            .last()
            .and_then(|turn| turn.error.clone())
            .or(frame.content)
            .unwrap_or_else(|| GENERIC_ERROR.to_string());
        Self::error(message, frame.thread_id)
    }

    /// Synthesize an error result (transport failure, timeout, etc.).
    pub fn error(message: impl Into<String>, thread_id: Option<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            response: String::new(),
            thread_id,
            thread_title: None,
            query_results: Vec::new(),
            show_graph: false,
            usage: Usage::default(),
            error: Some(message.into()),
        }
    }

    /// Fill in the thread id from the request when the frame did not carry
    /// one.
    pub fn with_thread_fallback(mut self, hint: Option<String>) -> Self {
        if self.thread_id.is_none() {
            self.thread_id = hint;
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// Kind discriminant of a thinking entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingKind {
    Thinking,
    ToolUse,
}

/// One intermediate trace entry, immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingEntry {
    pub kind: ThinkingKind,
    pub content: String,
}

impl ThinkingEntry {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self {
            kind: ThinkingKind::Thinking,
            content: content.into(),
        }
    }

    pub fn tool_use(tool: impl Into<String>) -> Self {
        Self {
            kind: ThinkingKind::ToolUse,
            content: tool.into(),
        }
    }
}
