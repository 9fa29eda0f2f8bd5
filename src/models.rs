//! Data model for the Sift backend API.
//!
//! Wire shapes for threads, conversation turns, models, charts, and tool
//! insights. The backend is loose about several fields (ids that may be
//! numbers, query results that arrive as JSON-encoded strings), so the
//! deserializers here are deliberately forgiving.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One row of structured query results: column name to value.
pub type QueryRow = serde_json::Map<String, Value>;

/// Helper to deserialize an id as either string or integer.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer")
        }

        fn visit_str<E>(self, value: &str) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Token and latency metrics attached to an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Usage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub latency: u64,
}

/// One human/assistant exchange within a thread (`ui_msgs` element).
///
/// The same shape appears in thread detail responses and inside terminal
/// streaming frames. `query_results` may be a JSON array or a JSON-encoded
/// string of one; use [`ChatTurn::parsed_query_results`] to get rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatTurn {
    #[serde(default)]
    pub human: Option<String>,
    #[serde(default)]
    pub ai: Option<String>,
    #[serde(default)]
    pub query_results: Option<Value>,
    #[serde(default)]
    pub show_graph: bool,
    #[serde(default)]
    pub graph_code: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatTurn {
    /// Structured rows from `query_results`, whichever encoding arrived.
    pub fn parsed_query_results(&self) -> Vec<QueryRow> {
        parse_query_results(self.query_results.as_ref())
    }
}

/// Decode query results from either encoding the backend uses: a JSON array
/// of row objects, or that same array as a JSON-encoded string. Anything
/// else (including a string that fails to parse) yields no rows — a corrupt
/// secondary payload must not take the whole response down.
pub fn parse_query_results(value: Option<&Value>) -> Vec<QueryRow> {
    let value = match value {
        Some(v) => v,
        None => return Vec::new(),
    };

    let parsed: Value = match value {
        Value::String(encoded) => match serde_json::from_str(encoded) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(%err, "failed to parse query_results string");
                return Vec::new();
            }
        },
        other => other.clone(),
    };

    match parsed {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => {
            tracing::warn!("query_results is not an array after parsing");
            Vec::new()
        }
    }
}

/// Summary entry from the thread listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadSummary {
    #[serde(deserialize_with = "deserialize_id")]
    pub thread_id: String,
    #[serde(default = "untitled")]
    pub thread_title: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub message_count: usize,
}

fn untitled() -> String {
    "Untitled Chat".to_string()
}

impl ThreadSummary {
    /// Best-effort timestamp for date grouping: `updated_at` first, then
    /// `created_at`. The backend sends ISO-8601 strings or nothing at all.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        for raw in [&self.updated_at, &self.created_at] {
            if raw.is_empty() {
                continue;
            }
            if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
                return Some(ts.with_timezone(&Utc));
            }
            // SQLite-style "YYYY-MM-DD HH:MM:SS" without an offset
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(naive.and_utc());
            }
        }
        None
    }
}

/// Response of `GET /api/threads`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThreadListResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub threads: Vec<ThreadSummary>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total: usize,
}

/// Full thread as returned by `GET /api/thread/{id}` and `POST /api/thread`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThreadDetail {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub thread_title: String,
    #[serde(default)]
    pub ui_msgs: Vec<ChatTurn>,
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(deserialize_id(deserializer)?))
}

/// Status-and-message response for thread deletion.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// An available model from `GET /api/models`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Response of `GET /api/models`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// One category of tools from `GET /api/insights`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InsightCategory {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Body of `POST /api/answer` — opens the streaming response.
///
/// An empty `thread_id` tells the server to start a new thread.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AnswerRequest {
    pub human: String,
    pub thread_id: String,
    pub user: String,
    pub model_id: String,
}

impl AnswerRequest {
    pub fn new(
        query: impl Into<String>,
        model_id: impl Into<String>,
        thread_id: Option<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            human: query.into(),
            thread_id: thread_id.unwrap_or_default(),
            user: user.into(),
            model_id: model_id.into(),
        }
    }

    /// The thread id as the rest of the client sees it: `None` for "new".
    pub fn thread_hint(&self) -> Option<String> {
        if self.thread_id.is_empty() {
            None
        } else {
            Some(self.thread_id.clone())
        }
    }
}

/// Chart specification decoded from the `graph_code` / `chart` payload.
///
/// The series/options are passed through as raw JSON; the renderer decides
/// how much of them it can honor in a terminal.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChartSpec {
    pub chart_type: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub chart_configuration: ChartConfiguration,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct ChartConfiguration {
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub series: Value,
}

impl ChartSpec {
    /// Parse a chart spec from its JSON-encoded string form. Returns `None`
    /// for anything that does not look like a usable spec.
    pub fn parse(code: &str) -> Option<ChartSpec> {
        if code.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<ChartSpec>(code) {
            Ok(spec) if !spec.chart_type.is_empty() => Some(spec),
            Ok(_) => {
                tracing::warn!("chart spec is missing chart_type");
                None
            }
            Err(err) => {
                tracing::warn!(%err, "failed to parse chart spec");
                None
            }
        }
    }

    /// Parse a chart spec from a JSON value that may be a string or an
    /// already-decoded object.
    pub fn from_value(value: &Value) -> Option<ChartSpec> {
        match value {
            Value::String(code) => Self::parse(code),
            Value::Object(_) => match serde_json::from_value::<ChartSpec>(value.clone()) {
                Ok(spec) if !spec.chart_type.is_empty() => Some(spec),
                _ => None,
            },
            _ => None,
        }
    }
}
