//! Application state and update logic.
//!
//! `App` owns everything the UI renders: the thread sidebar, the active
//! conversation, the in-flight streaming session, the model picker, and the
//! input line. Async work (REST calls, session events) reports back through
//! an [`AppMessage`] channel consumed by the main event loop — the loop in
//! `main.rs` is the only place state is mutated, so there is no locking.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;

use crate::backend::{format_insights, BackendClient};
use crate::config::{Config, MAX_QUERY_LEN};
use crate::export::{export_turn, ExportData};
use crate::models::{
    AnswerRequest, ChartSpec, ModelInfo, QueryRow, ThreadDetail, ThreadSummary, Usage,
};
use crate::stream::{
    start_session, FinalResult, SessionCancel, SessionEvent, ThinkingEntry,
};

/// Messages delivered to the main loop from async operations.
#[derive(Debug)]
pub enum AppMessage {
    /// Event from the in-flight streaming session
    Session { seq: u64, event: SessionEvent },
    ThreadsLoaded(Vec<ThreadSummary>),
    ThreadsLoadFailed(String),
    ThreadLoaded(Box<ThreadDetail>),
    ThreadLoadFailed { thread_id: String, error: String },
    ThreadCreated(Box<ThreadDetail>),
    ThreadCreateFailed(String),
    ThreadDeleted { thread_id: String },
    ThreadDeleteFailed(String),
    ModelsLoaded(Vec<ModelInfo>),
    ModelsLoadFailed(String),
    ChartReady {
        epoch: u64,
        turn_index: usize,
        chart: Option<ChartSpec>,
    },
    ChartFailed {
        epoch: u64,
        turn_index: usize,
        error: String,
    },
    InsightsLoaded(String),
    InsightsFailed(String),
}

/// Which pane has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Input,
}

/// Tabbed view of an assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Answer,
    Records,
    Chart,
}

/// Chart lifecycle for one assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartState {
    /// No chart asked for yet (user can still open the Chart tab)
    NotRequested,
    Loading,
    Ready(ChartSpec),
    /// Asked, but the backend produced nothing usable
    Unavailable,
}

/// One assistant answer with its attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantTurn {
    /// The query that produced this answer (for regenerate/chart/export)
    pub query: String,
    pub text: String,
    pub query_results: Vec<QueryRow>,
    pub show_graph: bool,
    pub chart: ChartState,
    pub usage: Usage,
    pub tab: Tab,
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnView {
    User { query: String },
    Assistant(Box<AssistantTurn>),
}

static THINKING_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<thinking>.*?</thinking>").expect("valid regex"));

/// Remove `<thinking>…</thinking>` spans the model sometimes leaks into its
/// final answer.
pub fn strip_thinking_tags(text: &str) -> String {
    THINKING_TAGS.replace_all(text, "").into_owned()
}

/// Sidebar title for a thread created implicitly by its first message.
pub fn truncate_title(query: &str) -> String {
    const MAX: usize = 50;
    if query.chars().count() > MAX {
        let truncated: String = query.chars().take(MAX).collect();
        format!("{truncated}...")
    } else {
        query.to_string()
    }
}

pub struct App {
    pub config: Config,
    pub client: BackendClient,
    pub focus: Focus,

    // Sidebar
    pub threads: Vec<ThreadSummary>,
    pub thread_search: String,
    pub searching: bool,
    pub selected_thread: usize,
    pub loading_threads: bool,

    // Conversation
    pub active_thread_id: Option<String>,
    pub turns: Vec<TurnView>,
    pub loading_thread: bool,
    pub scroll_offset: u16,

    // Streaming session
    pub thoughts: Vec<ThinkingEntry>,
    pub show_thoughts: bool,
    pub loading: bool,
    session_cancel: Option<SessionCancel>,
    session_seq: u64,
    pending_query: Option<String>,
    conversation_epoch: u64,

    // Models
    pub models: Vec<ModelInfo>,
    pub selected_model: String,
    pub model_picker_open: bool,
    pub model_picker_index: usize,

    // Input and status
    pub input: String,
    pub error_message: Option<String>,
    pub status_message: Option<String>,
    pub should_quit: bool,

    messages_tx: mpsc::UnboundedSender<AppMessage>,
}

impl App {
    /// Build the app and the message receiver the main loop listens on.
    pub fn new(config: Config) -> (Self, mpsc::UnboundedReceiver<AppMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = BackendClient::new(&config);
        let selected_model = config.default_model.clone();
        let app = Self {
            config,
            client,
            focus: Focus::Input,
            threads: Vec::new(),
            thread_search: String::new(),
            searching: false,
            selected_thread: 0,
            loading_threads: false,
            active_thread_id: None,
            turns: Vec::new(),
            loading_thread: false,
            scroll_offset: 0,
            thoughts: Vec::new(),
            show_thoughts: false,
            loading: false,
            session_cancel: None,
            session_seq: 0,
            pending_query: None,
            conversation_epoch: 0,
            models: Vec::new(),
            selected_model,
            model_picker_open: false,
            model_picker_index: 0,
            input: String::new(),
            error_message: None,
            status_message: None,
            should_quit: false,
            messages_tx: tx,
        };
        (app, rx)
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // ------------------------------------------------------------------
    // Background loads
    // ------------------------------------------------------------------

    pub fn load_threads(&mut self) {
        self.loading_threads = true;
        let client = self.client.clone();
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            let message = match client.list_threads(1, 50).await {
                Ok(response) => AppMessage::ThreadsLoaded(response.threads),
                Err(err) => AppMessage::ThreadsLoadFailed(err.to_string()),
            };
            let _ = tx.send(message);
        });
    }

    pub fn load_models(&mut self) {
        let client = self.client.clone();
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            let message = match client.list_models().await {
                Ok(models) => AppMessage::ModelsLoaded(models),
                Err(err) => AppMessage::ModelsLoadFailed(err.to_string()),
            };
            let _ = tx.send(message);
        });
    }

    // ------------------------------------------------------------------
    // Sidebar
    // ------------------------------------------------------------------

    /// Threads visible after the search filter, in list order.
    pub fn visible_threads(&self) -> Vec<&ThreadSummary> {
        let needle = self.thread_search.to_lowercase();
        self.threads
            .iter()
            .filter(|thread| {
                needle.is_empty() || thread.thread_title.to_lowercase().contains(&needle)
            })
            .collect()
    }

    fn clamp_thread_selection(&mut self) {
        let count = self.visible_threads().len();
        if count == 0 {
            self.selected_thread = 0;
        } else if self.selected_thread >= count {
            self.selected_thread = count - 1;
        }
    }

    pub fn select_prev_thread(&mut self) {
        self.selected_thread = self.selected_thread.saturating_sub(1);
    }

    pub fn select_next_thread(&mut self) {
        let count = self.visible_threads().len();
        if count > 0 && self.selected_thread + 1 < count {
            self.selected_thread += 1;
        }
    }

    pub fn set_thread_search(&mut self, query: String) {
        self.thread_search = query;
        self.selected_thread = 0;
    }

    /// Open the thread under the cursor; its turns load in the background
    /// and replace the conversation wholesale when they arrive.
    pub fn open_selected_thread(&mut self) {
        let thread_id = match self.visible_threads().get(self.selected_thread) {
            Some(thread) => thread.thread_id.clone(),
            None => return,
        };
        if self.loading {
            return;
        }
        self.reset_conversation();
        self.active_thread_id = Some(thread_id.clone());
        self.loading_thread = true;

        let client = self.client.clone();
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            let message = match client.get_thread(&thread_id).await {
                Ok(detail) => AppMessage::ThreadLoaded(Box::new(detail)),
                Err(err) => AppMessage::ThreadLoadFailed {
                    thread_id,
                    error: err.to_string(),
                },
            };
            let _ = tx.send(message);
        });
    }

    pub fn new_chat(&mut self) {
        if self.loading {
            return;
        }
        let client = self.client.clone();
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            let message = match client.create_thread().await {
                Ok(detail) => AppMessage::ThreadCreated(Box::new(detail)),
                Err(err) => AppMessage::ThreadCreateFailed(err.to_string()),
            };
            let _ = tx.send(message);
        });
    }

    pub fn delete_selected_thread(&mut self) {
        let thread_id = match self.visible_threads().get(self.selected_thread) {
            Some(thread) => thread.thread_id.clone(),
            None => return,
        };
        let client = self.client.clone();
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            let message = match client.delete_thread(&thread_id).await {
                Ok(()) => AppMessage::ThreadDeleted { thread_id },
                Err(err) => AppMessage::ThreadDeleteFailed(err.to_string()),
            };
            let _ = tx.send(message);
        });
    }

    fn reset_conversation(&mut self) {
        self.turns.clear();
        self.thoughts.clear();
        self.show_thoughts = false;
        self.scroll_offset = 0;
        self.error_message = None;
        self.conversation_epoch += 1;
    }

    // ------------------------------------------------------------------
    // Input and query submission
    // ------------------------------------------------------------------

    pub fn input_char(&mut self, c: char) {
        if c != '\n' && self.input.chars().count() < MAX_QUERY_LEN {
            self.input.push(c);
        }
    }

    pub fn input_backspace(&mut self) {
        self.input.pop();
    }

    /// Submit whatever is in the input line: the `/tools` command or a
    /// query for the agent.
    pub fn submit_input(&mut self) {
        let query = self.input.trim().to_string();
        if query.is_empty() || self.loading {
            return;
        }
        self.input.clear();
        if query == "/tools" {
            self.run_tools_command();
        } else {
            self.submit_query(query);
        }
    }

    /// Start a streaming session for `query`. Precondition: no session is
    /// in flight (the UI disables submission while `loading`).
    pub fn submit_query(&mut self, query: String) {
        if query.is_empty() || self.loading {
            return;
        }
        self.error_message = None;
        self.status_message = None;
        self.turns.push(TurnView::User {
            query: query.clone(),
        });
        self.pending_query = Some(query.clone());
        self.thoughts.clear();
        self.show_thoughts = true;
        self.loading = true;
        self.scroll_offset = 0;

        let request = AnswerRequest::new(
            query,
            self.selected_model.clone(),
            self.active_thread_id.clone(),
            self.config.user.clone(),
        );

        self.session_seq += 1;
        let seq = self.session_seq;
        let mut handle = start_session(&self.client, request);
        self.session_cancel = Some(handle.canceller());

        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = handle.next_event().await {
                if tx.send(AppMessage::Session { seq, event }).is_err() {
                    break;
                }
            }
        });
    }

    /// Cancel the in-flight session, if any. Stale events that were already
    /// queued are dropped by the sequence-number guard.
    pub fn cancel_session(&mut self) {
        if let Some(cancel) = self.session_cancel.take() {
            cancel.cancel();
        }
        self.session_seq += 1;
        self.loading = false;
        self.show_thoughts = false;
        self.pending_query = None;
    }

    pub fn has_session(&self) -> bool {
        self.session_cancel.is_some()
    }

    fn run_tools_command(&mut self) {
        self.turns.push(TurnView::User {
            query: "/tools".to_string(),
        });
        self.loading = true;
        let client = self.client.clone();
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            let message = match client.list_insights().await {
                Ok(categories) => AppMessage::InsightsLoaded(format_insights(&categories)),
                Err(err) => AppMessage::InsightsFailed(err.to_string()),
            };
            let _ = tx.send(message);
        });
    }

    /// Re-submit the query behind the last assistant turn as a fresh
    /// session, replacing that turn.
    pub fn regenerate_last(&mut self) {
        if self.loading {
            return;
        }
        let index = match self.last_assistant_index() {
            Some(index) => index,
            None => return,
        };
        let query = match &self.turns[index] {
            TurnView::Assistant(turn) => turn.query.clone(),
            TurnView::User { .. } => return,
        };
        // Drop the answer and its user bubble; submit_query re-adds the query.
        self.turns.remove(index);
        if index > 0 && matches!(&self.turns[index - 1], TurnView::User { query: q } if *q == query)
        {
            self.turns.remove(index - 1);
        }
        self.submit_query(query);
    }

    // ------------------------------------------------------------------
    // Tabs, charts, export
    // ------------------------------------------------------------------

    pub fn last_assistant_index(&self) -> Option<usize> {
        self.turns
            .iter()
            .rposition(|turn| matches!(turn, TurnView::Assistant(_)))
    }

    /// Switch the tab of the last assistant turn. Opening the Chart tab
    /// requests a chart if one has not been generated yet.
    pub fn set_tab_on_last(&mut self, tab: Tab) {
        let index = match self.last_assistant_index() {
            Some(index) => index,
            None => return,
        };
        if let TurnView::Assistant(turn) = &mut self.turns[index] {
            turn.tab = tab;
        }
        if tab == Tab::Chart {
            self.request_chart(index);
        }
    }

    /// Cycle Answer → Records → Chart → Answer on the last assistant turn.
    pub fn cycle_tab_on_last(&mut self) {
        let index = match self.last_assistant_index() {
            Some(index) => index,
            None => return,
        };
        if let TurnView::Assistant(turn) = &self.turns[index] {
            let next = match turn.tab {
                Tab::Answer => Tab::Records,
                Tab::Records => Tab::Chart,
                Tab::Chart => Tab::Answer,
            };
            self.set_tab_on_last(next);
        }
    }

    /// Kick off chart generation for the turn at `index` unless a chart is
    /// already present, loading, or there are no rows to chart.
    pub fn request_chart(&mut self, index: usize) {
        let epoch = self.conversation_epoch;
        let thread_id = self.active_thread_id.clone().unwrap_or_default();
        let turn = match self.turns.get_mut(index) {
            Some(TurnView::Assistant(turn)) => turn,
            _ => return,
        };
        if turn.query_results.is_empty()
            || matches!(turn.chart, ChartState::Loading | ChartState::Ready(_))
        {
            return;
        }
        turn.chart = ChartState::Loading;

        let client = self.client.clone();
        let tx = self.messages_tx.clone();
        let text = turn.query.clone();
        let rows = turn.query_results.clone();
        tokio::spawn(async move {
            let message = match client.generate_chart(&text, &rows, &thread_id).await {
                Ok(chart) => AppMessage::ChartReady {
                    epoch,
                    turn_index: index,
                    chart,
                },
                Err(err) => AppMessage::ChartFailed {
                    epoch,
                    turn_index: index,
                    error: err.to_string(),
                },
            };
            let _ = tx.send(message);
        });
    }

    /// Export the last assistant turn to a Markdown file in the working
    /// directory.
    pub fn export_last(&mut self) {
        let index = match self.last_assistant_index() {
            Some(index) => index,
            None => return,
        };
        if let TurnView::Assistant(turn) = &self.turns[index] {
            let caption = match &turn.chart {
                ChartState::Ready(spec) => Some(spec.caption.as_str()),
                _ => None,
            };
            let data = ExportData {
                query: &turn.query,
                answer: &turn.text,
                query_results: &turn.query_results,
                chart_caption: caption,
            };
            match export_turn(&data, std::path::Path::new(".")) {
                Ok(path) => {
                    self.status_message = Some(format!("Exported to {}", path.display()));
                }
                Err(err) => {
                    self.error_message = Some(format!("Export failed: {err}"));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Model picker
    // ------------------------------------------------------------------

    pub fn open_model_picker(&mut self) {
        if self.models.is_empty() {
            return;
        }
        self.model_picker_open = true;
        self.model_picker_index = self
            .models
            .iter()
            .position(|model| model.id == self.selected_model)
            .unwrap_or(0);
    }

    pub fn model_picker_prev(&mut self) {
        self.model_picker_index = self.model_picker_index.saturating_sub(1);
    }

    pub fn model_picker_next(&mut self) {
        if self.model_picker_index + 1 < self.models.len() {
            self.model_picker_index += 1;
        }
    }

    pub fn confirm_model_picker(&mut self) {
        if let Some(model) = self.models.get(self.model_picker_index) {
            self.selected_model = model.id.clone();
        }
        self.model_picker_open = false;
    }

    // ------------------------------------------------------------------
    // Message handling
    // ------------------------------------------------------------------

    pub fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::Session { seq, event } => {
                if seq != self.session_seq {
                    // A cancelled or superseded session; drop on the floor.
                    return;
                }
                match event {
                    SessionEvent::Thinking(snapshot) => {
                        self.thoughts = snapshot;
                    }
                    SessionEvent::Done(result) => self.apply_final_result(result),
                }
            }
            AppMessage::ThreadsLoaded(threads) => {
                self.loading_threads = false;
                self.threads = threads;
                self.clamp_thread_selection();
            }
            AppMessage::ThreadsLoadFailed(error) => {
                self.loading_threads = false;
                self.error_message = Some(format!("Failed to load chat threads: {error}"));
            }
            AppMessage::ThreadLoaded(detail) => {
                if self.active_thread_id.as_deref() != detail.thread_id.as_deref() {
                    return;
                }
                self.loading_thread = false;
                self.apply_thread_detail(*detail);
            }
            AppMessage::ThreadLoadFailed { thread_id, error } => {
                if self.active_thread_id.as_deref() == Some(thread_id.as_str()) {
                    self.loading_thread = false;
                    self.error_message = Some(format!("Error loading thread: {error}"));
                }
            }
            AppMessage::ThreadCreated(detail) => {
                let thread_id = match detail.thread_id.clone() {
                    Some(id) => id,
                    None => return,
                };
                self.threads.insert(
                    0,
                    ThreadSummary {
                        thread_id: thread_id.clone(),
                        thread_title: detail.thread_title.clone(),
                        user_id: self.config.user.clone(),
                        created_at: Utc::now().to_rfc3339(),
                        updated_at: Utc::now().to_rfc3339(),
                        message_count: 0,
                    },
                );
                self.selected_thread = 0;
                self.reset_conversation();
                self.active_thread_id = Some(thread_id);
                self.focus = Focus::Input;
            }
            AppMessage::ThreadCreateFailed(error) => {
                self.error_message = Some(format!("Failed to create thread: {error}"));
            }
            AppMessage::ThreadDeleted { thread_id } => {
                self.threads.retain(|thread| thread.thread_id != thread_id);
                self.clamp_thread_selection();
                if self.active_thread_id.as_deref() == Some(thread_id.as_str()) {
                    self.reset_conversation();
                    // Fall back to the next thread, or an empty new chat
                    let next_id = self
                        .visible_threads()
                        .first()
                        .map(|thread| thread.thread_id.clone());
                    match next_id {
                        Some(next_id) => {
                            self.active_thread_id = Some(next_id);
                            self.selected_thread = 0;
                            self.open_selected_thread();
                        }
                        None => self.active_thread_id = None,
                    }
                }
                self.status_message = Some("Thread deleted".to_string());
            }
            AppMessage::ThreadDeleteFailed(error) => {
                self.error_message = Some(format!("Failed to delete thread: {error}"));
            }
            AppMessage::ModelsLoaded(models) => {
                self.models = models;
            }
            AppMessage::ModelsLoadFailed(error) => {
                tracing::warn!(%error, "failed to load models");
            }
            AppMessage::ChartReady {
                epoch,
                turn_index,
                chart,
            } => {
                if epoch != self.conversation_epoch {
                    return;
                }
                if let Some(TurnView::Assistant(turn)) = self.turns.get_mut(turn_index) {
                    turn.chart = match chart {
                        Some(spec) => ChartState::Ready(spec),
                        None => ChartState::Unavailable,
                    };
                }
            }
            AppMessage::ChartFailed {
                epoch,
                turn_index,
                error,
            } => {
                if epoch != self.conversation_epoch {
                    return;
                }
                tracing::warn!(%error, "chart generation failed");
                if let Some(TurnView::Assistant(turn)) = self.turns.get_mut(turn_index) {
                    turn.chart = ChartState::Unavailable;
                }
            }
            AppMessage::InsightsLoaded(markdown) => {
                self.loading = false;
                self.turns.push(TurnView::Assistant(Box::new(AssistantTurn {
                    query: "/tools".to_string(),
                    text: markdown,
                    query_results: Vec::new(),
                    show_graph: false,
                    chart: ChartState::NotRequested,
                    usage: Usage::default(),
                    tab: Tab::Answer,
                })));
            }
            AppMessage::InsightsFailed(error) => {
                self.loading = false;
                self.error_message = Some(format!("Failed to fetch tools: {error}"));
            }
        }
    }

    /// Fold the terminal result of a session into the conversation.
    pub fn apply_final_result(&mut self, result: FinalResult) {
        self.loading = false;
        self.show_thoughts = false;
        self.session_cancel = None;
        let query = self.pending_query.take().unwrap_or_default();

        // Thread bookkeeping: the first message of a new chat creates the
        // thread server-side and the terminal frame tells us its id.
        let was_new = self.active_thread_id.is_none();
        if let Some(thread_id) = result.thread_id.clone() {
            self.active_thread_id = Some(thread_id.clone());
            if was_new {
                let title = result
                    .thread_title
                    .clone()
                    .unwrap_or_else(|| truncate_title(&query));
                if let Some(entry) = self
                    .threads
                    .iter_mut()
                    .find(|thread| thread.thread_id == thread_id)
                {
                    entry.thread_title = title;
                } else {
                    self.threads.insert(
                        0,
                        ThreadSummary {
                            thread_id,
                            thread_title: title,
                            user_id: self.config.user.clone(),
                            created_at: Utc::now().to_rfc3339(),
                            updated_at: Utc::now().to_rfc3339(),
                            message_count: 1,
                        },
                    );
                    self.selected_thread = 0;
                }
            }
        }

        if !result.is_success() {
            self.error_message = Some(
                result
                    .error
                    .unwrap_or_else(|| "Failed to get response from API".to_string()),
            );
            return;
        }

        let wants_chart = result.show_graph && !result.query_results.is_empty();
        self.turns.push(TurnView::Assistant(Box::new(AssistantTurn {
            query,
            text: strip_thinking_tags(&result.response),
            query_results: result.query_results,
            show_graph: result.show_graph,
            chart: ChartState::NotRequested,
            usage: result.usage,
            tab: Tab::Answer,
        })));

        if wants_chart {
            self.request_chart(self.turns.len() - 1);
        }
    }

    /// Replace the conversation with a freshly loaded thread.
    fn apply_thread_detail(&mut self, detail: ThreadDetail) {
        self.reset_conversation();
        self.active_thread_id = detail.thread_id.clone();
        for msg in detail.ui_msgs {
            let human = msg.human.clone();
            if let Some(human) = human {
                self.turns.push(TurnView::User { query: human });
            }
            if let Some(ai) = msg.ai.clone() {
                let rows = msg.parsed_query_results();
                let chart = msg
                    .graph_code
                    .as_deref()
                    .and_then(ChartSpec::parse)
                    .map(ChartState::Ready)
                    .unwrap_or(ChartState::NotRequested);
                self.turns.push(TurnView::Assistant(Box::new(AssistantTurn {
                    query: msg.human.clone().unwrap_or_default(),
                    text: strip_thinking_tags(&ai),
                    query_results: rows,
                    show_graph: msg.show_graph,
                    chart,
                    usage: msg.usage.clone().unwrap_or_default(),
                    tab: Tab::Answer,
                })));
            }
        }
    }
}
