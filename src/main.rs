use std::io;

use color_eyre::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sift::app::{App, AppMessage, Focus};
use sift::config::Config;
use sift::ui;

/// Log to a file; stdout belongs to the TUI. Filter via `SIFT_LOG`.
fn init_tracing() {
    let log_dir = dirs::data_local_dir()
        .map(|dir| dir.join("sift"))
        .unwrap_or_else(std::env::temp_dir);
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::File::create(log_dir.join("sift.log")) else {
        return;
    };
    let filter = EnvFilter::try_from_env("SIFT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = Config::from_env();
    tracing::info!(api_url = %config.api_url, user = %config.user, "starting sift");

    let (mut app, mut messages_rx) = App::new(config);
    app.load_threads();
    app.load_models();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, &mut messages_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    messages_rx: &mut mpsc::UnboundedReceiver<AppMessage>,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let mut event_stream = EventStream::new();

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;
        if app.should_quit {
            return Ok(());
        }

        tokio::select! {
            maybe_event = event_stream.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_event {
                    if key.kind == KeyEventKind::Press {
                        handle_key(app, key);
                    }
                }
            }
            Some(message) = messages_rx.recv() => {
                app.handle_message(message);
                // Coalesce whatever else is queued into this frame
                while let Ok(message) = messages_rx.try_recv() {
                    app.handle_message(message);
                }
            }
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global bindings
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.quit();
                return;
            }
            KeyCode::Char('p') => {
                app.open_model_picker();
                return;
            }
            KeyCode::Char('t') => {
                app.cycle_tab_on_last();
                return;
            }
            KeyCode::Char('r') => {
                app.regenerate_last();
                return;
            }
            KeyCode::Char('e') => {
                app.export_last();
                return;
            }
            _ => {}
        }
    }

    if app.model_picker_open {
        match key.code {
            KeyCode::Esc => app.model_picker_open = false,
            KeyCode::Up => app.model_picker_prev(),
            KeyCode::Down => app.model_picker_next(),
            KeyCode::Enter => app.confirm_model_picker(),
            _ => {}
        }
        return;
    }

    if key.code == KeyCode::Tab && !app.searching {
        app.focus = match app.focus {
            Focus::Sidebar => Focus::Input,
            Focus::Input => Focus::Sidebar,
        };
        return;
    }

    match app.focus {
        Focus::Sidebar => handle_sidebar_key(app, key),
        Focus::Input => handle_input_key(app, key),
    }
}

fn handle_sidebar_key(app: &mut App, key: KeyEvent) {
    if app.searching {
        match key.code {
            KeyCode::Esc => {
                app.searching = false;
                app.set_thread_search(String::new());
            }
            KeyCode::Enter => app.searching = false,
            KeyCode::Backspace => {
                let mut query = app.thread_search.clone();
                query.pop();
                app.set_thread_search(query);
            }
            KeyCode::Char(c) => {
                let mut query = app.thread_search.clone();
                query.push(c);
                app.set_thread_search(query);
            }
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Up => app.select_prev_thread(),
        KeyCode::Down => app.select_next_thread(),
        KeyCode::Enter => {
            app.open_selected_thread();
            app.focus = Focus::Input;
        }
        KeyCode::Char('n') => app.new_chat(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected_thread(),
        KeyCode::Char('/') => app.searching = true,
        _ => {}
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            if app.loading {
                app.cancel_session();
            } else {
                app.error_message = None;
                app.status_message = None;
            }
        }
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => app.input_backspace(),
        KeyCode::Up => app.scroll_offset = app.scroll_offset.saturating_add(1),
        KeyCode::Down => app.scroll_offset = app.scroll_offset.saturating_sub(1),
        KeyCode::PageUp => app.scroll_offset = app.scroll_offset.saturating_add(10),
        KeyCode::PageDown => app.scroll_offset = app.scroll_offset.saturating_sub(10),
        KeyCode::Char(c) => app.input_char(c),
        _ => {}
    }
}
