mod config;

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::KeyEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::{CliOverrides, ResolvedConfig};
use tailscope_client::{ApiError, ExpClient, LaunchRequest, Signal, TerminateRequest};
use tailscope_logs::{FilterOutcome, LogPoller, LogTail, NextStep, PollEvent, TailUpdate};
use tailscope_tui::{
    Action, AppState, ErrorPanel, ErrorReport, Event, EventHandler, HelpOverlay, KeyBindings,
    KeyContext, LogViewerScreen, PathSelectScreen, Screen, Tui,
};
use tailscope_types::Severity;

/// Rounds of path canonicalization before giving up on a fixed point
const MAX_RESOLVE_ROUNDS: usize = 4;

/// Tailscope - a terminal UI for tailing experiment logs
#[derive(Parser, Debug)]
#[command(name = "tailscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to open directly (otherwise pick one from the server's tree)
    #[arg(value_name = "PATH")]
    path: Option<String>,

    /// Server address, e.g. http://127.0.0.1:5050
    #[arg(long)]
    server: Option<String>,

    /// Config file (default: ~/.config/tailscope/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Hide rows below this level (debug, info, warning, error, critical)
    #[arg(long, value_parser = parse_level)]
    min_level: Option<Severity>,

    /// Delay between a finished batch and the next fetch
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Rows inserted per step while a batch is drawn
    #[arg(long, value_name = "ROWS")]
    chunk_size: Option<usize>,

    /// Write diagnostics here (default: tailscope.log in the state dir)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Ask the server to wait for the process to start before answering
    #[arg(long)]
    wait_for_start: bool,

    /// Launch processes in batch mode
    #[arg(long)]
    batch: bool,
}

fn parse_level(s: &str) -> Result<Severity, String> {
    Severity::parse(s).ok_or_else(|| format!("unknown level '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = config::load_with_precedence(args.config.as_deref())?;
    let config = config::resolve(
        file,
        CliOverrides {
            server: args.server.clone(),
            poll_interval_ms: args.poll_interval_ms,
            chunk_size: args.chunk_size,
            min_level: args.min_level,
            log_file: args.log_file.clone(),
            batch: args.batch,
        },
    )?;

    init_tracing(&config)?;

    let result = run_app(args, config).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn init_tracing(config: &ResolvedConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // Never stderr: the UI owns the terminal while the app runs
    let path = &config.log_file;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create log directory {}", parent.display()))?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

/// Results of background requests, fed back into the main loop
enum InternalAction {
    LoadTree,
    TreeLoaded(Vec<String>),
    Open(String),
    Resolved { generation: u64, path: String },
    Launch { path: String, overwrite: bool },
    Launched { path: String, pid: Option<u32> },
    Terminate { path: String, signal: Signal },
    Terminated { url: String, signal: Signal },
    Error(ErrorReport),
}

/// Things the action handler reaches besides the UI state
struct Viewer {
    tail: LogTail,
    poller: LogPoller<ExpClient>,
    internal_tx: mpsc::UnboundedSender<InternalAction>,
    wait_for_start: bool,
}

impl Viewer {
    /// Tail `path` from the beginning, dropping whatever was shown before
    fn start(&mut self, state: &mut AppState, path: &str, wait_for_start: bool) {
        self.poller.abandon();
        let ticket = self.tail.start_session(path, wait_for_start);
        state.reset_viewer();
        state.navigate_to(Screen::LogViewer);
        info!("tailing '{}'", path);
        self.poller.issue(ticket);
    }

    fn stop(&mut self) {
        self.tail.stop();
        self.poller.abandon();
    }

    fn send(&self, internal: InternalAction) {
        let _ = self.internal_tx.send(internal);
    }
}

async fn run_app(args: Args, config: ResolvedConfig) -> Result<()> {
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<InternalAction>();
    let (poll_tx, mut poll_rx) = mpsc::unbounded_channel::<PollEvent>();

    let client = ExpClient::new(&config.server)
        .map_err(|e| anyhow::anyhow!("invalid server address: {}", e.message()))?;

    let mut state = AppState::new(action_tx.clone(), config.server.clone());
    state.ui_state.auto_scroll_default = config.auto_scroll;
    state.ui_state.auto_scroll = config.auto_scroll;

    let mut viewer = Viewer {
        tail: LogTail::new(&config.tail_config()),
        poller: LogPoller::new(Arc::new(client.clone()), poll_tx),
        internal_tx: internal_tx.clone(),
        wait_for_start: args.wait_for_start,
    };

    // Bumped on every open so a slow resolve cannot override a newer one
    let mut open_generation: u64 = 0;

    let mut tui = Tui::new()?;
    let mut events = EventHandler::new(Duration::from_millis(100));
    let keybindings = KeyBindings::new();

    let _ = internal_tx.send(InternalAction::LoadTree);
    if let Some(path) = args.path {
        let _ = internal_tx.send(InternalAction::Open(path));
    }

    render(&mut tui, &mut state, &viewer.tail)?;

    loop {
        let poll_due = viewer.tail.next_poll_due();
        let inserting = viewer.tail.has_pending_insertion();

        tokio::select! {
            // Input first so keys stay responsive while a batch is drawn
            biased;

            Some(event) = events.next() => {
                match event {
                    Event::Key(key) => {
                        if let Some(action) = route_key(&keybindings, &state, &key) {
                            let _ = action_tx.send(action);
                        }
                    }
                    Event::Tick | Event::Resize(_, _) => {}
                    Event::Error(e) => {
                        state.show_error(ErrorReport::new(format!("Terminal error: {}", e)));
                    }
                }
            }

            Some(action) = action_rx.recv() => {
                handle_action(&mut state, &mut viewer, action);
            }

            Some(event) = poll_rx.recv() => {
                match viewer.tail.handle_response(&event.ticket, event.result) {
                    TailUpdate::Stale => debug!("dropped stale response for '{}'", event.ticket.path),
                    TailUpdate::Inserting { rows } => debug!("inserting {} rows", rows),
                    TailUpdate::Failed(e) => {
                        warn!("fetch failed: {}", e);
                        state.show_error(ErrorReport::from_api("Fetching log failed", &e));
                    }
                }
            }

            Some(internal) = internal_rx.recv() => {
                match internal {
                    InternalAction::LoadTree => {
                        let client = client.clone();
                        let tx = internal_tx.clone();
                        tokio::spawn(async move {
                            let msg = match client.list_tree().await {
                                Ok(paths) => InternalAction::TreeLoaded(paths),
                                Err(e) => InternalAction::Error(ErrorReport::from_api("Loading paths failed", &e)),
                            };
                            let _ = tx.send(msg);
                        });
                    }

                    InternalAction::TreeLoaded(paths) => {
                        debug!("{} paths listed", paths.len());
                        state.set_paths(paths);
                    }

                    InternalAction::Open(path) => {
                        open_generation += 1;
                        let generation = open_generation;
                        let client = client.clone();
                        let tx = internal_tx.clone();
                        tokio::spawn(async move {
                            let msg = match resolve_fixed_point(&client, &path).await {
                                Ok(path) => InternalAction::Resolved { generation, path },
                                Err(e) => InternalAction::Error(ErrorReport::from_api(
                                    &format!("Cannot open '{}'", path),
                                    &e,
                                )),
                            };
                            let _ = tx.send(msg);
                        });
                    }

                    InternalAction::Resolved { generation, path } => {
                        if generation == open_generation {
                            let wait = viewer.wait_for_start;
                            viewer.start(&mut state, &path, wait);
                        }
                    }

                    InternalAction::Launch { path, overwrite } => {
                        let request = LaunchRequest {
                            path,
                            overwrite,
                            wait_for_start: true,
                            batch: config.batch,
                        };
                        let client = client.clone();
                        let tx = internal_tx.clone();
                        tokio::spawn(async move {
                            let msg = match client.launch(&request).await {
                                Ok(resp) => InternalAction::Launched { path: resp.url, pid: resp.pid },
                                Err(e) => InternalAction::Error(ErrorReport::from_api("Launch failed", &e)),
                            };
                            let _ = tx.send(msg);
                        });
                    }

                    InternalAction::Launched { path, pid } => {
                        state.ui_state.notice = Some(match pid {
                            Some(pid) => format!("launched {} (pid {})", path, pid),
                            None => format!("launched {}", path),
                        });
                        // The new run starts with an empty log; wait for it
                        viewer.start(&mut state, &path, true);
                    }

                    InternalAction::Terminate { path, signal } => {
                        let request = TerminateRequest { path, signal };
                        let client = client.clone();
                        let tx = internal_tx.clone();
                        tokio::spawn(async move {
                            let msg = match client.terminate(&request).await {
                                Ok(resp) => InternalAction::Terminated { url: resp.url, signal },
                                Err(e) => InternalAction::Error(ErrorReport::from_api("Terminate failed", &e)),
                            };
                            let _ = tx.send(msg);
                        });
                    }

                    InternalAction::Terminated { url, signal } => {
                        state.ui_state.notice = Some(format!("sent {} to {}", signal_name(signal), url));
                    }

                    InternalAction::Error(report) => {
                        warn!("{}", report.message);
                        state.show_error(report);
                    }
                }
            }

            _ = sleep_until(poll_due), if poll_due.is_some() => {
                if let Some(ticket) = viewer.tail.poll_due(Instant::now()) {
                    viewer.poller.issue(ticket);
                }
            }

            _ = std::future::ready(()), if inserting => {
                if let Some(report) = viewer.tail.step(Instant::now())
                    && report.next == Some(NextStep::Dead)
                {
                    debug!("process finished after {} rows", report.chunk.last_row().unwrap_or(0));
                }
            }
        }

        if state.should_quit {
            break;
        }

        render(&mut tui, &mut state, &viewer.tail)?;
    }

    viewer.poller.shutdown();
    events.shutdown();
    tui.restore()?;

    Ok(())
}

async fn sleep_until(due: Option<Instant>) {
    if let Some(due) = due {
        tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
    }
}

/// Canonicalize until the server returns the path unchanged
async fn resolve_fixed_point(client: &ExpClient, path: &str) -> Result<String, ApiError> {
    let mut current = path.to_string();
    for _ in 0..MAX_RESOLVE_ROUNDS {
        let resolved = client.resolve_path(&current).await?;
        if resolved == current {
            break;
        }
        current = resolved;
    }
    Ok(current)
}

fn signal_name(signal: Signal) -> &'static str {
    match signal {
        Signal::Graceful => "interrupt",
        Signal::Kill => "kill",
    }
}

/// Pick the key map for whatever currently has focus
fn route_key(
    keybindings: &KeyBindings,
    state: &AppState,
    key: &KeyEvent,
) -> Option<Action> {
    if state.ui_state.error.is_some() {
        return keybindings.get_action(KeyContext::ErrorPanel, key);
    }
    if state.ui_state.search_active {
        return keybindings.get_filter_input_action(key);
    }
    if state.ui_state.help_visible {
        // Any binding that would navigate away just closes the overlay
        return match keybindings.get_action(KeyContext::Global, key) {
            Some(Action::Quit) => Some(Action::Quit),
            Some(_) => Some(Action::ToggleHelp),
            None => None,
        };
    }

    let context = match state.current_screen {
        Screen::PathSelect => KeyContext::ListNavigation,
        Screen::LogViewer => KeyContext::LogViewer,
    };
    keybindings.get_action(context, key)
}

fn handle_action(state: &mut AppState, viewer: &mut Viewer, action: Action) {
    if action != Action::Tick {
        state.ui_state.notice = None;
    }

    match action {
        Action::Quit => {
            viewer.stop();
            state.should_quit = true;
        }
        Action::GoBack => {
            if state.current_screen == Screen::LogViewer {
                viewer.stop();
                viewer.tail.apply_filter("");
            }
            if !state.go_back() {
                state.should_quit = true;
            }
        }
        Action::OpenPath(path) => {
            viewer.send(InternalAction::Open(path));
        }
        Action::ToggleHelp => {
            state.ui_state.help_visible = !state.ui_state.help_visible;
        }

        // Path picker
        Action::ListUp => state.list_up(),
        Action::ListDown => state.list_down(),
        Action::ListSelect => {
            if let Some(path) = state.selected_path() {
                viewer.send(InternalAction::Open(path));
            }
        }
        Action::RefreshTree => viewer.send(InternalAction::LoadTree),

        // Search input, shared by the picker and the viewer's filter
        Action::OpenSearch => {
            let current = match state.current_screen {
                Screen::LogViewer => viewer.tail.filter().pattern().to_string(),
                Screen::PathSelect => state.ui_state.search_input.clone(),
            };
            state.start_search(&current);
        }
        Action::CloseSearch => {
            state.cancel_search();
            if state.current_screen == Screen::LogViewer {
                viewer.tail.apply_filter("");
            }
        }
        Action::SearchInput(c) => {
            state.search_input_char(c);
            apply_live_filter(state, viewer);
        }
        Action::SearchBackspace => {
            state.search_input_backspace();
            apply_live_filter(state, viewer);
        }
        Action::SearchClear => {
            state.search_clear();
            apply_live_filter(state, viewer);
        }
        Action::ApplyFilter => {
            // An invalid pattern keeps the input open for correction
            if state.ui_state.filter_error.is_none() {
                state.close_search();
            }
        }
        Action::ClearFilter => {
            viewer.tail.apply_filter("");
            state.ui_state.search_input.clear();
            state.ui_state.filter_error = None;
        }

        // Log viewer
        Action::ScrollUp(n) => state.scroll_up(n),
        Action::ScrollDown(n) => state.scroll_down(n),
        Action::PageUp => state.page_up(),
        Action::PageDown => state.page_down(),
        Action::ScrollToTop => state.scroll_to_top(),
        Action::ScrollToBottom => state.scroll_to_bottom(),
        Action::ToggleAutoScroll => {
            state.ui_state.auto_scroll = !state.ui_state.auto_scroll;
        }
        Action::ToggleStats => {
            state.ui_state.stats_visible = !state.ui_state.stats_visible;
        }
        Action::SetMinLevel(level) => viewer.tail.set_minimum_level(level),
        Action::CycleLevel => {
            let next = viewer.tail.gate().minimum().next();
            viewer.tail.set_minimum_level(next);
        }
        Action::CycleLevelBack => {
            let prev = viewer.tail.gate().minimum().prev();
            viewer.tail.set_minimum_level(prev);
        }
        Action::TogglePolling => {
            if let Some(ticket) = viewer.tail.toggle() {
                viewer.poller.issue(ticket);
            }
        }
        Action::FollowLink => {
            let link = {
                let tail = &viewer.tail;
                let visible = state.ui_state.visible_rows.refresh(tail.table(), tail.gate());
                visible
                    .get(state.ui_state.log_scroll.min(visible.len().saturating_sub(1)))
                    .and_then(|&idx| tail.table().rows().get(idx))
                    .and_then(|row| row.first_link())
                    .map(str::to_string)
            };
            match link {
                Some(link) => viewer.send(InternalAction::Open(link)),
                None => state.ui_state.notice = Some("no link in the top row".into()),
            }
        }
        Action::Launch { overwrite } => {
            if let Some(session) = viewer.tail.session() {
                let path = session.path.clone();
                viewer.send(InternalAction::Launch { path, overwrite });
            }
        }
        Action::Terminate(signal) => {
            if let Some(session) = viewer.tail.session() {
                let path = session.path.clone();
                viewer.send(InternalAction::Terminate { path, signal });
            }
        }

        // Error panel
        Action::DismissError => state.dismiss_error(),
        Action::ToggleTraceback => state.toggle_traceback(),

        Action::Tick => {}
    }
}

/// Filter rows as the pattern is typed; the picker narrows on its own
fn apply_live_filter(state: &mut AppState, viewer: &mut Viewer) {
    if state.current_screen != Screen::LogViewer {
        return;
    }
    state.ui_state.filter_error = match viewer.tail.apply_filter(&state.ui_state.search_input) {
        FilterOutcome::Rejected => Some("invalid pattern, previous filter kept".into()),
        _ => None,
    };
}

fn render(tui: &mut Tui, state: &mut AppState, tail: &LogTail) -> Result<()> {
    let now = Instant::now();

    tui.draw(|frame| {
        match state.current_screen {
            Screen::PathSelect => PathSelectScreen::render(frame, state),
            Screen::LogViewer => LogViewerScreen::render(frame, state, tail, now),
        }

        if let Some(report) = &state.ui_state.error {
            ErrorPanel::render(frame, report);
        }

        if state.ui_state.help_visible {
            HelpOverlay::render(frame);
        }
    })?;

    Ok(())
}
