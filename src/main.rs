mod events;
mod ui;

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser as ClapParser;
use color_eyre::eyre::{Result, WrapErr};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

use agentree::app::{App, DEFAULT_AGENT};
use agentree::ingest::sidecar::EventTailer;
use agentree::tracking::AgentTracker;
use events::AppEvent;

#[derive(ClapParser, Debug)]
#[command(name = "agentree", about = "Watch a coding agent's sub-agent call tree")]
struct Cli {
    /// JSONL capture of sidecar socket events to replay and/or follow.
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// Keep watching the capture for new events.
    #[arg(short, long)]
    follow: bool,

    /// With --follow, skip what is already in the capture and show only new events.
    #[arg(long)]
    live_only: bool,

    /// Agent that runs a brand-new conversation.
    #[arg(short, long, default_value = DEFAULT_AGENT)]
    agent: String,

    /// Print the agent tree to stdout instead of launching the TUI.
    #[arg(long)]
    dump: bool,

    /// Append a line per applied event to this file.
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Write diagnostics to this file (filtered by RUST_LOG, default info).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if let Some(ref path) = cli.log_file {
        init_tracing(path)?;
    }

    let event_log = match cli.event_log {
        Some(ref path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Failed to open event log {}", path.display()))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let mut app = App::new(cli.agent.clone(), event_log);
    app.source_label = cli.events.as_ref().map(|p| p.display().to_string());

    // A followed capture is replayed through its tailer so no frame falls
    // between the replay and the first poll.
    let tailer = match cli.events {
        Some(ref path) => app.load_capture(path, cli.follow && !cli.dump, cli.live_only)?,
        None => None,
    };

    if cli.dump {
        dump_tree(&app.tracker);
        println!();
        println!("{} transcript messages", app.transcript.len());
        return Ok(());
    }

    // Launch TUI.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_tui(&mut terminal, &mut app, tailer);

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

fn init_tracing(path: &Path) -> Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("Failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_tui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut tailer: Option<EventTailer>,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<AppEvent>();

    // Spawn input reader thread.
    events::spawn_input_reader(tx.clone());

    // Spawn tick timer (250ms).
    events::spawn_tick_timer(tx.clone(), Duration::from_millis(250));

    // Wake up as soon as the capture is written; the tick is the fallback.
    let _capture_watcher = match tailer {
        Some(ref t) => {
            let tx_capture = tx.clone();
            let watched = t.path().to_path_buf();
            let mut watcher = notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
                if let Ok(event) = res {
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                        && event.paths.iter().any(|p| p.file_name() == watched.file_name())
                    {
                        let _ = tx_capture.send(AppEvent::CaptureChanged);
                    }
                }
            })?;
            let dir = t
                .path()
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            Some(watcher)
        }
        None => None,
    };

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(AppEvent::Key(key)) => app.handle_key(key),
            Ok(AppEvent::Mouse(mouse)) => app.handle_mouse(mouse),
            Ok(AppEvent::CaptureChanged) | Ok(AppEvent::Tick) => {
                if let Some(ref mut t) = tailer {
                    app.drain(t);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn dump_tree(tracker: &AgentTracker) {
    println!(
        "Agents: {} (current: {}, resumable: {})",
        tracker.nodes().len(),
        tracker.current_agent_name().unwrap_or("-"),
        tracker.has_active_conversation(),
    );

    let mut printed = std::collections::HashSet::new();
    for root in tracker.nodes().iter().filter(|n| {
        n.parent_id
            .as_deref()
            .map_or(true, |p| tracker.node(p).is_none())
    }) {
        print_agent(tracker, &root.id, 1, &mut printed);
    }
    // Anything only reachable through a parent cycle.
    for node in tracker.nodes() {
        if !printed.contains(&node.id) {
            print_agent(tracker, &node.id, 1, &mut printed);
        }
    }
}

fn print_agent(
    tracker: &AgentTracker,
    id: &str,
    indent: usize,
    printed: &mut std::collections::HashSet<String>,
) {
    if !printed.insert(id.to_string()) {
        return;
    }
    let Some(node) = tracker.node(id) else {
        return;
    };
    let pad = "  ".repeat(indent);
    println!(
        "{}{} {} [{}] {} ({}s)",
        pad,
        tracker.visual_status(node).glyph(),
        node.agent_name,
        tracker.visual_status(node),
        node.prompt_preview(60),
        node.elapsed().num_seconds(),
    );
    for child in tracker.children_of(id) {
        print_agent(tracker, &child.id, indent + 2, printed);
    }
}
