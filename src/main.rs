#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use tracing::{Level as TraceLevel, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use screen_timer::display::{DisplaySink, LogDisplay, X11Overlay};
use screen_timer::event::{Event, Signal};
use screen_timer::history::{History, format_duration};
use screen_timer::ipc::{
    ControlClient, ControlRequest, ControlResponse, ControlServer, default_socket_path,
    spawn_control_listener,
};
use screen_timer::probe::X11Probe;
use screen_timer::router::Router;
use screen_timer::schedule::SystemClock;
use screen_timer::store::{JsonFileStore, Value};
use screen_timer::tracker::Tracker;

/// Screen-time awareness daemon with an escalating on-screen counter
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Control socket of the daemon
    #[arg(long, global = true, env = "SCREEN_TIMER_SOCKET")]
    socket: Option<PathBuf>,

    /// Settings and counter store (JSON)
    #[arg(long, global = true, env = "SCREEN_TIMER_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tracking daemon (default)
    Run {
        /// Count without showing the overlay
        #[arg(long)]
        headless: bool,
    },

    /// Deliver a system notification to the daemon
    Signal {
        #[arg(value_enum)]
        signal: Signal,
    },

    /// Show the daemon's tracking state
    Status,

    /// Change one setting, e.g. `set level_1_font_size 30`
    Set { key: String, value: String },

    /// Choose a level's position ("Top Left" ... "Bottom Right", or "Custom")
    Position {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=3))]
        level: u8,
        anchor: String,
    },

    /// Print recorded daily totals, the average and the trend
    History,

    /// Ask the daemon to shut down
    Stop,
}

fn init_tracing() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let socket_path = match cli.socket {
        Some(path) => path,
        None => default_socket_path()?,
    };
    let store_path = cli.store.unwrap_or_else(JsonFileStore::default_path);

    match cli.command.unwrap_or(Command::Run { headless: false }) {
        Command::Run { headless } => run_daemon(&store_path, socket_path, headless),
        Command::Signal { signal } => send(&socket_path, ControlRequest::Signal(signal)),
        Command::Status => send(&socket_path, ControlRequest::Status),
        Command::Set { key, value } => send(
            &socket_path,
            ControlRequest::SetSetting {
                key,
                value: Value::parse_loose(&value),
            },
        ),
        Command::Position { level, anchor } => send(
            &socket_path,
            ControlRequest::SelectPosition {
                level,
                position: anchor,
            },
        ),
        Command::History => print_history(&store_path),
        Command::Stop => send(&socket_path, ControlRequest::Shutdown),
    }
}

fn run_daemon(store_path: &Path, socket_path: PathBuf, headless: bool) -> Result<()> {
    let store = JsonFileStore::open(store_path)?;
    info!(path = %store.path().display(), "Opened store");

    let (events_tx, events_rx) = mpsc::channel();

    // Accounting has value on its own, so a missing overlay is not fatal
    let display: Box<dyn DisplaySink> = if headless {
        info!("Running headless");
        Box::new(LogDisplay::new())
    } else {
        match X11Overlay::connect(events_tx.clone()) {
            Ok(overlay) => Box::new(overlay),
            Err(e) => {
                error!(error = ?e, "Overlay unavailable, counting without it");
                Box::new(LogDisplay::new())
            }
        }
    };

    let server = ControlServer::bind_to(socket_path.clone())?;
    let _listener = spawn_control_listener(server, events_tx.clone());
    install_signal_handlers(events_tx)?;

    let mut tracker = Tracker::new(store, display, Box::new(SystemClock));
    if headless {
        info!("No screen state probe, counting until told otherwise");
    } else {
        match X11Probe::connect() {
            Ok(probe) => tracker = tracker.with_probe(Box::new(probe)),
            Err(e) => warn!(error = ?e, "Screen state probe unavailable, counting until told otherwise"),
        }
    }
    tracker.start();
    let tracker = Router::new(tracker, events_rx).run();

    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!(socket = %socket_path.display(), error = %e, "Failed to remove control socket");
    }
    info!(seconds = tracker.state().accumulated_seconds, "Daemon exited");
    Ok(())
}

/// SIGINT/SIGTERM become a shutdown event so the tracker persists before exit
fn install_signal_handlers(events: Sender<Event>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "Received termination signal");
            events.send(Event::Shutdown).ok();
        }
    });
    Ok(())
}

fn send(socket_path: &Path, request: ControlRequest) -> Result<()> {
    let mut client = ControlClient::connect_to(socket_path)?;
    match client.request(&request)? {
        ControlResponse::Ack | ControlResponse::Pong => {
            println!("ok");
            Ok(())
        }
        ControlResponse::Status(status) => {
            println!("{}  (level {})", status.display_text, status.level);
            println!(
                "screen {}, {}",
                if status.screen_on { "on" } else { "off" },
                if status.unlocked { "unlocked" } else { "locked" }
            );
            println!(
                "overlay {}{}",
                if status.timer_visible { "visible" } else { "hidden" },
                if status.blinking { ", blinking" } else { "" }
            );
            println!("counter key {}", status.counter_key);
            if let Some(next) = status.next_reset {
                println!("next reset {next}");
            }
            Ok(())
        }
        ControlResponse::Error(message) => bail!("Daemon refused the request: {message}"),
    }
}

fn print_history(store_path: &Path) -> Result<()> {
    let store = JsonFileStore::open(store_path)?;
    let history = History::load(&store);
    if history.days.is_empty() {
        println!("No screen time recorded yet");
        return Ok(());
    }

    for day in &history.days {
        println!("{}  {}", day.date, format_duration(day.seconds));
    }
    if let Some(average) = history.average_seconds() {
        println!("Daily average: {}", format_duration(average));
    }
    if let Some(trend) = history.trend() {
        println!("Trend: {trend}");
    }
    if let Some(assessment) = history.assessment() {
        println!("{assessment}");
    }
    Ok(())
}
