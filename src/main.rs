mod tui;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};

use basalt::audio;
use basalt::audio_api::AudioOut;
use basalt::events::LocalBus;
use basalt::pipeline::params::{patch_from_pairs, Patch};
use basalt::pipeline::persistence;
use basalt::shared::BusId;
use basalt::{Context, Controller};
use tui::command::{self, HostCommand};
use tui::input::InputEvent;

#[derive(Parser)]
#[command(name = "basalt")]
#[command(about = "Breakbeat slice sequencer with live patching", long_about = None)]
struct Args {
    /// WAV file to slice
    sample: PathBuf,

    /// Initial parameters as key=value, applied last
    params: Vec<String>,

    /// JSON object of parameters, applied before key=value arguments
    #[arg(long = "params", value_name = "FILE")]
    params_file: Option<PathBuf>,

    /// Output bus
    #[arg(short, long, default_value = "0")]
    bus: u8,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Session directory (default: current directory)
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// the terminal is in raw mode, so logs go to <dir>/.basalt/basalt.log
fn init_logging(dir: &std::path::Path, verbose: bool) -> anyhow::Result<()> {
    let path = persistence::basalt_dir(dir)?.join(persistence::LOG_FILE);
    let file = std::fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .init();
    Ok(())
}

// defaults <- saved session <- --params file <- key=value
fn initial_params(args: &Args, dir: &std::path::Path) -> anyhow::Result<Patch> {
    let mut params = persistence::load_session(dir).unwrap_or_default();
    if let Some(path) = &args.params_file {
        params.extend(persistence::load_patch(path)?);
    }
    params.extend(patch_from_pairs(args.params.iter().map(String::as_str)));
    Ok(params)
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let dir = match &args.dir {
        Some(d) => d.clone(),
        None => std::env::current_dir()?,
    };
    init_logging(&dir, args.verbose)?;
    let mut params = initial_params(&args, &dir)?;

    let audio: Rc<dyn AudioOut> = Rc::new(audio::start_audio()?);
    let bus = LocalBus::new();
    let launch = |params: &Patch| -> anyhow::Result<Controller> {
        basalt::start(Context {
            audio: audio.clone(),
            params: params.clone(),
            sample: args.sample.clone(),
            bus: BusId(args.bus),
            events: Some(&bus),
        })
    };
    terminal::enable_raw_mode()?;
    // Enable keyboard enhancement for real press/release detection.
    // Falls back to a plain space as the release if the terminal can't.
    let reports_release = terminal::supports_keyboard_enhancement().unwrap_or(false);
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let mut ctrl = launch(&params)?;

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let mut tui_state = tui::mode::TuiState {
        reports_release,
        ..Default::default()
    };
    if !reports_release {
        warn!("terminal has no key release events; plain space ends a hold");
    }
    tui_state.push_log(format!("{} loaded. {}", args.sample.display(), command::HELP));

    let poll_rate = Duration::from_millis(10);
    loop {
        ctrl.tick();
        let ds = ctrl.display();
        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        let events = tui::input::poll_input(poll_rate, &mut tui_state, &bus)?;
        for event in events {
            let line = match event {
                InputEvent::Quit => return quit(&dir, &ctrl, &params),
                InputEvent::Line(line) => line,
            };
            tui_state.push_log(format!("> {line}"));
            match command::parse(&line) {
                Ok(None) => {}
                Ok(Some(HostCommand::Quit)) => return quit(&dir, &ctrl, &params),
                Ok(Some(HostCommand::Help)) => tui_state.push_log(command::HELP),
                Ok(Some(HostCommand::Stop)) => {
                    params = ctrl.session();
                    ctrl.stop();
                    tui_state.push_log("stopped");
                }
                Ok(Some(HostCommand::Start)) => {
                    if ctrl.is_running() {
                        tui_state.push_log("already running");
                        continue;
                    }
                    match launch(&params) {
                        Ok(c) => {
                            ctrl = c;
                            tui_state.push_log("started");
                        }
                        Err(e) => tui_state.push_log(format!("start failed: {e:#}")),
                    }
                }
                Ok(Some(HostCommand::Set(patch))) => {
                    for key in command::unknown_keys(&patch) {
                        tui_state.push_log(format!("ignored unknown key '{key}'"));
                    }
                    if ctrl.update(&patch) {
                        params = ctrl.session();
                    } else {
                        // kept for the next start
                        params.extend(patch);
                        tui_state.push_log("not running; applies on start");
                    }
                }
                Err(e) => tui_state.push_log(format!("{e}")),
            }
        }
    }
}

// save before quitting; a stopped instrument may have patches waiting
fn quit(dir: &std::path::Path, ctrl: &Controller, pending: &Patch) -> anyhow::Result<()> {
    let session = if ctrl.is_running() { ctrl.session() } else { pending.clone() };
    if let Err(e) = persistence::save_session(dir, &session) {
        warn!("could not save session: {e:#}");
    }
    info!("bye");
    Ok(())
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
