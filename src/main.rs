mod middle;
mod shared;
mod tui;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use neurodark::audio;
use neurodark::config::EngineConfig;
use neurodark::pipeline::{self, render_session, Bpm, RenderOptions, SequencerHandle, Session};

use middle::Middle;
use shared::InputEvent;

const LOG_FILE: &str = "neurodark.log";
const RENDER_FILE: &str = "neurodark.wav";
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "neurodark", about = "Acid bass step sequencer")]
struct Cli {
    /// JSON engine config; missing keys fall back to defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the sequencer on the default output device (the default)
    Play,
    /// Bounce the demo session to a WAV file
    Render {
        /// Passes over the whole pattern
        #[arg(long, default_value_t = 1)]
        reps: usize,
        #[arg(long, default_value = RENDER_FILE)]
        out: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => {
            // the terminal belongs to the TUI, so logs go to a file
            let log = File::create(LOG_FILE).with_context(|| format!("creating {LOG_FILE}"))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(Mutex::new(log))
                .with_ansi(false)
                .init();
            play(&config)
        }
        Command::Render { reps, out } => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .init();
            let session = Session::demo(Bpm::new(config.bpm)?);
            render_to(&session, &config, reps, &out)
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn render_to(session: &Session, config: &EngineConfig, reps: usize, out: &Path) -> anyhow::Result<()> {
    let audio = render_session(session, &RenderOptions::from_config(config, reps));
    audio.write_wav(out).with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), secs = audio.duration_secs(), peak = audio.peak(), "render written");
    Ok(())
}

fn play(config: &EngineConfig) -> anyhow::Result<()> {
    let bpm = Bpm::new(config.bpm)?;
    let live = match audio::start_live(config) {
        Ok(live) => live,
        Err(e) => {
            error!("audio output unavailable: {e}");
            return Err(e).context("starting audio output");
        }
    };
    let engine = live.engine().clone();

    let (visual_tx, mut visual_rx) = pipeline::visual_channel();
    let sequencer = pipeline::spawn(engine.clone(), Session::demo(bpm), config, visual_tx)?;
    let mut middle = Middle::default();

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps
    let blink_start = Instant::now();

    loop {
        let blink_on = (blink_start.elapsed().as_millis() / 125) % 2 == 0;
        if let Some(event) = visual_rx.poll(engine.current_time()) {
            middle.on_visual(event);
        }
        let state = sequencer.state();
        let ds = middle.display_state(&state);

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, blink_on);
        })?;

        for event in tui::input::poll_input(tick_rate)? {
            match event {
                InputEvent::Quit => {
                    drop(term);
                    drop(sequencer);
                    drop(live);
                    return Ok(());
                }
                InputEvent::Render => render_live(&sequencer, config, &mut middle),
                event => {
                    for cmd in middle.handle_input(event, &state) {
                        if !sequencer.send(cmd) {
                            middle.set_message("SEQUENCER STOPPED");
                        }
                    }
                }
            }
        }
    }
}

fn render_live(sequencer: &SequencerHandle, config: &EngineConfig, middle: &mut Middle) {
    let Some(session) = sequencer.snapshot(SNAPSHOT_TIMEOUT) else {
        middle.set_message("RENDER FAILED");
        return;
    };
    match render_to(&session, config, 1, Path::new(RENDER_FILE)) {
        Ok(()) => middle.set_message(format!("RENDERED {RENDER_FILE}")),
        Err(e) => {
            error!("render failed: {e:#}");
            middle.set_message("RENDER FAILED");
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
