use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, terminal,
};
use log::info;

use kazefx::commands::COMMANDS;
use kazefx::config;
use kazefx::external::{self, FeedSource};
use kazefx::host::SessionHost;
use kazefx::plugin::{ParticlePlugin, Plugin};
use kazefx::render::{Bitmap, ColorMode, Surface, halfblock};
use kazefx::script::{self, Script, Step};

/// Played when no script is given
const DEMO_SCRIPT: &str = include_str!("../demos/fireworks.toml");

#[derive(Parser)]
#[command(name = "kazefx", version, about = "Particle effect player for RPG event scripts")]
struct Cli {
    /// Timeline script (.toml); omit for the built-in demo
    script: Option<PathBuf>,

    /// Ticks per second (1-120)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Color mode
    #[arg(short, long, value_enum)]
    color: Option<ColorMode>,

    /// Game directory holding Picture/
    #[arg(short, long)]
    pictures: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    frames: Option<u64>,

    /// Run without a terminal and log statistics
    #[arg(long)]
    headless: bool,

    /// Read live JSON commands from "stdin" or a file that is watched for new lines
    #[arg(long)]
    feed: Option<String>,

    /// List plugin commands and exit
    #[arg(long)]
    list_commands: bool,

    /// Show config file path and a default config, then exit
    #[arg(long)]
    show_config: bool,

    /// Hide the status bar
    #[arg(long)]
    clean: bool,
}

/// Ticks a headless run makes when neither --frames nor the script says otherwise
const HEADLESS_TICKS: u64 = 600;

const COLOR_MODES: [ColorMode; 4] = [
    ColorMode::TrueColor,
    ColorMode::Ansi256,
    ColorMode::Ansi16,
    ColorMode::Mono,
];

fn main() -> kazefx::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config();

    if cli.show_config {
        match config::config_path() {
            Some(path) => println!("Config file: {}", path.display()),
            None => println!("Config file: (no config directory on this system)"),
        }
        println!();
        print!("{}", config::default_config_string());
        return Ok(());
    }

    if cli.list_commands {
        println!("Plugin commands (optionally prefixed with pfx_):");
        for &(name, args) in COMMANDS {
            println!("  {:<26} {}", name, args);
        }
        println!("\nHost commands: map_change, scroll dx dy");
        return Ok(());
    }

    init_logger(cli.headless, cfg.log.as_deref());

    let script = match &cli.script {
        Some(path) => Script::load(path)?,
        None => Script::parse(DEMO_SCRIPT)?,
    };
    let game_dir = cli
        .pictures
        .clone()
        .or_else(|| script.game_dir.clone())
        .or_else(|| cfg.pictures.clone());
    let mut session = Session {
        script,
        plugin: ParticlePlugin::new(),
        host: SessionHost::new(game_dir),
        feed: cli.feed.as_deref().map(|s| external::spawn_reader(FeedSource::parse(s))),
        tick: 0,
    };
    info!(
        "Playing '{}' ({} steps)",
        session.script.title.as_deref().unwrap_or("untitled"),
        session.script.steps.len()
    );

    let result = if cli.headless {
        run_headless(&mut session, &cli)
    } else {
        let fps = cli.fps.or(cfg.fps).unwrap_or(60).clamp(1, 120);
        let color = cli.color.or(cfg.color).unwrap_or(ColorMode::TrueColor);
        let clean = cli.clean || cfg.clean.unwrap_or(false);
        run_terminal(&mut session, &cli, fps, color, clean)
    };

    session.plugin.shutdown();
    result
}

/// Headless runs log to stderr; the terminal player logs to a file so the
/// screen stays clean.
fn init_logger(headless: bool, default_filter: Option<&str>) {
    let env = env_logger::Env::default().default_filter_or(default_filter.unwrap_or("warn"));
    let mut builder = env_logger::Builder::from_env(env);
    if !headless {
        let dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("kazefx");
        let file = std::fs::create_dir_all(&dir)
            .and_then(|_| std::fs::File::create(dir.join("kazefx.log")));
        match file {
            Ok(f) => {
                builder.target(env_logger::Target::Pipe(Box::new(f)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    builder.init();
}

/// Everything one playback needs.
struct Session {
    script: Script,
    plugin: ParticlePlugin,
    host: SessionHost,
    feed: Option<Receiver<Step>>,
    tick: u64,
}

impl Session {
    /// Run due script steps and live commands, then simulate and draw one tick.
    fn step(&mut self, frame: &mut dyn Surface) {
        for step in self.script.steps_at(self.tick) {
            script::apply(step, &mut self.plugin, &mut self.host);
        }
        if let Some(rx) = &self.feed {
            for step in rx.try_iter() {
                script::apply(&step, &mut self.plugin, &mut self.host);
            }
        }
        self.plugin.update(frame, &mut self.host);
        self.tick += 1;
    }

    fn tick_limit(&self, cli: &Cli) -> Option<u64> {
        cli.frames.or_else(|| {
            if cli.headless {
                // Play a non-repeating script to the end and let its effects finish
                Some(match self.script.repeat {
                    Some(n) if n > 0 => n,
                    _ => (self.script.length() + 1).max(HEADLESS_TICKS),
                })
            } else {
                None
            }
        })
    }
}

fn run_headless(session: &mut Session, cli: &Cli) -> kazefx::Result<()> {
    let limit = session.tick_limit(cli).unwrap_or(HEADLESS_TICKS);
    let mut frame = Bitmap::new(session.script.width, session.script.height);
    let start = Instant::now();
    let mut peak = 0;

    while session.tick < limit {
        frame.clear();
        session.step(&mut frame);
        let live = session.plugin.registry().particle_count();
        peak = peak.max(live);
        if session.tick % 60 == 0 {
            info!(
                "tick {}: {} effects, {} particles",
                session.tick,
                session.plugin.registry().len(),
                live
            );
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "{} ticks in {:.3}s ({:.0} ticks/s), peak {} particles, {} live at end",
        session.tick,
        elapsed,
        session.tick as f64 / elapsed.max(f64::EPSILON),
        peak,
        session.plugin.registry().particle_count()
    );
    Ok(())
}

fn run_terminal(
    session: &mut Session,
    cli: &Cli,
    fps: u32,
    color: ColorMode,
    clean: bool,
) -> kazefx::Result<()> {
    // Setup terminal
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;

    let mut writer = BufWriter::with_capacity(256 * 1024, stdout);
    let result = run_loop(&mut writer, session, cli, fps, color, clean);

    // Cleanup
    execute!(writer, cursor::Show, terminal::LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;

    result
}

/// Terminal cells scaled to the game screen: one column per pixel column
/// span, two pixel rows per text row.
fn view_size(cols: u16, rows: u16, hide_status: bool) -> (usize, usize) {
    let rows = if hide_status { rows } else { rows.saturating_sub(1) };
    (cols as usize, rows as usize * 2)
}

fn run_loop(
    stdout: &mut BufWriter<io::Stdout>,
    session: &mut Session,
    cli: &Cli,
    fps: u32,
    mut color_mode: ColorMode,
    mut hide_status: bool,
) -> kazefx::Result<()> {
    let frame_dur = Duration::from_secs_f64(1.0 / fps as f64);
    let limit = session.tick_limit(cli);
    let title = session.script.title.clone().unwrap_or_else(|| "kazefx".into());

    let (mut cols, mut rows) = terminal::size()?;
    let (vw, vh) = view_size(cols, rows, hide_status);
    let mut view = Bitmap::new(vw, vh);
    let mut frame = Bitmap::new(session.script.width, session.script.height);

    let mut frame_count: u64 = 0;
    let mut actual_fps: f64 = 0.0;
    let mut fps_update = Instant::now();
    let mut paused = false;
    let mut rebuild_view = false;

    loop {
        // Handle input (non-blocking)
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Resize(w, h) => {
                    if w >= 10 && h >= 5 {
                        cols = w;
                        rows = h;
                        rebuild_view = true;
                    }
                }
                Event::Key(KeyEvent { code, .. }) => match code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(' ') => paused = !paused,
                    // Host map transfer
                    KeyCode::Char('m') => session.plugin.on_map_change(),
                    // Cycle color mode
                    KeyCode::Char('c') => {
                        let idx = COLOR_MODES.iter().position(|&m| m == color_mode).unwrap_or(0);
                        color_mode = COLOR_MODES[(idx + 1) % COLOR_MODES.len()];
                    }
                    // Toggle status bar
                    KeyCode::Char('h') => {
                        hide_status = !hide_status;
                        rebuild_view = true;
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        if rebuild_view {
            let (vw, vh) = view_size(cols, rows, hide_status);
            view = Bitmap::new(vw, vh);
            write!(stdout, "\x1b[2J\x1b[H")?;
            stdout.flush()?;
            rebuild_view = false;
        }

        let tick_start = Instant::now();
        if !paused {
            frame.clear();
            session.step(&mut frame);
            if limit.is_some_and(|n| session.tick >= n) {
                return Ok(());
            }
        }

        // Fit the game screen into the terminal
        view.clear();
        let dst = view.rect();
        view.stretch_blit(dst, &frame, 255);
        stdout.write_all(b"\x1b[H")?;
        stdout.write_all(halfblock::render(&view, color_mode).as_bytes())?;

        // Status bar
        frame_count += 1;
        if fps_update.elapsed() >= Duration::from_secs(1) {
            actual_fps = frame_count as f64 / fps_update.elapsed().as_secs_f64();
            frame_count = 0;
            fps_update = Instant::now();
        }
        if !hide_status {
            let pause_indicator = if paused { " [PAUSED]" } else { "" };
            let status = format!(
                " {} | tick {} | {} effects | {} particles | {:?} | {:.0} fps{} | [space] pause  [m] map change  [c] color  [h] hide  [q] quit ",
                title,
                session.tick,
                session.plugin.registry().len(),
                session.plugin.registry().particle_count(),
                color_mode,
                actual_fps,
                pause_indicator,
            );
            let w = cols as usize;
            let truncated: String = status.chars().take(w).collect();
            let padded = format!("{:<width$}", truncated, width = w);
            write!(stdout, "\x1b[{};1H\x1b[7m{}\x1b[0m", rows, padded)?;
        }

        // Single flush per frame
        stdout.flush()?;

        // Sleep to target FPS
        let elapsed = tick_start.elapsed();
        if elapsed < frame_dur {
            std::thread::sleep(frame_dur - elapsed);
        }
    }
}
