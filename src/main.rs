// What you SEE now:
// • A window with both round eye panels side by side (or nothing, with --headless).
// • A short splash, then the eyes either follow the closest object the depth
//   sensor reports or wander around with random saccades.
// • The right eye carries a debug overlay: the raw 8x8 depth grid (near = dark,
//   tracked zone red), a green + where the eyes are heading, state and FPS.
// • ESC or closing the window quits.
//
// `tof-eyes convert in.png out.bin` turns any picture into eye art.

mod app;
mod config;
mod display;
mod error;
mod fixed;
mod mask;
mod motion;
mod overlay;
mod palette;
mod render;
mod sensor;
mod texture;
mod tracker;
mod types;

use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use app::EyeRig;
use config::{Config, DEFAULT_TEXTURE_SIZE};
use display::{DisplaySink, MemorySink, WindowSink};
use error::{Error, Result};
use fixed::FixedStep;
use render::EYELID_CLOSED;
use sensor::{build_sensor, init_with_retry, GridRecorder, SensorKind};

#[derive(Parser, Debug)]
#[command(name = "tof-eyes", version, about = "Animatronic eyes that follow the closest thing a ToF sensor sees")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Debug-level logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the eyes (default)
    Run(RunArgs),
    /// Resize a picture and write it as raw little-endian RGB565
    Convert(ConvertArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SensorChoice {
    /// Calibration pattern hopping across the grid
    Simulated,
    /// JSON-lines recording given with --replay
    Replay,
    /// No sensor; the eyes only idle
    Disabled,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Where depth grids come from
    #[arg(long, value_enum, default_value_t = SensorChoice::Simulated)]
    sensor: SensorChoice,

    /// Recording to play back with --sensor replay
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Append every depth grid to a JSON-lines file
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    idle_texture: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    tracking_texture: Option<PathBuf>,

    /// Smoothing gain in (0, 1]; higher = snappier eyes
    #[arg(long)]
    gain: Option<f32>,

    /// Ignore anything farther than this (mm)
    #[arg(long, value_name = "MM")]
    max_distance: Option<u16>,

    /// Eyelid closure, 0 (open) ..= 128 (shut)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=EYELID_CLOSED as i64))]
    eyelid: u8,

    /// Draw the eye art at this many pixels across instead of 1:1
    #[arg(long, value_name = "PX")]
    eye_size: Option<u32>,

    /// Fixed RNG seed for reproducible saccades
    #[arg(long)]
    seed: Option<u64>,

    /// Hide the depth grid / FPS overlay
    #[arg(long)]
    no_debug_grid: bool,

    /// No window; frames go to memory
    #[arg(long)]
    headless: bool,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Frame rate cap
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Exit instead of re-launching when the sensor never comes up
    #[arg(long)]
    no_restart: bool,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    input: PathBuf,
    output: PathBuf,
    #[arg(long, default_value_t = DEFAULT_TEXTURE_SIZE as u32)]
    width: u32,
    #[arg(long, default_value_t = DEFAULT_TEXTURE_SIZE as u32)]
    height: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.unwrap_or(Commands::Run(cli.run)) {
        Commands::Run(args) => run(args),
        Commands::Convert(args) => texture::convert_image(&args.input, &args.output, args.width, args.height),
    }
}

/// RUST_LOG if set, otherwise info (debug with --verbose).
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(args: &RunArgs) -> Config {
    let base = Config::default();
    let idle = args.idle_texture.clone().unwrap_or(base.idle_texture.clone());
    let tracking = args.tracking_texture.clone().unwrap_or(base.tracking_texture.clone());

    let mut cfg = base
        .with_textures(idle, tracking)
        .with_eyelid_level(args.eyelid)
        .with_debug_grid(!args.no_debug_grid)
        .with_saccade_seed(args.seed);
    if let Some(gain) = args.gain {
        cfg = cfg.with_gain(gain);
    }
    if let Some(mm) = args.max_distance {
        cfg = cfg.with_max_distance_mm(mm);
    }
    if let Some(px) = args.eye_size {
        let src = cfg.render.texture_width as u32;
        cfg = cfg.with_texture_scale(FixedStep::from_ratio(src, px));
    }
    cfg
}

fn sensor_kind(args: &RunArgs) -> Result<SensorKind> {
    match (args.sensor, &args.replay) {
        (SensorChoice::Simulated, _) => Ok(SensorKind::Simulated),
        (SensorChoice::Disabled, _) => Ok(SensorKind::Disabled),
        (SensorChoice::Replay, Some(path)) => Ok(SensorKind::Replay(path.clone())),
        (SensorChoice::Replay, None) => Err(Error::Config("--sensor replay needs --replay <FILE>".into())),
    }
}

fn run(args: RunArgs) -> Result<()> {
    /* --- Configuration ---
       Visual: nothing yet; bad values stop us before any window opens. */
    let cfg = build_config(&args);
    cfg.validate()?;

    /* --- Sensor bring-up ---
       Visual: a few seconds of nothing if the sensor is slow to answer. */
    let mut sensor = build_sensor(&sensor_kind(&args)?, &cfg.sensor);
    if let Err(e) = init_with_retry(sensor.as_mut(), cfg.sensor.init_attempts, cfg.sensor.init_retry_delay) {
        error!(error = %e, "Sensor never came up");
        if !e.needs_restart() || args.no_restart {
            return Err(e);
        }
        restart();
    }

    /* --- Display + rig ---
       Visual: the preview window opens (one panel per eye). */
    let (w, h) = (cfg.render.panel_width, cfg.render.panel_height);
    let frame_time = Duration::from_secs(1) / args.fps.max(1);
    let now = Instant::now();
    if args.headless {
        let sink = MemorySink::new(cfg.channels, w, h);
        let rig = EyeRig::new(cfg, sensor, sink, now)?;
        let rig = run_loop(attach_recorder(rig, &args)?, &args, frame_time)?;
        info!(selects = rig.sink().selects(), presents = rig.sink().presents(), "Headless frames delivered");
    } else {
        let sink = WindowSink::new("ToF Eyes", cfg.channels, w, h)?;
        let rig = EyeRig::new(cfg, sensor, sink, now)?;
        run_loop(attach_recorder(rig, &args)?, &args, frame_time)?;
    }
    Ok(())
}

fn attach_recorder<S: DisplaySink>(rig: EyeRig<S>, args: &RunArgs) -> Result<EyeRig<S>> {
    Ok(match &args.record {
        Some(path) => rig.with_recorder(GridRecorder::create(path)?),
        None => rig,
    })
}

fn run_loop<S: DisplaySink>(mut rig: EyeRig<S>, args: &RunArgs, frame_time: Duration) -> Result<EyeRig<S>> {
    /* --- Splash ---
       Visual: "TOF EYES" on both panels for a moment. */
    rig.splash()?;
    thread::sleep(rig.config().overlay.splash_duration);

    /* ------------------------------ Main loop ------------------------------ */
    info!("Entering main loop");
    let mut ticks: u64 = 0;
    while rig.is_open() && args.ticks.is_none_or(|limit| ticks < limit) {
        let now = Instant::now();

        // Visual: eyes move one smoothing step and both panels repaint.
        rig.tick(now)?;
        ticks += 1;

        // Visual: steady frame rate instead of a busy loop.
        let spent = now.elapsed();
        if spent < frame_time {
            thread::sleep(frame_time - spent);
        }
    }

    rig.finish()?;
    let target = rig.target();
    info!(
        ticks,
        state = rig.motion().state().as_str(),
        target_valid = target.is_valid,
        target_x = target.x,
        target_y = target.y,
        distance_mm = target.distance_mm,
        score = target.score,
        "Stopped"
    );
    Ok(rig)
}

/// Start a fresh copy of ourselves with the same arguments, then bail out.
fn restart() -> ! {
    let relaunch = std::env::current_exe()
        .and_then(|exe| process::Command::new(exe).args(std::env::args_os().skip(1)).spawn());
    match relaunch {
        Ok(child) => warn!(pid = child.id(), "Restarting"),
        Err(e) => error!(error = %e, "Restart failed"),
    }
    process::exit(1);
}
