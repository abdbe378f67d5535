use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use clap::{Parser, Subcommand};
use route_reveal_core::{
    flatten_all, install_scene, load_feature_collection, point_features, route_features,
    AnimationPlan, AnimationSupervisor, FrameClock, PointFeature, RecordingRenderer, RevealConfig,
    RevealError, RouteFeature, SimulatedClock, WallClock,
};
use tracing_subscriber::EnvFilter;

fn main() -> route_reveal_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Plan { routes } => run_plan(&config, routes.as_deref()),
        Commands::Simulate {
            routes,
            points,
            fps,
            speed,
            stop_after,
            realtime,
        } => run_simulate(
            &config,
            routes.as_deref(),
            points.as_deref(),
            Playback {
                fps,
                speed,
                stop_after,
                realtime,
            },
        ),
    }
}

fn load_config(path: Option<&Path>) -> route_reveal_core::Result<RevealConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration file");
            RevealConfig::from_path(path)
        }
        None => RevealConfig::from_env(),
    }
}

fn run_plan(config: &RevealConfig, routes: Option<&str>) -> route_reveal_core::Result<()> {
    let source = match routes {
        Some(source) => source,
        None => config.data.routes_source()?,
    };
    let collection = load_feature_collection(source)?;
    let report = flatten_all(&route_features(&collection));
    if !report.skipped.is_empty() {
        tracing::warn!(skipped = report.skipped.len(), "some routes cannot be animated");
    }

    let plan = AnimationPlan::for_routes(&report.routes, &config.animation);
    tracing::info!(routes = plan.len(), total_ms = plan.total_ms(), "campaign planned");
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Frame pacing for `simulate`.
struct Playback {
    fps: u32,
    speed: Option<f64>,
    stop_after: Option<f64>,
    realtime: bool,
}

fn run_simulate(
    config: &RevealConfig,
    routes: Option<&str>,
    points: Option<&str>,
    playback: Playback,
) -> route_reveal_core::Result<()> {
    if playback.fps == 0 {
        return Err(RevealError::config("--fps must be at least 1"));
    }

    let routes_source = match routes {
        Some(source) => source,
        None => config.data.routes_source()?,
    };
    let routes = route_features(&load_feature_collection(routes_source)?);
    let points = load_points(config, points);

    let mut renderer = RecordingRenderer::new();
    let scene = install_scene(&mut renderer, &routes, &points, &config.map)?;
    tracing::info!(categories = ?scene.categories, "route categories");

    let frame_ms = 1000.0 / f64::from(playback.fps);
    if playback.realtime {
        animate(config, renderer, WallClock::start(), &routes, &playback, |_| {
            thread::sleep(Duration::from_secs_f64(frame_ms / 1000.0))
        })
    } else {
        animate(config, renderer, SimulatedClock::new(), &routes, &playback, |clock| {
            clock.advance(frame_ms)
        })
    }
}

/// Runs one campaign to the end, calling `next_frame` between ticks.
fn animate<C>(
    config: &RevealConfig,
    renderer: RecordingRenderer,
    clock: C,
    routes: &[RouteFeature],
    playback: &Playback,
    mut next_frame: impl FnMut(&C),
) -> route_reveal_core::Result<()>
where
    C: FrameClock + Clone,
{
    let mut supervisor = AnimationSupervisor::new(renderer, clock.clone(), config.animation);
    if let Some(seconds) = playback.speed {
        supervisor.set_speed(seconds)?;
    }

    let handle = supervisor.handle();
    let report = handle.start_collection(routes)?;
    if !report.skipped.is_empty() {
        tracing::warn!(skipped = report.skipped.len(), "some routes cannot be animated");
    }

    let mut frames = 0_u64;
    loop {
        let summary = handle.tick()?;
        frames += 1;
        if summary.is_idle() {
            break;
        }
        if playback.stop_after.is_some_and(|limit| clock.now_ms() >= limit) {
            tracing::info!(at_ms = clock.now_ms(), "stopping campaign early");
            handle.stop_all()?;
            handle.tick()?;
            break;
        }
        next_frame(&clock);
    }

    let updates = handle.with(|supervisor| supervisor.renderer().updates().len())?;
    tracing::info!(
        frames,
        elapsed_ms = clock.now_ms(),
        realtime = playback.realtime,
        animated = report.routes.len(),
        updates,
        "simulation finished"
    );
    Ok(())
}

/// Points are optional: any failure disables the markers and nothing else.
fn load_points(config: &RevealConfig, points: Option<&str>) -> Vec<PointFeature> {
    let configured = match points {
        Some(source) => Ok(source),
        None => config.data.points_source(),
    };
    let source = match configured {
        Ok(source) => source,
        Err(err) => {
            tracing::warn!(%err, "points layer disabled");
            return Vec::new();
        }
    };
    match load_feature_collection(source) {
        Ok(collection) => point_features(&collection),
        Err(err) => {
            tracing::warn!(source, %err, "points layer disabled");
            Vec::new()
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Staggered route reveal animations", long_about = None)]
struct Cli {
    /// JSON configuration file. Falls back to environment variables.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the start offset of every route as JSON.
    Plan {
        /// Routes document (path or URL). Defaults to ROUTES_DATA_URL.
        #[arg(short, long)]
        routes: Option<String>,
    },
    /// Run a full campaign against an in-memory map.
    Simulate {
        /// Routes document (path or URL). Defaults to ROUTES_DATA_URL.
        #[arg(short, long)]
        routes: Option<String>,
        /// Points document (path or URL). Defaults to POINTS_DATA_URL.
        #[arg(short, long)]
        points: Option<String>,
        /// Frames per second.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Per-route draw duration in seconds, overriding the configuration.
        #[arg(short, long)]
        speed: Option<f64>,
        /// Stop every animation once this many milliseconds have passed.
        #[arg(long)]
        stop_after: Option<f64>,
        /// Pace frames with the wall clock instead of a simulated one.
        #[arg(long)]
        realtime: bool,
    },
}
