//! SetuSLAM daemon
//!
//! Runs a SLAM session for one or more agents:
//! - **Input**: live sensor channels, or a recorded sensor log (`--replay`)
//! - **Output**: map → odom corrections, fiducial markers and graph snapshots
//! - **Control**: operator commands on stdin (`pause`, `close`, `save <path>`, ...)
//!
//! # Usage
//!
//! ```text
//! setu-slam --config setu-slam.toml
//! setu-slam --replay run.slog --speed 2.0
//! setu-slam --map maps/office.setu --start-at-dock
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::Receiver;

use setu_slam::config::SlamConfig;
use setu_slam::io::broadcast::{Broadcast, ChannelBroadcaster};
use setu_slam::session::{OdometryBuffer, SlamNode};
use setu_slam::state::create_command_channel;
use setu_slam::threads::{
    ConsoleThread, ReplayThread, SlamThread, TransformThread, VisualizationThread,
    create_sensor_channels,
};
use setu_slam::utils::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "setu-slam", version, about = "Multi-agent SLAM session coordinator")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session archive to restore at startup
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Resume the restored map with the robot on its first node
    #[arg(long)]
    start_at_dock: bool,

    /// Sensor log to replay instead of live input
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Replay speed multiplier (0 = as fast as possible)
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Ignore stdin commands
    #[arg(long)]
    no_console: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let config = load_config(&args);

    log::info!("setu-slam starting");
    log::info!("  Map frame: {}", config.frames.map_frame);
    log::info!("  Agents: {}", config.frames.base_frames.join(", "));
    if let Some(ref replay) = args.replay {
        log::info!("  Input: sensor log {} ({}x)", replay.display(), args.speed);
    }
    if let Some(ref map) = config.startup.map_file_name {
        log::info!("  Startup map: {}", map);
    }
    log::info!(
        "  Interactive editing: {}",
        if config.interactive.enable_interactive_mode {
            "enabled"
        } else {
            "disabled"
        }
    );

    let running = match install_shutdown_handler() {
        Ok(running) => running,
        Err(e) => {
            log::error!("Error setting Ctrl-C handler: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_daemon(config, &args, running) {
        log::error!("Daemon error: {}", e);
        std::process::exit(1);
    }

    log::info!("setu-slam shutdown complete");
}

/// Config file, with command line overrides for the startup map.
fn load_config(args: &Args) -> SlamConfig {
    let mut config = SlamConfig::discover(args.config.as_deref());
    if let Some(ref map) = args.map {
        config.startup.map_file_name = Some(map.display().to_string());
    }
    if args.start_at_dock {
        config.startup.map_start_at_dock = true;
        config.startup.map_start_pose = None;
    }
    config
}

// ============================================================================
// Multi-Threaded Daemon
// ============================================================================

fn run_daemon(
    config: SlamConfig,
    args: &Args,
    running: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Initializing SLAM daemon...");

    // 1. Outbound broadcast queue
    let (broadcaster, broadcast_rx) = ChannelBroadcaster::new(config.publish.broadcast_capacity);
    log::info!("  Broadcast queue created ({} slots)", config.publish.broadcast_capacity);

    // 2. Odometry history shared by the SLAM thread and the session
    let odometry = Arc::new(OdometryBuffer::new(
        config.publish.tf_buffer_duration,
        config.publish.transform_timeout,
    ));

    // 3. Session
    let node = Arc::new(SlamNode::with_defaults(
        config,
        odometry.clone(),
        Arc::new(broadcaster),
    )?);
    log::info!("  Session initialized");

    // 4. Channels
    let (command_tx, command_rx) = create_command_channel();
    let (sensor_tx, sensor_rx) = create_sensor_channels();
    log::info!("  Command and sensor channels created");

    // 5. Threads
    log::info!("Spawning threads...");
    let slam_thread = SlamThread::spawn(
        node.clone(),
        sensor_rx,
        command_rx,
        odometry,
        running.clone(),
    )?;
    let transform_thread = TransformThread::spawn(node.clone(), running.clone())?;
    let visualization_thread = VisualizationThread::spawn(node.clone(), running.clone())?;
    let sink_thread = spawn_broadcast_sink(broadcast_rx, running.clone())?;

    // Live producers attach to the held senders; a replay owns them.
    let (replay_thread, _live_senders) = match args.replay.clone() {
        Some(path) => (
            Some(ReplayThread::spawn(path, args.speed, sensor_tx, running.clone())?),
            None,
        ),
        None => (None, Some(sensor_tx)),
    };

    if !args.no_console {
        ConsoleThread::spawn(command_tx)?;
    }

    log::info!("SLAM daemon running");

    // 6. Wait for shutdown signal (main thread just monitors)
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutdown signal received, waiting for threads...");

    // 7. Join threads
    let mut fatal = None;
    match slam_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => fatal = Some(e),
        Err(e) => log::error!("SLAM thread panicked: {:?}", e),
    }
    if let Some(thread) = transform_thread
        && let Err(e) = thread.join()
    {
        log::error!("Transform thread panicked: {:?}", e);
    }
    if let Err(e) = visualization_thread.join() {
        log::error!("Visualization thread panicked: {:?}", e);
    }
    if let Some(thread) = replay_thread {
        match thread.join() {
            Ok(Ok(count)) => log::info!("Replayed {} messages", count),
            Ok(Err(e)) => log::error!("Replay failed: {}", e),
            Err(e) => log::error!("Replay thread panicked: {:?}", e),
        }
    }
    if let Err(e) = sink_thread.join() {
        log::error!("Broadcast sink panicked: {:?}", e);
    }

    log::info!("All threads stopped");
    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Consume broadcasts so the queue never fills; summarized at debug level.
fn spawn_broadcast_sink(
    rx: Receiver<Broadcast>,
    running: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("broadcast-sink".into())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                let Ok(msg) = rx.recv_timeout(Duration::from_millis(100)) else {
                    continue;
                };
                match &msg {
                    Broadcast::Transforms(transforms) => {
                        for t in transforms {
                            log::trace!(
                                "{} -> {}: ({:.3}, {:.3}, {:.3})",
                                t.parent_frame,
                                t.child_frame,
                                t.transform.x,
                                t.transform.y,
                                t.transform.theta
                            );
                        }
                    }
                    Broadcast::Markers(markers) => {
                        log::debug!("{} fiducial markers", markers.len())
                    }
                    Broadcast::Graph(snapshot) => log::debug!(
                        "Graph snapshot: {} nodes, {} edges",
                        snapshot.nodes.len(),
                        snapshot.edges.len()
                    ),
                    Broadcast::ScanPreview(preview) => {
                        log::debug!("Scan preview for node {}", preview.node)
                    }
                }
            }
        })
}
