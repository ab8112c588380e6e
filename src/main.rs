//! Kinefield - Gesture-Driven Kinetic Particle Field Service
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kinefield::{
    config::Config, media::FrameReceiver, output::frames::FrameSnapshot, web::WebServer, AppState,
};
use kinefield_cloud::ParticleCloud;

/// Kinefield - gesture-driven kinetic particle field service
#[derive(Parser, Debug)]
#[command(name = "kinefield", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio input device (overrides config)
    #[arg(short, long)]
    device: Option<String>,

    /// List available audio devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Open the streaming session immediately on startup
    #[arg(long)]
    connect: bool,

    /// Disable the camera frame ingest socket
    #[arg(long)]
    no_video: bool,

    /// Disable HTTP server
    #[arg(long)]
    no_http: bool,

    /// HTTP server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", kinefield::NAME, kinefield::VERSION);

    // Handle list-devices mode
    if args.list_devices {
        list_audio_devices();
        return Ok(());
    }

    let state = setup_and_spawn_services(&args).await?;

    // Headless mode: wait for Ctrl+C / SIGTERM
    shutdown_signal().await;
    info!("Shutdown signal received");

    state.session.disconnect().await;
    state.shutdown();

    // Give tasks a moment to clean up
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    info!("Kinefield stopped");
    Ok(())
}

/// Setup config, create AppState, and spawn all background services.
async fn setup_and_spawn_services(args: &Args) -> anyhow::Result<Arc<AppState>> {
    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(ref device) = args.device {
        config.audio.device = device.clone();
    }
    if args.no_video {
        config.video.ingest_enabled = false;
    }
    if args.no_http {
        config.http.enabled = false;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    // Validate configuration
    config.validate()?;

    info!("Audio device: {}", config.audio.device);
    info!(
        "Particles: {} ({}, {} fps)",
        config.particles.count, config.particles.default_shape, config.particles.frame_rate
    );
    info!("Video ingest: {}", config.video.ingest_enabled);
    info!("HTTP server: {}", config.http.enabled);

    // Create shared application state
    let state = AppState::new(config.clone());

    // Start the animation loop
    {
        let anim_state = Arc::clone(&state);
        tokio::spawn(async move {
            run_animation_loop(anim_state).await;
        });
    }

    // Start camera frame ingest
    if config.video.ingest_enabled {
        let ingest_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_frame_ingest(ingest_state).await {
                error!("Frame ingest error: {}", e);
            }
        });
    }

    // Start HTTP server if enabled
    if config.http.enabled {
        let http_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_http_server(http_state).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    // Optionally open the streaming session right away
    if args.connect {
        match state.session.connect(&state).await {
            Ok(()) => info!("Streaming session open"),
            Err(e) => error!("Session connect failed: {}", e),
        }
    }

    Ok(state)
}

fn list_audio_devices() {
    println!("Available audio input devices:\n");

    if let Some(name) = kinefield::media::default_input_device_name() {
        println!("  * {} (default)", name);
    }

    for name in kinefield::media::list_input_devices() {
        println!("    {}", name);
    }
}

/// Fixed-rate animation loop: advance the morph every frame and publish a
/// snapshot for renderers.
async fn run_animation_loop(state: Arc<AppState>) {
    let (count, frame_rate, point_size, shape, tuning) = {
        let config = state.config.read().await;
        (
            config.particles.count,
            config.particles.frame_rate,
            config.particles.point_size,
            config.particles.initial_shape(),
            config.morph.tuning(),
        )
    };

    let mut shutdown_rx = state.subscribe_shutdown();
    let mut cloud = ParticleCloud::with_tuning(shape, count, tuning);

    let period = std::time::Duration::from_secs_f32(1.0 / frame_rate);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last_frame = Instant::now();

    info!("Animation loop started: {} particles", count);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.recv() => {
                info!("Animation loop shutting down");
                return;
            }
        }

        // Real elapsed time, not the nominal period
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        let control = state.get_control_state().await;

        if control.shape() != cloud.shape() {
            info!("Morphing to {}", control.shape().name());
            cloud.retarget(control.shape());
        }

        cloud.step(dt, control.expansion(), control.tension());
        state.publish_frame(FrameSnapshot::capture(&cloud, &control, point_size));
    }
}

/// Receive camera frames over UDP and publish them to the frame tap
async fn run_frame_ingest(state: Arc<AppState>) -> anyhow::Result<()> {
    let config = state.config.read().await;
    let video_config = config.video.clone();
    drop(config);

    let mut shutdown_rx = state.subscribe_shutdown();

    let mut receiver = FrameReceiver::new(&video_config, Arc::clone(&state.frames));
    receiver.start()?;

    info!("Frame ingest started (port: {})", video_config.ingest_port);

    loop {
        tokio::select! {
            result = receiver.process() => {
                if let Err(e) = result {
                    error!("Frame ingest error: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Frame ingest shutting down");
                break;
            }
        }

        // Small yield to avoid busy-spinning when no data arrives
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    }

    receiver.stop();
    Ok(())
}

async fn run_http_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let config = state.config.read().await;
    let http_config = config.http.clone();
    drop(config);

    let web_server = WebServer::new(state.clone(), &http_config);

    let addr = format!("{}:{}", http_config.host, http_config.port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let mut shutdown_rx = state.subscribe_shutdown();

    axum::serve(listener, web_server.router())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
