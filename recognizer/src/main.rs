use std::path::PathBuf;
use std::sync::Arc;

use sign_sense_common::config::Config;
use sign_sense_recognizer::camera::{Camera, CameraDevice, StreamConstraints};
use sign_sense_recognizer::detector::StubDetector;
use sign_sense_recognizer::pipeline::Pipeline;
use sign_sense_recognizer::render;
use sign_sense_recognizer::smoother::ProcessingState;
use sign_sense_recognizer::source::LogNotifier;
use tracing::{debug, error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let (camera, constraints) = match Camera::from_config(&config.camera)
        .and_then(|c| Ok((c, StreamConstraints::from_config(&config.camera)?)))
    {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, url = config.camera.url, "invalid camera configuration");
            std::process::exit(1);
        }
    };

    info!(
        camera = camera.name(),
        facing = constraints.facing_mode.as_str(),
        width = constraints.ideal_width,
        height = constraints.ideal_height,
        refresh_hz = config.capture.refresh_hz,
        "starting sign-sense"
    );

    let detector = Box::new(StubDetector::from_config(&config.detector));
    let mut pipeline = Pipeline::new(
        camera,
        constraints,
        &config,
        detector,
        Arc::new(LogNotifier),
    );
    info!("{}", render::signs_line(pipeline.recognizable_labels()));

    if let Err(e) = pipeline.start().await {
        error!(error = %e, "camera could not be started");
        pipeline.shutdown().await;
        std::process::exit(1);
    }

    let mut snapshots = pipeline.subscribe();
    let mut last_history = Vec::new();
    let mut last_processing = ProcessingState::Idle;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupt received, stopping");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                // The current result flickers every frame; history and the
                // processing indicator are what a reader follows.
                if snapshot.history != last_history || snapshot.processing != last_processing {
                    info!("{}", render::current_line(&snapshot));
                    info!("{}", render::history_line(&snapshot));
                    last_history = snapshot.history.clone();
                    last_processing = snapshot.processing;
                } else {
                    debug!("{}", render::current_line(&snapshot));
                }
            }
        }
    }

    pipeline.shutdown().await;
    info!("sign-sense stopped");
}
