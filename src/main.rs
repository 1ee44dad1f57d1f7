//! Application entry point — Breath Flap (headless).
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Create the shared [`BreathingDetector`].
//! 5. Start cpal capture and the `audio-frames` pump feeding the detector.
//!    On failure breathing input is disabled and the game still runs.
//! 6. Build the [`SessionController`] and spawn its breathing-event task.
//! 7. Spawn the snapshot reporter and auto-start the game.
//! 8. Wait for Ctrl-C, then shut down in order: capture, breathing
//!    channel, game loop.

use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;

use anyhow::Context;
use breath_flap::{
    audio::{spawn_frame_pump, AudioCapture, AudioChunk, FrameConverter, StreamHandle},
    breathing::BreathingDetector,
    config::AppConfig,
    game::GameSnapshot,
    session::SessionController,
};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Capture wiring
// ---------------------------------------------------------------------------

/// Running capture: the stream handle plus the pump thread draining it.
struct BreathingInput {
    stream: StreamHandle,
    pump: JoinHandle<()>,
}

impl BreathingInput {
    fn shutdown(mut self) {
        // Closing the stream drops the chunk sender, which ends the pump.
        self.stream.stop();
        if self.pump.join().is_err() {
            log::error!("audio-frames thread panicked");
        }
    }
}

fn start_breathing_input(
    config: &AppConfig,
    detector: &Arc<BreathingDetector>,
) -> anyhow::Result<BreathingInput> {
    let capture = AudioCapture::new(config.audio.input_device.as_deref())
        .context("audio capture unavailable")?;
    let (device_rate, channels) = (capture.sample_rate(), capture.channels());

    let (chunk_tx, chunk_rx) = std_mpsc::channel::<AudioChunk>();
    let converter = FrameConverter::new(config.audio.sample_rate, config.audio.frame_size);
    let sink = Arc::clone(detector);
    let pump = spawn_frame_pump(chunk_rx, converter, move |frame| {
        sink.push_audio_frame(&frame);
    });

    let stream = capture
        .start(chunk_tx)
        .context("failed to start audio stream")?;
    log::info!(
        "Audio capture started ({device_rate} Hz, {channels} ch → {} Hz mono, {}-sample frames)",
        config.audio.sample_rate,
        config.audio.frame_size
    );

    Ok(BreathingInput { stream, pump })
}

// ---------------------------------------------------------------------------
// Snapshot reporter
// ---------------------------------------------------------------------------

fn describe(snapshot: &GameSnapshot) -> String {
    format!(
        "{} | score {} (best {}) | y {:.0} v {:+.1} | breath {} | {:.1}s",
        snapshot.phase.label(),
        snapshot.score,
        snapshot.high_score,
        snapshot.body.y,
        snapshot.body.velocity_y,
        snapshot.breathing_state.label(),
        snapshot.elapsed_time
    )
}

/// Log the latest snapshot once per interval.
async fn report_snapshots(
    mut snapshots: watch::Receiver<GameSnapshot>,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let snapshot = snapshots.borrow_and_update().clone();
        log::info!("{}", describe(&snapshot));
        if log::log_enabled!(log::Level::Debug) {
            match snapshot.to_json() {
                Ok(json) => log::debug!("snapshot {json}"),
                Err(e) => log::warn!("snapshot serialisation failed: {e}"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Breath Flap starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 worker threads: breathing events + reporter)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Breathing detector
    let detector = Arc::new(BreathingDetector::new(&config.breathing));

    // 5. Capture → frame pump → detector (degrade gracefully)
    let (input, session_detector) = match start_breathing_input(&config, &detector) {
        Ok(input) => (Some(input), Some(Arc::clone(&detector))),
        Err(e) => {
            log::warn!("Breathing input disabled: {e:#}");
            (None, None)
        }
    };

    // 6. Session + breathing-event task
    let session = Arc::new(SessionController::new(&config, session_detector));
    let events = session.connect_breathing().map(|rx| {
        let session = Arc::clone(&session);
        rt.spawn(async move { session.run(rx).await })
    });

    // 7. Reporter + auto-start
    let reporter = rt.spawn(report_snapshots(
        session.subscribe(),
        config.session.report_interval(),
    ));
    if config.session.auto_start {
        session.start();
        if session.breathing_enabled() {
            log::info!("Breathe normally while the detector calibrates");
        }
    }

    // 8. Run until Ctrl-C, then tear down in order
    rt.block_on(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
        }
    });
    log::info!("Shutting down");

    if let Some(input) = input {
        input.shutdown();
    }
    session.disconnect_breathing();
    if let Some(events) = events {
        if let Err(e) = rt.block_on(events) {
            log::error!("breathing-event task failed: {e}");
        }
    }
    session.stop();
    reporter.abort();

    let stats = session.stats();
    log::info!(
        "Final score {} (high score {}), {:.1}s played",
        stats.current_score,
        stats.high_score,
        stats.elapsed_time
    );

    rt.shutdown_timeout(config.session.stop_timeout());
    Ok(())
}
