use std::{collections::BTreeMap, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};

use perception_aggregator::{
    models::Modality,
    sensing::{CountingFrameSource, DetectionAdapter, Recording},
    utils::init_logging,
    SessionController, SettingsStore,
};

/// Replays recorded detections through a live session and exports the result.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON recording: `{"object": [[...], ...], "face": [...], "hand": [...]}`
    #[arg(long)]
    recording: PathBuf,

    /// Settings file; defaults are used when it does not exist
    #[arg(long, default_value = "perception-settings.json")]
    settings: PathBuf,

    /// How long to keep the session running
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Only summarise the trailing N minutes
    #[arg(long)]
    window_minutes: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let debug_mode = std::env::var("PERCEPTION_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    init_logging(if debug_mode {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let args = Args::parse();
    let settings = SettingsStore::new(args.settings.clone())?.session();
    let recording = Recording::load(&args.recording)?;

    let mut adapters: BTreeMap<Modality, Arc<dyn DetectionAdapter>> = BTreeMap::new();
    for modality in Modality::ALL {
        match recording.adapter(modality) {
            Some(adapter) => {
                adapters.insert(modality, Arc::new(adapter));
            }
            None => warn!("Recording has no {modality} frames; modality disabled"),
        }
    }

    let controller = SessionController::new(settings, Arc::new(CountingFrameSource::new()), adapters);
    controller.initialize_adapters().await;

    let started = controller.start().await?;
    info!(
        "Replaying {} for {}s (session {})",
        args.recording.display(),
        args.duration_secs,
        started.session_id.as_deref().unwrap_or("-")
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.duration_secs)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping session"),
    }

    controller.stop().await?;

    let summary = controller.query_summary(args.window_minutes).await?;
    println!("{}", summary.render());

    let path = controller
        .export_to_file()
        .await
        .context("failed to export session")?;
    println!("\nExported to {}", path.display());
    Ok(())
}
