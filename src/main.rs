//! Media Downloader CLI
//!
//! Submits a media URL to the downloader backend and saves the converted file.
//! Supports the job-based flow (video/audio) and the direct, job-less endpoint.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use media_downloader::{
    ClientConfig, DownloadOptions, DownloadSession, MediaKind, Quality, SavedDownload,
    SessionState, StatusEvent,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "media-downloader")]
#[command(about = "Download videos and audio through a media-conversion backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL [env: MEDIA_DOWNLOADER_BASE_URL, default: http://127.0.0.1:8080]
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory to save downloads into [env: MEDIA_DOWNLOADER_OUTPUT_DIR, default: .]
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Delay between status checks in milliseconds [default: 1000]
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Give up after this many status checks, 0 = never [default: 1800]
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert and download a video
    Video {
        /// Media URL
        #[arg(short, long)]
        url: String,

        /// best, 144, 240, 360, 480, 720 or 1080
        #[arg(short, long, default_value = "best")]
        quality: Quality,
    },

    /// Extract and download the audio track as mp3
    Audio {
        /// Media URL
        #[arg(short, long)]
        url: String,
    },

    /// Download in one request without creating a job
    Direct {
        /// Media URL
        #[arg(short, long)]
        url: String,

        /// video or audio
        #[arg(short = 't', long = "type", default_value = "video")]
        kind: MediaKind,

        /// best, 144, 240, 360, 480, 720 or 1080
        #[arg(short, long, default_value = "best")]
        quality: Quality,
    },

    /// Check that the backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Reads .env before the log filter is built
    let mut config = ClientConfig::from_env();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(attempts) = cli.max_attempts {
        config.max_poll_attempts = Some(attempts).filter(|n| *n > 0);
    }
    info!("Using backend {}", config.base_url);

    let spinner = progress_spinner();
    let listener = {
        let spinner = spinner.clone();
        move |event: &StatusEvent| update_spinner(&spinner, event)
    };
    let session = DownloadSession::new(config, Arc::new(listener))?;
    setup_signal_handler(session.cancel_token());

    let outcome = match cli.command {
        Commands::Video { url, quality } => session.run(&url, DownloadOptions::video(quality)).await,
        Commands::Audio { url } => session.run(&url, DownloadOptions::audio()).await,
        Commands::Direct { url, kind, quality } => {
            session
                .run_direct(&url, DownloadOptions { kind, quality })
                .await
        }
        Commands::Health => {
            spinner.finish_and_clear();
            session.client().health_check().await?;
            println!("{} {}", "✓".green(), session.client().base_url());
            return Ok(());
        }
    };

    spinner.finish_and_clear();
    match outcome {
        Ok(saved) => {
            print_saved(&saved);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn progress_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn update_spinner(spinner: &ProgressBar, event: &StatusEvent) {
    match event {
        StatusEvent::StateChanged(SessionState::Submitting) => spinner.set_message("Starting..."),
        StatusEvent::StateChanged(SessionState::Polling) => spinner.set_message("Processing..."),
        StatusEvent::StateChanged(SessionState::Saving) => spinner.set_message("Saving..."),
        StatusEvent::Submitted { job_id } => spinner.set_message(format!("Job {} started", job_id)),
        StatusEvent::Polling { attempt } => {
            spinner.set_message(format!("Processing... (check {})", attempt))
        }
        StatusEvent::Saved { path } => spinner.set_message(format!("Saved {}", path.display())),
        StatusEvent::Failed { message } => spinner.set_message(message.clone()),
        StatusEvent::StateChanged(_) => {}
    }
}

fn print_saved(saved: &SavedDownload) {
    println!("{} Download saved", "✓".green());
    if let Some(job_id) = &saved.job_id {
        println!("  Job: {}", job_id);
    }
    println!("  File: {}", saved.filename);
    println!("  Location: {}", saved.path.display());
    println!("  Size: {} bytes", saved.size);
}

/// Cancel the running download on Ctrl+C
fn setup_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, cancelling download...");
                cancel.cancel();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });
}
