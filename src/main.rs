//! # PodScribe
//!
//! Turns a blog article into a spoken podcast episode.
//!
//! ## Features
//!
//! - Scrapes the readable text of any article page, with retries and a TLS
//!   fallback for sites with broken certificates
//! - Rewrites the article as a conversational script through an Azure OpenAI
//!   chat deployment
//! - Narrates the script through a cascade of voices: ElevenLabs, then the
//!   free Edge neural voices, then offline `espeak-ng`
//! - Interactive session mode that counts the podcasts created
//!
//! ## Usage
//!
//! ```sh
//! podscribe generate https://example.com/post
//! podscribe session --engine free
//! podscribe status
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Scraping**: Download the page and extract title and paragraphs
//! 2. **Scripting**: One chat completion turns the article into a script
//! 3. **Narration**: The first voice that succeeds writes the audio file
//! 4. **Output**: The shell prints the file, its size and the script

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod narrator;
mod pipeline;
mod scrapers;
mod script;
mod shell;
mod status;
#[cfg(test)]
mod test_support;
mod utils;

use cli::{Cli, Command};
use config::Settings;
use models::Session;
use pipeline::Pipeline;
use status::StatusReport;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // .env first so RUST_LOG and credentials can live there
    let dotenv = dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(shell::LogWriter)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "podscribe starting up");
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "Loaded .env");
    }

    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, "Parsed CLI arguments");

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }

    if let Command::Status = args.command {
        let report = StatusReport::gather(&settings).await?;
        println!("{report}");
        return Ok(());
    }

    // Early check: ensure the audio directory is writable
    if let Err(e) = ensure_writable_dir(&settings.output_dir).await {
        error!(
            path = %settings.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or set SAVE_DIR)"
        );
        return Err(e);
    }

    let pipeline = Pipeline::from_settings(&settings)?;

    match args.command {
        Command::Generate { url, options } => {
            let mut session = Session::new();
            let ok = shell::generate_once(&pipeline, &url, options, &mut session).await;
            log_elapsed(start_time);
            if !ok {
                std::process::exit(1);
            }
        }
        Command::Session { options } => {
            shell::run_session(&pipeline, options).await?;
            log_elapsed(start_time);
        }
        Command::Status => {}
    }

    Ok(())
}

fn log_elapsed(start_time: std::time::Instant) {
    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
}
