//! Command-line interface definitions for PodScribe.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Settings not exposed here come from the environment (see [`crate::config`]).

use crate::models::EngineChoice;
use crate::pipeline::{DEFAULT_ARTICLE_CHARS, MAX_ARTICLE_CHARS, MIN_ARTICLE_CHARS};
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for PodScribe.
///
/// # Examples
///
/// ```sh
/// # One podcast from one article
/// podscribe generate https://example.com/post
///
/// # Longer article budget, free voices only
/// podscribe generate https://example.com/post --max-chars 20000 --engine free
///
/// # Several articles in a row, counting successes
/// podscribe session
///
/// # Check credentials and installed voices
/// podscribe status
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory receiving generated audio
    #[arg(short, long, env = "SAVE_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Turn one blog article into a podcast
    Generate {
        /// Article URL
        url: String,

        #[command(flatten)]
        options: RunOptions,
    },
    /// Prompt for article URLs until a blank line or `quit`
    Session {
        #[command(flatten)]
        options: RunOptions,
    },
    /// Report LLM, premium voice and local engine availability
    Status,
}

/// Per-run knobs shared by `generate` and `session`.
#[derive(Args, Debug, Clone, Copy)]
pub struct RunOptions {
    /// Maximum article characters handed to the script writer
    #[arg(
        long,
        default_value_t = DEFAULT_ARTICLE_CHARS,
        value_parser = RangedU64ValueParser::<usize>::new()
            .range(MIN_ARTICLE_CHARS as u64..=MAX_ARTICLE_CHARS as u64)
    )]
    pub max_chars: usize,

    /// Where the voice cascade starts
    #[arg(long, value_enum, default_value_t = EngineChoice::Auto)]
    pub engine: EngineChoice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::parse_from(["podscribe", "generate", "https://example.com/post"]);
        match cli.command {
            Command::Generate { url, options } => {
                assert_eq!(url, "https://example.com/post");
                assert_eq!(options.max_chars, 10_000);
                assert_eq!(options.engine, EngineChoice::Auto);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_generate_with_options() {
        let cli = Cli::parse_from([
            "podscribe",
            "-c",
            "/etc/podscribe.yaml",
            "generate",
            "https://example.com/post",
            "--max-chars",
            "25000",
            "--engine",
            "offline",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/podscribe.yaml")));
        match cli.command {
            Command::Generate { options, .. } => {
                assert_eq!(options.max_chars, 25_000);
                assert_eq!(options.engine, EngineChoice::Offline);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_max_chars_out_of_range_is_rejected() {
        let low = Cli::try_parse_from(["podscribe", "generate", "u", "--max-chars", "4999"]);
        assert!(low.is_err());
        let high = Cli::try_parse_from(["podscribe", "session", "--max-chars", "25001"]);
        assert!(high.is_err());
    }

    #[test]
    fn test_global_output_dir_after_subcommand() {
        let cli = Cli::parse_from(["podscribe", "status", "--output-dir", "/tmp/audio"]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/audio")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let res = Cli::try_parse_from(["podscribe", "generate", "u", "--engine", "loud"]);
        assert!(res.is_err());
    }
}
