//! Utility functions for string manipulation, file naming and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Character-safe truncation for logs and stage outputs
//! - Deterministic audio file naming from a page title or domain
//! - Display-title cleanup for rendering
//! - Output directory validation and collision-free paths

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

/// Extension of every generated audio file.
pub const AUDIO_EXTENSION: &str = "mp3";

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static DASH_OR_SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Keep at most `max` characters of `s`.
///
/// This is a hard cut on `char` boundaries, never splitting a code point and
/// never looking for a word boundary.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("héllo", 2), "hé");
/// ```
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let head = truncate_chars(s, max);
    if head.len() == s.len() {
        head
    } else {
        format!("{}…(+{} bytes)", head, s.len() - head.len())
    }
}

/// Build the file stem for a generated podcast.
///
/// The name is derived from the page title when there is one, otherwise from
/// the URL's host (with `www.` removed), and falls back to `podcast`. A
/// minute-resolution timestamp and a `_podcast` suffix are always appended.
///
/// # Arguments
///
/// * `url` - The article URL
/// * `title` - The raw page title, possibly empty
/// * `now` - The timestamp to embed
///
/// # Returns
///
/// A stem such as `My_Post_Example_20250506_1430_podcast`.
pub fn safe_file_stem(url: &str, title: &str, now: DateTime<Local>) -> String {
    let mut safe_name = if !title.is_empty() {
        let stripped = NON_WORD.replace_all(title, "");
        let joined = DASH_OR_SPACE_RUN.replace_all(&stripped, "_");
        truncate_chars(&joined, 50)
    } else {
        let domain = netloc(url).replace("www.", "");
        NON_WORD.replace_all(&domain, "").into_owned()
    };

    if safe_name.is_empty() {
        safe_name = "podcast".to_string();
    }

    let timestamp = now.format("%Y%m%d_%H%M");
    format!("{safe_name}_{timestamp}_podcast")
}

/// Network location of a URL: host plus explicit port, empty if unparsable.
fn netloc(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// Strip author, date and source decorations from a page title.
///
/// Keeps the text before the first `|`, then the text before the first
/// `" - "`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_display_title("My Post | Example"), "My Post");
/// assert_eq!(clean_display_title("Rust - The Blog | 2024"), "Rust");
/// ```
pub fn clean_display_title(title: &str) -> String {
    let mut clean = title.trim();
    if let Some((head, _)) = clean.split_once('|') {
        clean = head.trim();
    }
    if let Some((head, _)) = clean.split_once(" - ") {
        clean = head.trim();
    }
    clean.to_string()
}

/// Pick a path in `dir` for `stem` that does not already exist.
///
/// Two runs in the same minute for the same page would otherwise produce the
/// same name; the second one gets `_2`, the third `_3`, and so on.
///
/// # Returns
///
/// The full path and its file name.
pub fn unique_audio_path(dir: &Path, stem: &str) -> (PathBuf, String) {
    let mut file_name = format!("{stem}.{AUDIO_EXTENSION}");
    let mut n = 2u32;
    while dir.join(&file_name).exists() {
        file_name = format!("{stem}_{n}.{AUDIO_EXTENSION}");
        n += 1;
    }
    debug!(%file_name, "Chose audio file name");
    (dir.join(&file_name), file_name)
}

/// Format a byte count for humans.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
