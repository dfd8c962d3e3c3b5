//! Error taxonomy for every pipeline stage.
//!
//! Each stage owns its own error type so that failures can be logged with
//! their real cause. None of these travel past the stage boundary: the
//! pipeline collapses them into a [`PodcastError`], which is the only thing
//! the user ever sees.

use std::error::Error as StdError;
use thiserror::Error;

/// Classification of a failed page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The URL could not be parsed.
    InvalidUrl,
    /// Connection refused, DNS failure, reset, body read error.
    Network,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// Certificate verification failed, even after the unverified retry.
    Tls,
    /// The server answered with a non-success status.
    HttpStatus(u16),
}

/// A failed page fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Why the script writer could not produce a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("LLM endpoint is not configured (missing {0})")]
    NotConfigured(&'static str),

    #[error("LLM request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LLM endpoint rejected the request with status {status}")]
    UpstreamRejection { status: u16 },

    #[error("LLM response was malformed: {0}")]
    MalformedResponse(String),
}

/// Why a single speech strategy failed.
///
/// The narrator treats every variant the same way (move on to the next
/// strategy), the distinction only matters for logs and tests.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech request failed: {0}")]
    Network(String),

    #[error("certificate verification failed: {0}")]
    Tls(String),

    #[error("speech provider rejected the request with status {status}")]
    UpstreamRejection { status: u16 },

    #[error("speech capability missing: {0}")]
    CapabilityMissing(String),

    #[error("speech engine failed: {0}")]
    EngineFailed(String),

    #[error("speech engine timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("speech engine produced no audio")]
    EmptyOutput,

    #[error("no speech engine succeeded ({attempted} attempted)")]
    Exhausted { attempted: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// User-facing failure of a podcast generation run.
#[derive(Debug, Error)]
pub enum PodcastError {
    #[error("Please enter a blog URL first.")]
    EmptyUrl,

    #[error("Failed to extract content from the URL. Please check the URL and try again.")]
    ExtractionFailed,

    #[error("Failed to generate podcast script.")]
    ScriptFailed,

    #[error("Audio generation failed. Please check your settings or try a different TTS engine.")]
    AudioFailed,

    #[error("Output directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// True when the error chain points at certificate verification or the TLS
/// handshake.
pub(crate) fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        let msg = inner.to_string().to_ascii_lowercase();
        if msg.contains("certificate") || msg.contains("tls") || msg.contains("handshake") {
            return true;
        }
        source = inner.source();
    }
    false
}
