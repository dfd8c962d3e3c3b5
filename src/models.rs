//! Data models flowing through the podcast pipeline.
//!
//! Every value here is transient: produced by one stage and consumed by the
//! next. Only the audio file behind an [`AudioArtifact`] outlives a run.
//!
//! - [`Article`]: readable text and title scraped from a page
//! - [`Script`]: the LLM's spoken-style rewrite of the article
//! - [`AudioArtifact`]: the narrated script on disk
//! - [`Session`]: caller-owned counter of successful generations

use clap::ValueEnum;
use std::fmt;
use std::path::PathBuf;

/// Maximum length, in characters, of a podcast script.
pub const MAX_SCRIPT_CHARS: usize = 2000;

/// Readable article content extracted from a web page.
///
/// Both fields are empty when extraction failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    /// Paragraph text joined by blank lines, at most `max_chars` characters.
    pub text: String,
    /// The page title as found in the markup, untrimmed of site suffixes.
    pub title: String,
}

impl Article {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Spoken-style podcast script, at most [`MAX_SCRIPT_CHARS`] characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub text: String,
}

impl Script {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Which speech strategy produced an audio file.
///
/// Ordered by cascade priority: premium first, offline last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EngineKind {
    /// ElevenLabs cloud voice.
    Premium,
    /// Microsoft Edge online neural voice.
    FreeCloud,
    /// Local `espeak-ng` synthesizer.
    Offline,
}

impl EngineKind {
    pub fn label(&self) -> &'static str {
        match self {
            EngineKind::Premium => "ElevenLabs (Premium)",
            EngineKind::FreeCloud => "Edge TTS (Free)",
            EngineKind::Offline => "Offline TTS",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the narrator cascade starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum EngineChoice {
    /// Best available: premium first, then the free fallbacks.
    #[default]
    Auto,
    /// Same cascade as `Auto`, chosen explicitly.
    Premium,
    /// Skip the premium voice.
    Free,
    /// Only the local synthesizer.
    Offline,
}

impl EngineChoice {
    /// The first strategy the cascade may invoke for this choice.
    pub fn first_engine(&self) -> EngineKind {
        match self {
            EngineChoice::Auto | EngineChoice::Premium => EngineKind::Premium,
            EngineChoice::Free => EngineKind::FreeCloud,
            EngineChoice::Offline => EngineKind::Offline,
        }
    }
}

/// A narrated script written to disk.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// Where the audio was written.
    pub path: PathBuf,
    /// The file contents, read back once for playback or download.
    pub bytes: Vec<u8>,
    /// The strategy that produced the file.
    pub engine: EngineKind,
    /// Container format reported by the producing strategy.
    pub mime_type: &'static str,
}

/// Everything the shell needs to render a successful run.
#[derive(Debug, Clone)]
pub struct PodcastOutcome {
    pub artifact: AudioArtifact,
    pub script: Script,
    /// Raw page title, possibly empty.
    pub title: String,
    /// Title with site/author suffixes removed, for display.
    pub display_title: String,
    /// File name offered for download.
    pub file_name: String,
}

/// Per-session state owned by the caller.
///
/// Replaces a process-wide counter: the shell creates one per interactive
/// session and hands it to every run.
#[derive(Debug, Default)]
pub struct Session {
    podcasts_created: u32,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn podcasts_created(&self) -> u32 {
        self.podcasts_created
    }

    pub(crate) fn record_success(&mut self) {
        self.podcasts_created += 1;
    }

    pub fn reset(&mut self) {
        self.podcasts_created = 0;
    }
}
