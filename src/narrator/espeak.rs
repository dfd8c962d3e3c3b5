//! Offline voice: the local `espeak-ng` synthesizer.
//!
//! Last resort of the cascade. Speaks at a fixed rate and volume and picks
//! the first voice variant whose name contains "female", if the installation
//! has one. The output is a WAV stream.

use super::{SpeechEngine, run_engine};
use crate::error::SpeechError;
use crate::models::EngineKind;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Words per minute.
pub const RATE_WPM: u32 = 150;
/// Volume as a fraction of espeak's default amplitude of 100.
pub const VOLUME: f32 = 0.9;

/// One row of `espeak-ng --voices=variant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceEntry {
    pub name: String,
    /// Variant identifier, the last component of the voice file path.
    pub id: String,
}

/// Parse the tabular voice listing printed by espeak.
///
/// Columns are `Pty Language Age/Gender VoiceName File [Other Languages]`.
/// The header row and short rows are skipped.
pub fn parse_voice_listing(listing: &str) -> Vec<VoiceEntry> {
    listing
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 5 {
                return None;
            }
            let id = cols[4].rsplit('/').next().unwrap_or(cols[4]);
            Some(VoiceEntry {
                name: cols[3].to_string(),
                id: id.to_string(),
            })
        })
        .collect()
}

/// First voice whose name contains "female", ignoring case.
pub fn pick_female(voices: &[VoiceEntry]) -> Option<&VoiceEntry> {
    voices
        .iter()
        .find(|v| v.name.to_lowercase().contains("female"))
}

#[derive(Debug, Clone)]
pub struct EspeakEngine {
    bin: String,
    language: String,
    timeout: Duration,
}

impl EspeakEngine {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            language: "en".to_string(),
            timeout,
        }
    }

    /// Voice argument for `-v`, or `None` to keep espeak's default voice.
    async fn preferred_voice(&self) -> Result<Option<String>, SpeechError> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--voices=variant");
        let output = run_engine(cmd, &self.bin, None, self.timeout).await?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let voices = parse_voice_listing(&listing);
        let choice = pick_female(&voices).map(|v| format!("{}+{}", self.language, v.id));
        debug!(available = voices.len(), voice = ?choice, "Selected offline voice");
        Ok(choice)
    }

    fn command(&self, voice: Option<&str>, path: &Path) -> Command {
        let amplitude = (VOLUME * 100.0).round() as u32;
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-s")
            .arg(RATE_WPM.to_string())
            .arg("-a")
            .arg(amplitude.to_string());
        if let Some(voice) = voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("-w").arg(path).arg("--stdin");
        cmd
    }
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Offline
    }

    fn mime_type(&self) -> &'static str {
        "audio/wav"
    }

    #[instrument(level = "info", skip_all)]
    async fn synthesize(&self, text: &str, path: &Path) -> Result<(), SpeechError> {
        let voice = match self.preferred_voice().await {
            Ok(voice) => voice,
            Err(e @ SpeechError::CapabilityMissing(_)) => return Err(e),
            Err(e) => {
                debug!(error = %e, "Voice listing failed; using default voice");
                None
            }
        };
        let cmd = self.command(voice.as_deref(), path);
        run_engine(cmd, &self.bin, Some(text), self.timeout).await?;
        info!(path = %path.display(), "Offline narration written");
        Ok(())
    }
}
