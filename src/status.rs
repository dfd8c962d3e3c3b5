//! Configuration and backend health report for `podscribe status`.

use crate::config::Settings;
use crate::error::SpeechError;
use crate::narrator::binary_available;
use crate::narrator::elevenlabs::{ElevenLabsEngine, KeyStatus};
use std::fmt;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub llm_configured: bool,
    pub elevenlabs: KeyStatus,
    pub edge_tts_available: bool,
    pub espeak_available: bool,
}

impl StatusReport {
    /// Probe every backend once.
    #[instrument(level = "info", skip_all)]
    pub async fn gather(settings: &Settings) -> Result<Self, SpeechError> {
        let premium = ElevenLabsEngine::new(settings.elevenlabs.clone(), settings.tts_timeout)?;
        Ok(Self {
            llm_configured: settings.azure.is_configured(),
            elevenlabs: premium.check_key().await,
            edge_tts_available: binary_available(&settings.edge_tts_bin).await,
            espeak_available: binary_available(&settings.espeak_bin).await,
        })
    }
}

fn mark(ok: bool) -> &'static str {
    if ok { "✅" } else { "❌" }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let llm = if self.llm_configured {
            "Configured"
        } else {
            "Not configured (set AZURE_OPENAI_KEY)"
        };
        writeln!(f, "{} Azure OpenAI: {llm}", mark(self.llm_configured))?;

        let (ok, premium) = match self.elevenlabs {
            KeyStatus::Connected => (true, "Connected"),
            KeyStatus::InvalidKey => (false, "Invalid API key"),
            KeyStatus::Unknown => (false, "Status unknown"),
            KeyStatus::NotConfigured => (false, "Not configured (free voices only)"),
        };
        writeln!(f, "{} ElevenLabs: {premium}", mark(ok))?;

        let available = |ok: bool| if ok { "Available" } else { "Not found" };
        writeln!(
            f,
            "{} Edge TTS: {}",
            mark(self.edge_tts_available),
            available(self.edge_tts_available)
        )?;
        write!(
            f,
            "{} Offline TTS: {}",
            mark(self.espeak_available),
            available(self.espeak_available)
        )
    }
}
