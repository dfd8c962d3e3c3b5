//! Free online voice: Microsoft Edge neural TTS through the `edge-tts` CLI.

use super::{SpeechEngine, run_engine};
use crate::error::SpeechError;
use crate::models::EngineKind;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument};

/// Professional female neural voice.
pub const DEFAULT_VOICE: &str = "en-US-AriaNeural";

#[derive(Debug, Clone)]
pub struct EdgeTtsEngine {
    bin: String,
    voice: String,
    timeout: Duration,
}

impl EdgeTtsEngine {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            voice: DEFAULT_VOICE.to_string(),
            timeout,
        }
    }

    fn command(&self, text: &str, path: &Path) -> Command {
        let mut cmd = Command::new(&self.bin);
        // `--text=` keeps a script starting with '-' from parsing as a flag.
        cmd.arg("--voice")
            .arg(&self.voice)
            .arg(format!("--text={text}"))
            .arg("--write-media")
            .arg(path);
        cmd
    }
}

#[async_trait]
impl SpeechEngine for EdgeTtsEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::FreeCloud
    }

    #[instrument(level = "info", skip_all, fields(voice = %self.voice))]
    async fn synthesize(&self, text: &str, path: &Path) -> Result<(), SpeechError> {
        run_engine(self.command(text, path), &self.bin, None, self.timeout).await?;
        info!(path = %path.display(), "Edge narration written");
        Ok(())
    }
}
