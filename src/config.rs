//! Runtime configuration.
//!
//! Values are layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. An optional YAML file (`--config settings.yaml`)
//! 3. Process environment (a `.env` file is loaded into it at startup)
//!
//! Nothing here is mandatory. A missing credential degrades the stage that
//! needs it: the script writer returns an empty script, the premium voice
//! falls through to the free ones.
//!
//! # YAML layout
//!
//! ```yaml
//! azure:
//!   api_key: "..."
//!   endpoint: "https://my-resource.openai.azure.com"
//!   deployment: "gpt-4o"
//!   api_version: "2024-02-15-preview"
//! elevenlabs:
//!   api_key: "..."
//!   voice_id: "JBFqnCBsd6RMkjVDRZzb"
//! output_dir: "audio_generations"
//! ```

use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const DEFAULT_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";
pub const DEFAULT_OUTPUT_DIR: &str = "audio_generations";
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Azure OpenAI chat-completion settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub api_key: String,
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

impl AzureSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// ElevenLabs premium voice settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ElevenLabsSettings {
    pub api_key: String,
    pub voice_id: String,
    pub base_url: String,
}

impl Default for ElevenLabsSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            base_url: ELEVENLABS_BASE_URL.to_string(),
        }
    }
}

impl ElevenLabsSettings {
    /// True when a key is present and is not the sample placeholder.
    pub fn has_usable_key(&self) -> bool {
        !self.api_key.is_empty() && self.api_key != "YOUR_KEY_HERE"
    }
}

/// Complete application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub azure: AzureSettings,
    pub elevenlabs: ElevenLabsSettings,
    /// Directory receiving generated audio files.
    pub output_dir: PathBuf,
    /// Executable used for the free online neural voice.
    pub edge_tts_bin: String,
    /// Executable used for offline synthesis.
    pub espeak_bin: String,
    #[serde(skip)]
    pub fetch_timeout: Duration,
    #[serde(skip)]
    pub llm_timeout: Duration,
    #[serde(skip)]
    pub tts_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            azure: AzureSettings::default(),
            elevenlabs: ElevenLabsSettings::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            edge_tts_bin: "edge-tts".to_string(),
            espeak_bin: "espeak-ng".to_string(),
            fetch_timeout: Duration::from_secs(15),
            llm_timeout: Duration::from_secs(60),
            tts_timeout: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// Load settings from an optional YAML file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error only if `config_path` is given and cannot be read or
    /// parsed. Absent environment values are never an error.
    #[instrument(level = "info", skip_all)]
    pub fn load(config_path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let base = match config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let parsed: Settings = serde_yaml::from_str(&raw)?;
                info!(path = %path.display(), "Loaded settings file");
                parsed.with_fixed_timeouts()
            }
            None => Settings::default(),
        };
        Ok(base.overlay_env(|key| std::env::var(key).ok()))
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Empty values are treated as unset so that `ELEVEN_VOICE_ID=` does not
    /// wipe out the default voice.
    pub fn overlay_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AZURE_OPENAI_KEY") {
            self.azure.api_key = v;
        }
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.azure.endpoint = v;
        }
        if let Some(v) = get("AZURE_DEPLOYMENT_NAME") {
            self.azure.deployment = v;
        }
        if let Some(v) = get("AZURE_API_VERSION") {
            self.azure.api_version = v;
        }
        if let Some(v) = get("ELEVENLABS_API_KEY") {
            self.elevenlabs.api_key = v;
        }
        if let Some(v) = get("ELEVEN_VOICE_ID") {
            self.elevenlabs.voice_id = v;
        }
        if let Some(v) = get("SAVE_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("EDGE_TTS_BIN") {
            self.edge_tts_bin = v;
        }
        if let Some(v) = get("ESPEAK_BIN") {
            self.espeak_bin = v;
        }

        debug!(
            azure_configured = self.azure.is_configured(),
            elevenlabs_key = self.elevenlabs.has_usable_key(),
            output_dir = %self.output_dir.display(),
            "Resolved settings"
        );
        self
    }

    fn with_fixed_timeouts(self) -> Self {
        let defaults = Settings::default();
        Self {
            fetch_timeout: defaults.fetch_timeout,
            llm_timeout: defaults.llm_timeout,
            tts_timeout: defaults.tts_timeout,
            ..self
        }
    }
}
