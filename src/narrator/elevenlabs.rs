//! Premium voice: ElevenLabs text-to-speech.
//!
//! One POST per script with fixed voice settings; the MP3 response is
//! streamed to disk chunk by chunk. A certificate failure earns exactly one
//! retry without verification. Everything else, a 401 included, is reported
//! to the narrator, which moves on to the free voices.

use super::SpeechEngine;
use crate::config::ElevenLabsSettings;
use crate::error::{SpeechError, is_tls_error};
use crate::models::EngineKind;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

pub const MODEL_ID: &str = "eleven_monolingual_v1";

/// Voice quality parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
    pub style: f64,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.5,
            use_speaker_boost: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'static str,
    voice_settings: VoiceSettings,
}

/// Outcome of validating the configured API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Connected,
    InvalidKey,
    Unknown,
    NotConfigured,
}

/// ElevenLabs speech engine.
#[derive(Debug, Clone)]
pub struct ElevenLabsEngine {
    verified: reqwest::Client,
    unverified: reqwest::Client,
    settings: ElevenLabsSettings,
    voice: VoiceSettings,
}

impl ElevenLabsEngine {
    pub fn new(settings: ElevenLabsSettings, timeout: Duration) -> Result<Self, SpeechError> {
        let build = |insecure: bool| {
            reqwest::Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_certs(insecure)
                .build()
                .map_err(|e| SpeechError::Network(e.to_string()))
        };
        Ok(Self {
            verified: build(false)?,
            unverified: build(true)?,
            settings,
            voice: VoiceSettings::default(),
        })
    }

    fn speech_url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.settings.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.settings.voice_id)
        )
    }

    async fn post_to_file(
        &self,
        client: &reqwest::Client,
        text: &str,
        path: &Path,
    ) -> Result<(), SpeechError> {
        let body = SpeechRequest {
            text,
            model_id: MODEL_ID,
            voice_settings: self.voice,
        };

        let response = client
            .post(self.speech_url())
            .header("xi-api-key", &self.settings.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::UpstreamRejection {
                status: status.as_u16(),
            });
        }

        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if !chunk.is_empty() {
                file.write_all(&chunk).await?;
                written += chunk.len();
            }
        }
        file.flush().await?;
        debug!(bytes = written, "Streamed premium audio to disk");
        Ok(())
    }

    /// Check the configured key against `GET /v1/user`.
    #[instrument(level = "info", skip(self))]
    pub async fn check_key(&self) -> KeyStatus {
        if !self.settings.has_usable_key() {
            return KeyStatus::NotConfigured;
        }
        let url = format!("{}/v1/user", self.settings.base_url.trim_end_matches('/'));
        let response = self
            .verified
            .get(url)
            .header("xi-api-key", &self.settings.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match response {
            Ok(r) if r.status() == reqwest::StatusCode::OK => KeyStatus::Connected,
            Ok(r) => {
                debug!(status = r.status().as_u16(), "ElevenLabs key rejected");
                KeyStatus::InvalidKey
            }
            Err(e) => {
                debug!(error = %e, "ElevenLabs key check failed");
                KeyStatus::Unknown
            }
        }
    }
}

#[async_trait]
impl SpeechEngine for ElevenLabsEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Premium
    }

    #[instrument(level = "info", skip_all, fields(voice_id = %self.settings.voice_id))]
    async fn synthesize(&self, text: &str, path: &Path) -> Result<(), SpeechError> {
        if self.settings.api_key.is_empty() {
            return Err(SpeechError::CapabilityMissing(
                "ELEVENLABS_API_KEY is not set".to_string(),
            ));
        }

        let t0 = Instant::now();
        let result = match self.post_to_file(&self.verified, text, path).await {
            Err(SpeechError::Tls(msg)) => {
                warn!(
                    error = %msg,
                    "Certificate verification failed; retrying once without verification"
                );
                self.post_to_file(&self.unverified, text, path).await
            }
            other => other,
        };

        if result.is_ok() {
            info!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Premium narration written"
            );
        }
        result
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SpeechError {
    if is_tls_error(&err) {
        SpeechError::Tls(err.to_string())
    } else {
        SpeechError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SelfSignedServer;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine(base_url: &str, api_key: &str) -> ElevenLabsEngine {
        let settings = ElevenLabsSettings {
            api_key: api_key.to_string(),
            voice_id: "voice123".to_string(),
            base_url: base_url.to_string(),
        };
        ElevenLabsEngine::new(settings, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_streams_audio_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice123"))
            .and(header("xi-api-key", "good"))
            .and(header("accept", "audio/mpeg"))
            .and(body_partial_json(json!({
                "text": "Hello Everyone!",
                "model_id": "eleven_monolingual_v1",
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75,
                    "style": 0.5,
                    "use_speaker_boost": true
                }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(b"ID3-audio".to_vec(), "audio/mpeg"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp3");
        engine(&server.uri(), "good")
            .synthesize("Hello Everyone!", &out)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"ID3-audio");
    }

    #[tokio::test]
    async fn test_unauthorized_is_single_attempt_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp3");
        let err = engine(&server.uri(), "bad").synthesize("x", &out).await.unwrap_err();
        assert!(matches!(err, SpeechError::UpstreamRejection { status: 401 }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_server_error_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = engine(&server.uri(), "k")
            .synthesize("x", &dir.path().join("o.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::UpstreamRejection { status: 500 }));
    }

    #[tokio::test]
    async fn test_missing_key_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = engine(&server.uri(), "")
            .synthesize("x", &dir.path().join("o.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::CapabilityMissing(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine("http://127.0.0.1:9", "k")
            .synthesize("x", &dir.path().join("o.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::Network(_)));
    }

    #[tokio::test]
    async fn test_check_key_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user"))
            .and(header("xi-api-key", "good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"subscription": {}})))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert_eq!(engine(&server.uri(), "good").check_key().await, KeyStatus::Connected);
        assert_eq!(engine(&server.uri(), "bad").check_key().await, KeyStatus::InvalidKey);
        assert_eq!(engine(&server.uri(), "").check_key().await, KeyStatus::NotConfigured);
        assert_eq!(
            engine(&server.uri(), "YOUR_KEY_HERE").check_key().await,
            KeyStatus::NotConfigured
        );
        assert_eq!(engine("http://127.0.0.1:9", "good").check_key().await, KeyStatus::Unknown);
    }

    #[tokio::test]
    async fn test_self_signed_certificate_is_classified_as_tls() {
        let server = SelfSignedServer::serving("audio/mpeg", b"ID3-tls").await;
        let engine = engine(&server.url(""), "k");
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("o.mp3");

        let err = engine.post_to_file(&engine.verified, "x", &out).await.unwrap_err();
        assert!(matches!(err, SpeechError::Tls(_)));
        assert!(!out.exists());
        assert_eq!(server.handshakes(), 0);
    }

    #[tokio::test]
    async fn test_self_signed_certificate_gets_one_unverified_attempt() {
        let server = SelfSignedServer::serving("audio/mpeg", b"ID3-tls").await;
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("o.mp3");

        engine(&server.url(""), "k").synthesize("Hello", &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"ID3-tls");
        assert_eq!(server.connections(), 2);
        assert_eq!(server.handshakes(), 1);
    }

    #[tokio::test]
    async fn test_failed_unverified_attempt_is_not_retried() {
        let server = SelfSignedServer::hanging_up().await;
        let dir = tempfile::tempdir().unwrap();

        let result = engine(&server.url(""), "k")
            .synthesize("Hello", &dir.path().join("o.mp3"))
            .await;
        assert!(result.is_err());
        assert_eq!(server.connections(), 2);
        assert_eq!(server.handshakes(), 1);
    }
}
