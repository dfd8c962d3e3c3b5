//! Text-to-speech cascade.
//!
//! The narrator holds an ordered list of [`SpeechEngine`] strategies and
//! tries them one at a time until one leaves audio on disk:
//!
//! | Priority | Engine | Module | Backend |
//! |----------|--------|--------|---------|
//! | 1 | Premium | [`elevenlabs`] | ElevenLabs REST API |
//! | 2 | Free cloud | [`edge`] | `edge-tts` executable (Microsoft neural voices) |
//! | 3 | Offline | [`espeak`] | `espeak-ng` executable |
//!
//! Every failure kind is handled the same way: log it, discard any partial
//! file, move on. Only exhaustion of the list is reported to the caller.
//! An [`EngineChoice`] can pin the cascade to start further down the list.

pub mod edge;
pub mod elevenlabs;
pub mod espeak;

use crate::config::Settings;
use crate::error::SpeechError;
use crate::models::{AudioArtifact, EngineChoice, EngineKind};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// A single speech synthesis strategy.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Position of this engine in the cascade.
    fn kind(&self) -> EngineKind;

    /// MIME type of the files this engine writes.
    fn mime_type(&self) -> &'static str {
        "audio/mpeg"
    }

    /// Speak `text` into a new audio file at `path`.
    async fn synthesize(&self, text: &str, path: &Path) -> Result<(), SpeechError>;
}

/// Ordered cascade of speech engines.
pub struct Narrator {
    engines: Vec<Box<dyn SpeechEngine>>,
}

impl Narrator {
    /// Build a narrator from engines already in priority order.
    pub fn new(engines: Vec<Box<dyn SpeechEngine>>) -> Self {
        Self { engines }
    }

    /// The production cascade: ElevenLabs, then Edge, then espeak-ng.
    pub fn from_settings(settings: &Settings) -> Result<Self, SpeechError> {
        let premium =
            elevenlabs::ElevenLabsEngine::new(settings.elevenlabs.clone(), settings.tts_timeout)?;
        let free = edge::EdgeTtsEngine::new(settings.edge_tts_bin.clone(), settings.tts_timeout);
        let offline = espeak::EspeakEngine::new(settings.espeak_bin.clone(), settings.tts_timeout);
        Ok(Self::new(vec![Box::new(premium), Box::new(free), Box::new(offline)]))
    }

    /// Narrate `text` into `path`.
    ///
    /// Engines ranked above `choice`'s starting point are never invoked. The
    /// first engine that returns success and leaves a non-empty file wins.
    ///
    /// # Returns
    ///
    /// The written [`AudioArtifact`], or [`SpeechError::Exhausted`] once every
    /// eligible engine has failed.
    #[instrument(level = "info", skip(self, text, path), fields(path = %path.display()))]
    pub async fn narrate(
        &self,
        text: &str,
        path: &Path,
        choice: EngineChoice,
    ) -> Result<AudioArtifact, SpeechError> {
        let first = choice.first_engine();
        let mut attempted = 0usize;

        for engine in self.engines.iter().filter(|e| e.kind() >= first) {
            attempted += 1;
            let kind = engine.kind();
            let t0 = Instant::now();

            let result = match engine.synthesize(text, path).await {
                Ok(()) => read_nonempty(path).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(bytes) => {
                    info!(
                        engine = %kind,
                        bytes = bytes.len(),
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "Narration succeeded"
                    );
                    return Ok(AudioArtifact {
                        path: path.to_path_buf(),
                        bytes,
                        engine: kind,
                        mime_type: engine.mime_type(),
                    });
                }
                Err(e) => {
                    warn!(engine = %kind, error = %e, "Speech engine failed; trying next");
                    if fs::remove_file(path).await.is_ok() {
                        debug!(engine = %kind, "Removed partial audio file");
                    }
                }
            }
        }

        warn!(attempted, "All speech engines failed");
        Err(SpeechError::Exhausted { attempted })
    }
}

async fn read_nonempty(path: &Path) -> Result<Vec<u8>, SpeechError> {
    match fs::read(path).await {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        Ok(_) => Err(SpeechError::EmptyOutput),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SpeechError::EmptyOutput),
        Err(e) => Err(e.into()),
    }
}

/// Map a spawn failure to [`SpeechError`]: a missing executable is a missing
/// capability, anything else is an engine failure.
pub(crate) fn spawn_error(bin: &str, err: std::io::Error) -> SpeechError {
    if err.kind() == std::io::ErrorKind::NotFound {
        SpeechError::CapabilityMissing(format!("{bin} not found on PATH"))
    } else {
        SpeechError::EngineFailed(format!("{bin}: {err}"))
    }
}

/// Run an engine executable to completion.
///
/// `stdin_text`, when given, is piped to the child. The child is killed if
/// it outlives `timeout`. A non-zero exit becomes
/// [`SpeechError::EngineFailed`] carrying the start of its stderr.
pub(crate) async fn run_engine(
    mut command: Command,
    bin: &str,
    stdin_text: Option<&str>,
    timeout: Duration,
) -> Result<Output, SpeechError> {
    command
        .stdin(if stdin_text.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| spawn_error(bin, e))?;
    if let (Some(text), Some(mut stdin)) = (stdin_text, child.stdin.take()) {
        stdin.write_all(text.as_bytes()).await?;
    }

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| SpeechError::Timeout(timeout))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpeechError::EngineFailed(format!(
            "{bin} exited with {}: {}",
            output.status,
            truncate_for_log(stderr.trim(), 200)
        )));
    }
    Ok(output)
}

/// Whether `bin` can be launched at all (`bin --version` runs).
#[instrument(level = "debug")]
pub async fn binary_available(bin: &str) -> bool {
    let status = Command::new(bin)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await;
    match status {
        Ok(s) => {
            debug!(bin, code = ?s.code(), "Probed binary");
            true
        }
        Err(e) => {
            debug!(bin, error = %e, "Binary not available");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        Reject(u16),
        Missing,
        SilentlyWriteNothing,
    }

    struct FakeEngine {
        kind: EngineKind,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl FakeEngine {
        fn boxed(
            kind: EngineKind,
            behaviour: Behaviour,
        ) -> (Box<dyn SpeechEngine>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let engine = FakeEngine {
                kind,
                behaviour,
                calls: Arc::clone(&calls),
            };
            (Box::new(engine), calls)
        }
    }

    #[async_trait]
    impl SpeechEngine for FakeEngine {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        async fn synthesize(&self, _text: &str, path: &Path) -> Result<(), SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => {
                    fs::write(path, format!("{:?}", self.kind)).await?;
                    Ok(())
                }
                Behaviour::Reject(status) => {
                    fs::write(path, b"partial").await?;
                    Err(SpeechError::UpstreamRejection { status })
                }
                Behaviour::Missing => Err(SpeechError::CapabilityMissing("fake".to_string())),
                Behaviour::SilentlyWriteNothing => Ok(()),
            }
        }
    }

    struct Cascade {
        narrator: Narrator,
        premium: Arc<AtomicUsize>,
        free: Arc<AtomicUsize>,
        offline: Arc<AtomicUsize>,
    }

    fn cascade(premium: Behaviour, free: Behaviour, offline: Behaviour) -> Cascade {
        let (p, premium_calls) = FakeEngine::boxed(EngineKind::Premium, premium);
        let (f, free_calls) = FakeEngine::boxed(EngineKind::FreeCloud, free);
        let (o, offline_calls) = FakeEngine::boxed(EngineKind::Offline, offline);
        Cascade {
            narrator: Narrator::new(vec![p, f, o]),
            premium: premium_calls,
            free: free_calls,
            offline: offline_calls,
        }
    }

    #[tokio::test]
    async fn test_premium_wins_when_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let c = cascade(Behaviour::Succeed, Behaviour::Succeed, Behaviour::Succeed);

        let artifact = c.narrator.narrate("hi", &path, EngineChoice::Auto).await.unwrap();
        assert_eq!(artifact.engine, EngineKind::Premium);
        assert_eq!(artifact.bytes, b"Premium");
        assert_eq!(c.free.load(Ordering::SeqCst), 0);
        assert_eq!(c.offline.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_premium_falls_through_without_second_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let c = cascade(Behaviour::Reject(401), Behaviour::Succeed, Behaviour::Succeed);

        let artifact = c.narrator.narrate("hi", &path, EngineChoice::Auto).await.unwrap();
        assert_eq!(artifact.engine, EngineKind::FreeCloud);
        assert_eq!(std::fs::read(&path).unwrap(), b"FreeCloud");
        assert_eq!(c.premium.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offline_choice_skips_cloud_engines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let c = cascade(Behaviour::Succeed, Behaviour::Succeed, Behaviour::Succeed);

        let artifact = c.narrator.narrate("hi", &path, EngineChoice::Offline).await.unwrap();
        assert_eq!(artifact.engine, EngineKind::Offline);
        assert_eq!(c.premium.load(Ordering::SeqCst), 0);
        assert_eq!(c.free.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_free_choice_skips_premium() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let c = cascade(Behaviour::Succeed, Behaviour::Succeed, Behaviour::Succeed);

        let artifact = c.narrator.narrate("hi", &path, EngineChoice::Free).await.unwrap();
        assert_eq!(artifact.engine, EngineKind::FreeCloud);
        assert_eq!(c.premium.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_premium_and_missing_free_reaches_offline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let c = cascade(Behaviour::Reject(401), Behaviour::Missing, Behaviour::Succeed);

        let artifact = c.narrator.narrate("hi", &path, EngineChoice::Auto).await.unwrap();
        assert_eq!(artifact.engine, EngineKind::Offline);
        assert!(path.exists());
        assert_eq!(c.premium.load(Ordering::SeqCst), 1);
        assert_eq!(c.free.load(Ordering::SeqCst), 1);
        assert_eq!(c.offline.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_without_audio_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let c = cascade(Behaviour::SilentlyWriteNothing, Behaviour::Succeed, Behaviour::Succeed);

        let artifact = c.narrator.narrate("hi", &path, EngineChoice::Auto).await.unwrap();
        assert_eq!(artifact.engine, EngineKind::FreeCloud);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_failure_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let c = cascade(Behaviour::Reject(500), Behaviour::Missing, Behaviour::Reject(1));

        let err = c.narrator.narrate("hi", &path, EngineChoice::Auto).await.unwrap_err();
        assert!(matches!(err, SpeechError::Exhausted { attempted: 3 }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_spawn_error_classification() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(spawn_error("x", missing), SpeechError::CapabilityMissing(_)));
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(spawn_error("x", denied), SpeechError::EngineFailed(_)));
        assert!(!binary_available("/definitely/not/a/real/binary").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_engine_exit_codes_and_timeout() {
        let mut ok = Command::new("sh");
        ok.args(["-c", "cat"]);
        let out = run_engine(ok, "sh", Some("piped"), Duration::from_secs(5)).await.unwrap();
        assert_eq!(out.stdout, b"piped");

        let mut failing = Command::new("sh");
        failing.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_engine(failing, "sh", None, Duration::from_secs(5)).await.unwrap_err();
        match err {
            SpeechError::EngineFailed(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }

        let mut slow = Command::new("sh");
        slow.args(["-c", "sleep 5"]);
        let err = run_engine(slow, "sh", None, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, SpeechError::Timeout(_)));
    }
}
