//! One podcast generation run: URL → article → script → audio file.
//!
//! Stages run strictly in sequence and each one gates the next. An empty
//! result from any stage stops the run with the matching [`PodcastError`];
//! the underlying cause has already been logged by the stage itself.

use crate::api::{AskAsync, AzureChatClient, CompletionParams};
use crate::config::Settings;
use crate::error::PodcastError;
use crate::models::{EngineChoice, PodcastOutcome, Session};
use crate::narrator::Narrator;
use crate::scrapers::fetch::{FetchSettings, PageFetcher};
use crate::scrapers::scrape_blog;
use crate::script::{SYSTEM_PROMPT, write_script};
use crate::utils::{clean_display_title, safe_file_stem, unique_audio_path};
use chrono::Local;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Smallest article budget the shell accepts.
pub const MIN_ARTICLE_CHARS: usize = 5_000;
/// Largest article budget the shell accepts.
pub const MAX_ARTICLE_CHARS: usize = 25_000;
pub const DEFAULT_ARTICLE_CHARS: usize = 10_000;

/// Progress points reported while a run is underway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    WritingScript,
    Narrating,
    Done,
}

impl Stage {
    pub fn message(&self) -> &'static str {
        match self {
            Stage::Extracting => "Extracting blog content...",
            Stage::WritingScript => "Creating podcast script...",
            Stage::Narrating => "Converting to audio...",
            Stage::Done => "Podcast ready!",
        }
    }
}

/// Receives stage changes; the shell drives a spinner from these.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, stage: Stage);
}

/// What to generate.
#[derive(Debug, Clone)]
pub struct PodcastRequest {
    pub url: String,
    /// Character budget for the extracted article.
    pub max_chars: usize,
    pub engine: EngineChoice,
}

impl PodcastRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_chars: DEFAULT_ARTICLE_CHARS,
            engine: EngineChoice::Auto,
        }
    }
}

/// The three stages wired together, plus where audio lands.
pub struct Pipeline<C = AzureChatClient> {
    fetcher: PageFetcher,
    writer: C,
    narrator: Narrator,
    output_dir: PathBuf,
}

impl Pipeline<AzureChatClient> {
    /// Production wiring from resolved settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, Box<dyn Error>> {
        let fetcher = PageFetcher::new(FetchSettings {
            timeout: settings.fetch_timeout,
            ..FetchSettings::default()
        })?;
        let writer = AzureChatClient::new(
            settings.azure.clone(),
            SYSTEM_PROMPT,
            CompletionParams::default(),
            settings.llm_timeout,
        )?;
        let narrator = Narrator::from_settings(settings)?;
        Ok(Self::new(fetcher, writer, narrator, settings.output_dir.clone()))
    }
}

impl<C> Pipeline<C>
where
    C: AskAsync<Response = String>,
{
    pub fn new(fetcher: PageFetcher, writer: C, narrator: Narrator, output_dir: PathBuf) -> Self {
        Self {
            fetcher,
            writer,
            narrator,
            output_dir,
        }
    }

    /// Run one generation.
    ///
    /// `session` is only touched on success. No stage runs after one that
    /// came back empty.
    ///
    /// # Errors
    ///
    /// One of the user-facing [`PodcastError`] variants naming the stage
    /// that failed.
    #[instrument(
        level = "info",
        skip(self, request, session, progress),
        fields(url = %request.url, engine = ?request.engine)
    )]
    pub async fn run(
        &self,
        request: &PodcastRequest,
        session: &mut Session,
        progress: &dyn ProgressSink,
    ) -> Result<PodcastOutcome, PodcastError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(PodcastError::EmptyUrl);
        }
        let t0 = Instant::now();

        progress.stage(Stage::Extracting);
        let article = scrape_blog(&self.fetcher, url, request.max_chars).await;
        if article.is_empty() {
            warn!("No article text extracted");
            return Err(PodcastError::ExtractionFailed);
        }

        progress.stage(Stage::WritingScript);
        let script = write_script(&self.writer, &article.text).await;
        if script.is_empty() {
            return Err(PodcastError::ScriptFailed);
        }

        progress.stage(Stage::Narrating);
        fs::create_dir_all(&self.output_dir).await?;
        let stem = safe_file_stem(url, &article.title, Local::now());
        let (path, file_name) = unique_audio_path(&self.output_dir, &stem);
        let artifact = self
            .narrator
            .narrate(&script.text, &path, request.engine)
            .await
            .map_err(|e| {
                warn!(error = %e, "Narration failed");
                PodcastError::AudioFailed
            })?;

        session.record_success();
        progress.stage(Stage::Done);
        info!(
            engine = %artifact.engine,
            bytes = artifact.bytes.len(),
            %file_name,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            podcasts_created = session.podcasts_created(),
            "Podcast generated"
        );

        Ok(PodcastOutcome {
            display_title: clean_display_title(&article.title),
            title: article.title,
            artifact,
            script,
            file_name,
        })
    }
}
