//! Terminal front end: spinner, result rendering and the interactive session.

use crate::cli::RunOptions;
use crate::models::{PodcastOutcome, Session};
use crate::pipeline::{Pipeline, PodcastRequest, ProgressSink, Stage};
use crate::utils::format_file_size;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::fmt::MakeWriter;

/// Spinner currently on screen, if any. Log lines are written around it.
static ACTIVE_SPINNER: Lazy<Mutex<Option<ProgressBar>>> = Lazy::new(|| Mutex::new(None));

fn active_spinner() -> Option<ProgressBar> {
    ACTIVE_SPINNER.lock().ok().and_then(|slot| slot.clone())
}

fn set_active_spinner(bar: Option<ProgressBar>) {
    if let Ok(mut slot) = ACTIVE_SPINNER.lock() {
        *slot = bar;
    }
}

/// Stderr writer for the tracing subscriber.
///
/// Each log event is buffered and flushed in one piece while the active
/// spinner, if there is one, is suspended, so log lines never split the
/// spinner line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWriter;

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine(Vec::new())
    }
}

pub struct LogLine(Vec<u8>);

impl Write for LogLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        if self.0.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.0);
        let emit = || {
            let _ = io::stderr().write_all(&line);
        };
        match active_spinner() {
            Some(bar) => bar.suspend(emit),
            None => emit(),
        }
    }
}

/// Spinner on stderr that shows the current stage.
pub struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self::with_bar(bar)
    }

    fn with_bar(bar: ProgressBar) -> Self {
        set_active_spinner(Some(bar.clone()));
        Self { bar }
    }

    /// Remove the spinner line, e.g. before printing an error.
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for SpinnerProgress {
    fn drop(&mut self) {
        set_active_spinner(None);
    }
}

impl ProgressSink for SpinnerProgress {
    fn stage(&self, stage: Stage) {
        match stage {
            Stage::Done => self.bar.finish_with_message(stage.message()),
            _ => self.bar.set_message(stage.message()),
        }
    }
}

/// Human-readable summary of a finished podcast.
pub fn render_outcome(outcome: &PodcastOutcome) -> String {
    let title = if outcome.display_title.is_empty() {
        "Untitled"
    } else {
        outcome.display_title.as_str()
    };
    let artifact = &outcome.artifact;
    format!(
        "🎧 {title}\n\
         Voice:    {}\n\
         File:     {}\n\
         Size:     {} ({})\n\
         Download: {}\n\
         \n\
         📝 Podcast script\n\
         {}\n",
        artifact.engine,
        artifact.path.display(),
        format_file_size(artifact.bytes.len() as u64),
        artifact.mime_type,
        outcome.file_name,
        outcome.script.text,
    )
}

/// One line typed at the session prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Quit,
    Reset,
    Url(String),
}

impl SessionInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "" | "quit" | "exit" => SessionInput::Quit,
            "reset" => SessionInput::Reset,
            _ => SessionInput::Url(line.to_string()),
        }
    }
}

/// Generate one podcast with a spinner, printing the result or the
/// user-facing failure message.
///
/// # Returns
///
/// Whether the run succeeded.
pub async fn generate_once(
    pipeline: &Pipeline,
    url: &str,
    options: RunOptions,
    session: &mut Session,
) -> bool {
    let request = PodcastRequest {
        max_chars: options.max_chars,
        engine: options.engine,
        ..PodcastRequest::new(url)
    };
    let spinner = SpinnerProgress::new();
    match pipeline.run(&request, session, &spinner).await {
        Ok(outcome) => {
            debug!(title = %outcome.title, "Rendering result");
            println!("{}", render_outcome(&outcome));
            true
        }
        Err(e) => {
            spinner.clear();
            eprintln!("❌ {e}");
            false
        }
    }
}

/// Read URLs from stdin until a blank line, `quit` or end of input.
pub async fn run_session(pipeline: &Pipeline, options: RunOptions) -> std::io::Result<()> {
    let mut session = Session::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!(
        "Enter a blog URL per line. Blank line or `quit` ends the session, \
         `reset` clears the counter."
    );

    loop {
        print!("url> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match SessionInput::parse(&line) {
            SessionInput::Quit => break,
            SessionInput::Reset => {
                session.reset();
                println!("Counter reset.");
            }
            SessionInput::Url(url) => {
                if generate_once(pipeline, &url, options, &mut session).await {
                    println!(
                        "🎙️ Podcasts created this session: {}",
                        session.podcasts_created()
                    );
                }
            }
        }
        debug!(podcasts_created = session.podcasts_created(), "Session prompt");
    }

    info!(podcasts_created = session.podcasts_created(), "Session ended");
    Ok(())
}
