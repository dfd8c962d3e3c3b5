//! Podcast script writing.
//!
//! Rewrites article text as a warm, conversational script meant to be read
//! aloud. The writer makes exactly one LLM call; failures produce an empty
//! [`Script`] rather than an error, leaving the pipeline to report them.

use crate::api::AskAsync;
use crate::models::{MAX_SCRIPT_CHARS, Script};
use crate::utils::{truncate_chars, truncate_for_log};
use tracing::{info, instrument, warn};

/// Instruction sent with every script request.
pub const SYSTEM_PROMPT: &str = "You are a professional podcast script writer. \
Create a concise, engaging, conversational summary \
of the article that sounds natural when spoken aloud. Use a warm, friendly tone. \
Include transitions and make it flow smoothly. Limit to 2000 characters. \
Do NOT include intro music fades in and Host in the script. \
Make it interactive by starting with \
Hello Everyone! Today we're diving into an exciting topic.";

/// Wrap article text in the user message sent to the LLM.
pub fn user_prompt(article_text: &str) -> String {
    format!("Transform this article into an engaging podcast script:\n\n{article_text}")
}

/// Ask the LLM for a podcast script.
///
/// # Arguments
///
/// * `client` - Any [`AskAsync`] backend configured with [`SYSTEM_PROMPT`]
/// * `article_text` - The extracted article
///
/// # Returns
///
/// The first completion, trimmed and cut at [`MAX_SCRIPT_CHARS`] characters,
/// or an empty script if the request failed.
#[instrument(level = "info", skip_all, fields(article_chars = article_text.chars().count()))]
pub async fn write_script<C>(client: &C, article_text: &str) -> Script
where
    C: AskAsync<Response = String>,
{
    match client.ask(&user_prompt(article_text)).await {
        Ok(content) => {
            let text = truncate_chars(content.trim(), MAX_SCRIPT_CHARS);
            info!(
                chars = text.chars().count(),
                preview = %truncate_for_log(&text, 80),
                "Script written"
            );
            Script { text }
        }
        Err(e) => {
            warn!(error = %e, "Script writer failed");
            Script::default()
        }
    }
}
