//! Article scraping: download a page and isolate its readable text.
//!
//! Scraping follows a two-phase pattern:
//!
//! 1. **Fetching** ([`fetch`]): download the markup with retries and a TLS
//!    fallback
//! 2. **Extraction** ([`extract`]): pick the title and main-content
//!    paragraphs out of the markup
//!
//! [`scrape_blog`] runs both and never fails outright: any problem yields an
//! empty [`Article`], which the pipeline reports as an extraction failure.

pub mod extract;
pub mod fetch;

use crate::models::Article;
use fetch::PageFetcher;
use tracing::{info, instrument, warn};

/// Fetch `url` and extract at most `max_chars` characters of article text.
///
/// # Returns
///
/// The extracted [`Article`], or an empty one if the page could not be
/// downloaded.
#[instrument(level = "info", skip(fetcher))]
pub async fn scrape_blog(fetcher: &PageFetcher, url: &str, max_chars: usize) -> Article {
    let html = match fetcher.fetch(url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "Scraping failed");
            return Article::default();
        }
    };

    let article = extract::extract_article(&html, max_chars);
    info!(
        chars = article.text.chars().count(),
        title = %article.title,
        "Scraped article"
    );
    article
}
