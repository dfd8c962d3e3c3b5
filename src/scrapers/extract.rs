//! Main-text extraction from article markup.
//!
//! A deliberately small heuristic: take the page title, then the paragraphs
//! of the primary content container. Pages without `<article>` or `<main>`
//! contribute every `<p>` in document order.

use crate::models::Article;
use crate::utils::truncate_chars;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Extract the title and readable text of a page.
///
/// # Arguments
///
/// * `html` - Raw page markup
/// * `max_chars` - Upper bound on the returned text, in characters
///
/// # Returns
///
/// An [`Article`] whose text is the non-empty paragraph texts joined by a
/// blank line and cut at `max_chars`. Empty markup yields an empty article.
#[instrument(level = "info", skip(html), fields(markup_bytes = html.len()))]
pub fn extract_article(html: &str, max_chars: usize) -> Article {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let container = document
        .select(&ARTICLE)
        .next()
        .or_else(|| document.select(&MAIN).next());

    let text = match container {
        Some(node) => join_paragraphs(node.select(&PARAGRAPH)),
        None => join_paragraphs(document.select(&PARAGRAPH)),
    };
    let text = truncate_chars(&text, max_chars);

    debug!(
        chars = text.chars().count(),
        has_container = container.is_some(),
        %title,
        "Extracted article"
    );
    Article { text, title }
}

/// `<title>` wins even when blank; `<h1>` is only consulted without one.
fn extract_title(document: &Html) -> String {
    if let Some(title) = document.select(&TITLE).next() {
        return element_text(title);
    }
    document
        .select(&H1)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

fn join_paragraphs<'a>(paragraphs: impl Iterator<Item = ElementRef<'a>>) -> String {
    paragraphs
        .map(element_text)
        .filter(|t| !t.is_empty())
        .join("\n\n")
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
