//! Field heuristics for title detail pages.
//!
//! The site has no stable markup, so every field is a cascade of selector
//! strategies with a sentinel default. Nothing here fails.

use crate::core::extractor::{collect_texts, count_matches, first_match, Strategy};
use crate::core::ContentType;
use crate::utils::truncate_chars;
use scraper::Html;

pub const UNKNOWN_TITLE: &str = "Unknown";
pub const DESCRIPTION_LIMIT: usize = 500;
pub const GENRE_LIMIT: usize = 5;
pub const DEFAULT_GENRES: [&str; 2] = ["Vietnamese", "Asian"];
pub const LANGUAGE: &str = "Vietnamese";

const TITLE: &[Strategy] = &[
    Strategy::Text("h1"),
    Strategy::Text("h2"),
    Strategy::Text(".title"),
];

const DESCRIPTION: &[Strategy] = &[
    Strategy::Text(".description"),
    Strategy::Text(".summary"),
    Strategy::Text(".content"),
    Strategy::Text(r#"[class*="intro"]"#),
];

const POSTER: &[Strategy] = &[
    Strategy::Attr(".poster img", &["src", "data-src"]),
    Strategy::Attr(".movie-poster img", &["src", "data-src"]),
    Strategy::Attr(r#"img[class*="poster"]"#, &["src", "data-src"]),
];

const BACKDROP: &[Strategy] = &[
    Strategy::Attr(r#"img[class*="backdrop"]"#, &["src", "data-src"]),
    Strategy::Attr(r#"img[class*="banner"]"#, &["src", "data-src"]),
];

const YEAR: &[Strategy] = &[Strategy::Pattern(r#"[class*="year"]"#, r"(\d{4})")];

const GENRE_SELECTORS: &[&str] = &[r#"[class*="genre"]"#, r#"a[href*="/the-loai/"]"#];

const EPISODE_LINK: &str = r#"a[href*="tap-"]"#;

/// Everything the heuristics could read from one detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMeta {
    pub title: String,
    /// Already truncated; `None` when no description-like element had text.
    pub description: Option<String>,
    pub poster: String,
    pub backdrop: String,
    pub genres: Vec<String>,
    pub year: String,
    /// Raw count of episode-link anchors.
    pub episode_links: usize,
}

impl PageMeta {
    pub fn content_type(&self) -> ContentType {
        if self.episode_links > 0 {
            ContentType::Series
        } else {
            ContentType::Movie
        }
    }

    pub fn episode_count(&self) -> u32 {
        u32::try_from(self.episode_links.max(1)).unwrap_or(u32::MAX)
    }

    /// Description, or the `"<language> <type> from <host>"` fallback.
    pub fn description_or_default(&self, source_host: &str) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| fallback_description(self.content_type(), source_host))
    }
}

pub fn fallback_description(content_type: ContentType, source_host: &str) -> String {
    format!("{} {} from {}", LANGUAGE, content_type, source_host)
}

pub fn extract_page_meta(html: &str) -> PageMeta {
    let doc = Html::parse_document(html);

    let poster = first_match(&doc, POSTER).unwrap_or_default();
    let backdrop = first_match(&doc, BACKDROP).unwrap_or_else(|| poster.clone());

    let mut genres = collect_texts(&doc, GENRE_SELECTORS, GENRE_LIMIT);
    if genres.is_empty() {
        genres = DEFAULT_GENRES.iter().map(|g| g.to_string()).collect();
    }

    PageMeta {
        title: first_match(&doc, TITLE).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        description: first_match(&doc, DESCRIPTION).map(|d| truncate_chars(&d, DESCRIPTION_LIMIT)),
        poster,
        backdrop,
        genres,
        year: first_match(&doc, YEAR).unwrap_or_default(),
        episode_links: count_matches(&doc, EPISODE_LINK),
    }
}

/// Readiness check for detail pages: a title heading has rendered.
pub fn has_title(html: &str) -> bool {
    let doc = Html::parse_document(html);
    first_match(&doc, TITLE).is_some()
}
