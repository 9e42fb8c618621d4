use crate::utils::normalize_whitespace;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// One way of pulling a value out of a document.
///
/// Fields are described as an ordered list of strategies; the first one that
/// yields a non-empty value wins.
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// Text content of the first element matching the selector that has any.
    Text(&'static str),
    /// First non-empty attribute (in the listed order) on a matching element.
    Attr(&'static str, &'static [&'static str]),
    /// First capture of `pattern` found in the text of a matching element.
    Pattern(&'static str, &'static str),
}

impl Strategy {
    pub fn apply(&self, doc: &Html) -> Option<String> {
        match *self {
            Strategy::Text(selector) => select(doc, selector)
                .map(|el| element_text(&el))
                .find(|text| !text.is_empty()),
            Strategy::Attr(selector, attrs) => select(doc, selector).find_map(|el| {
                attrs
                    .iter()
                    .filter_map(|attr| el.value().attr(attr))
                    .map(str::trim)
                    .find(|value| !value.is_empty())
                    .map(str::to_string)
            }),
            Strategy::Pattern(selector, pattern) => {
                let re = match Regex::new(pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        warn!("Invalid extraction pattern {}: {}", pattern, e);
                        return None;
                    }
                };
                select(doc, selector).find_map(|el| {
                    let text = element_text(&el);
                    re.captures(&text)
                        .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                        .map(|m| m.as_str().to_string())
                })
            }
        }
    }
}

/// Apply `strategies` in order and return the first hit.
pub fn first_match(doc: &Html, strategies: &[Strategy]) -> Option<String> {
    strategies.iter().find_map(|strategy| strategy.apply(doc))
}

/// Non-empty texts of elements matching any of `selectors`, in document order,
/// capped at `limit`.
pub fn collect_texts(doc: &Html, selectors: &[&str], limit: usize) -> Vec<String> {
    let Some(selector) = parse_selector(&selectors.join(", ")) else {
        return Vec::new();
    };
    doc.select(&selector)
        .map(|el| element_text(&el))
        .filter(|text| !text.is_empty())
        .take(limit)
        .collect()
}

pub fn count_matches(doc: &Html, selector: &str) -> usize {
    parse_selector(selector)
        .map(|sel| doc.select(&sel).count())
        .unwrap_or(0)
}

pub fn element_text(el: &ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

pub fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("Invalid selector {}: {:?}", selector, e);
            None
        }
    }
}

fn select<'a>(doc: &'a Html, selector: &str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let matches: Vec<ElementRef<'a>> = match parse_selector(selector) {
        Some(sel) => doc.select(&sel).collect(),
        None => Vec::new(),
    };
    matches.into_iter()
}
