use crate::core::extractor::{element_text, parse_selector};
use crate::core::{CatalogEntry, ContentSlug, ContentType, MetaRecord, PageSession, Result, ScrapeError};
use crate::extractors::dom::fallback_description;
use crate::extractors::{MetaExtractor, ScrapeContext};
use crate::utils::{fold_vietnamese, Poller};
use scraper::Html;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const CANDIDATE_LINKS: &str = r#"a[href^="/"], a[href^="http"]"#;

/// Index pages that link to many titles but are not titles themselves.
const EXCLUDED_PATHS: &[&str] = &["/the-loai/", "/quoc-gia/", "/search", "/tag/"];

const MIN_TITLE_CHARS: usize = 2;
const MAX_TITLE_CHARS: usize = 100;

/// Enumerates titles on the listing page and enriches them one by one.
#[derive(Clone)]
pub struct CatalogHarvester {
    ctx: ScrapeContext,
    meta: MetaExtractor,
}

impl CatalogHarvester {
    pub fn new(ctx: ScrapeContext, meta: MetaExtractor) -> Self {
        Self { ctx, meta }
    }

    /// Catalog for `content_type`, optionally narrowed to titles containing
    /// `search`. Never fails: a dead listing page yields an empty catalog.
    pub async fn get_catalog(&self, content_type: ContentType, search: Option<&str>) -> Vec<MetaRecord> {
        let mut entries = match self.harvest().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Error scraping catalog: {}", e);
                return Vec::new();
            }
        };

        if let Some(query) = search.map(fold_vietnamese).filter(|q| !q.is_empty()) {
            entries.retain(|entry| fold_vietnamese(&entry.title).contains(&query));
        }

        let limit = self.ctx.config.max_enriched;
        info!(
            "Enriching {} of {} catalog entries",
            entries.len().min(limit),
            entries.len()
        );

        // One detail session at a time; the site is not hit in parallel.
        let mut catalog = Vec::with_capacity(entries.len().min(limit));
        for entry in entries.iter().take(limit) {
            match self.meta.fetch(&entry.slug).await {
                Ok(meta) => catalog.push(meta),
                Err(e) => {
                    debug!("Falling back to listing data for {}: {}", entry.slug, e);
                    catalog.push(self.degraded_record(entry, content_type));
                }
            }
        }
        catalog
    }

    /// De-duplicated candidates from the listing page, in first-seen order.
    pub async fn harvest(&self) -> Result<Vec<CatalogEntry>> {
        let config = &self.ctx.config;
        let url = config.page_url(&config.listing_path);
        let base = Url::parse(&config.base_url).map_err(|e| ScrapeError::Config(e.to_string()))?;

        info!("Harvesting catalog from {}", url);
        let listing = ListingLoad {
            url,
            base,
            limit: config.max_candidates,
            nav_timeout: config.navigation_timeout(),
            interval: config.poll_interval(),
            settle: config.settle_timeout(),
        };
        let entries = self
            .ctx
            .sessions
            .with_session(move |page| Box::pin(load_listing(page, listing)))
            .await?;

        info!("Found {} catalog candidates", entries.len());
        Ok(entries)
    }

    fn degraded_record(&self, entry: &CatalogEntry, content_type: ContentType) -> MetaRecord {
        let mut meta = MetaRecord::minimal(entry.slug.to_id(), content_type, entry.title.clone());
        meta.poster = Some(self.ctx.absolute_url(&entry.poster_url)).filter(|p| !p.is_empty());
        meta.description = Some(fallback_description(
            content_type,
            &self.ctx.config.source_host(),
        ));
        meta
    }
}

struct ListingLoad {
    url: String,
    base: Url,
    limit: usize,
    nav_timeout: Duration,
    interval: Duration,
    settle: Duration,
}

/// Load the listing page and poll until client-side rendering produced cards.
async fn load_listing(page: &mut dyn PageSession, load: ListingLoad) -> Result<Vec<CatalogEntry>> {
    page.navigate(&load.url, load.nav_timeout).await?;
    let mut poller = Poller::new(load.interval, load.settle);
    loop {
        let html = page.html().await?;
        let entries = harvest_candidates(&html, &load.base, load.limit);
        if !entries.is_empty() || !poller.tick().await {
            return Ok(entries);
        }
    }
}

/// Title cards on a listing page: anchors wrapping an image and a short
/// caption, minus index links. De-duplicated by slug and capped at `limit`.
pub fn harvest_candidates(html: &str, base: &Url, limit: usize) -> Vec<CatalogEntry> {
    let doc = Html::parse_document(html);
    let (Some(links), Some(img)) = (parse_selector(CANDIDATE_LINKS), parse_selector("img")) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for link in doc.select(&links) {
        if entries.len() >= limit {
            break;
        }

        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if EXCLUDED_PATHS.iter().any(|p| href.contains(p)) {
            continue;
        }

        let title = element_text(&link);
        let len = title.chars().count();
        if len <= MIN_TITLE_CHARS || len >= MAX_TITLE_CHARS {
            continue;
        }

        let poster = link.select(&img).find_map(|el| {
            ["src", "data-src"]
                .iter()
                .filter_map(|attr| el.value().attr(attr))
                .map(str::trim)
                .find(|v| !v.is_empty())
        });
        let Some(poster) = poster else {
            continue;
        };

        let Some(slug) = slug_from_href(href, base) else {
            continue;
        };
        if seen.insert(slug.clone()) {
            entries.push(CatalogEntry {
                slug,
                title,
                poster_url: poster.to_string(),
            });
        }
    }

    entries
}

/// Reduce an href to a bare slug. Absolute links to other hosts are dropped.
pub fn slug_from_href(href: &str, base: &Url) -> Option<ContentSlug> {
    let path = if href.starts_with("http://") || href.starts_with("https://") {
        let url = Url::parse(href).ok()?;
        let host = url.host_str()?.trim_start_matches("www.");
        let base_host = base.host_str()?.trim_start_matches("www.");
        if host != base_host {
            return None;
        }
        url.path().to_string()
    } else {
        href.split(['?', '#']).next().unwrap_or_default().to_string()
    };
    ContentSlug::new(path)
}
