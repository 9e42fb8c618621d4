use crate::core::{ContentSlug, ContentType, MetaRecord, PageSession, Result, Video};
use crate::extractors::dom::{self, PageMeta, UNKNOWN_TITLE};
use crate::extractors::ScrapeContext;
use crate::mapping::MappingStore;
use crate::utils::Poller;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builds a [`MetaRecord`] for one title from its detail page.
#[derive(Clone)]
pub struct MetaExtractor {
    ctx: ScrapeContext,
    mapping: Arc<MappingStore>,
}

impl MetaExtractor {
    pub fn new(ctx: ScrapeContext, mapping: Arc<MappingStore>) -> Self {
        Self { ctx, mapping }
    }

    /// Metadata for `slug`; a minimal record when the page cannot be loaded.
    pub async fn get_meta(&self, slug: &ContentSlug) -> MetaRecord {
        match self.fetch(slug).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Error scraping meta for {}: {}", slug, e);
                MetaRecord::minimal(slug.to_id(), ContentType::Movie, UNKNOWN_TITLE)
            }
        }
    }

    /// Load the detail page and run the field heuristics over it.
    ///
    /// Fails only when the session or the page load fails.
    pub async fn fetch(&self, slug: &ContentSlug) -> Result<MetaRecord> {
        let url = self.ctx.config.page_url(slug.as_str());
        let nav_timeout = self.ctx.config.navigation_timeout();
        let interval = self.ctx.config.poll_interval();
        let settle = self.ctx.config.settle_timeout();

        info!("Fetching metadata from {}", url);
        let html = self
            .ctx
            .sessions
            .with_session(move |page| Box::pin(load_detail_page(page, url, nav_timeout, interval, settle)))
            .await?;

        let page_meta = dom::extract_page_meta(&html);
        debug!(
            "Extracted '{}' ({}, {} episode links)",
            page_meta.title,
            page_meta.content_type(),
            page_meta.episode_links
        );
        Ok(self.build_record(slug, &page_meta))
    }

    pub fn build_record(&self, slug: &ContentSlug, page: &PageMeta) -> MetaRecord {
        let content_type = page.content_type();
        let mut id = slug.to_id();
        let mut aliases = Vec::new();

        if let Some(entry) = self.mapping.metadata_for(slug) {
            if !entry.external_id.is_empty() {
                id = entry.external_id.clone();
            }
            aliases = entry.titles();
        }

        let (episode_count, info, videos) = match content_type {
            ContentType::Series => {
                let count = page.episode_count();
                let videos = (1..=count)
                    .map(|ep| Video {
                        id: format!("{}:1:{}", id, ep),
                        title: format!("Tập {}", ep),
                        season: 1,
                        episode: ep,
                    })
                    .collect();
                (Some(count), Some(vec![format!("Episodes: {}", count)]), videos)
            }
            ContentType::Movie => (None, None, Vec::new()),
        };

        let poster = self.ctx.absolute_url(&page.poster);
        let background = self.ctx.absolute_url(&page.backdrop);

        MetaRecord {
            id,
            content_type,
            name: page.title.clone(),
            poster: Some(poster).filter(|p| !p.is_empty()),
            background: Some(background).filter(|b| !b.is_empty()),
            description: Some(page.description_or_default(&self.ctx.config.source_host())),
            genres: page.genres.clone(),
            year: Some(page.year.clone()).filter(|y| !y.is_empty()),
            episode_count,
            info,
            aliases,
            videos,
        }
    }
}

/// Navigate to a detail page and wait until a title heading has rendered.
async fn load_detail_page(
    page: &mut dyn PageSession,
    url: String,
    nav_timeout: Duration,
    interval: Duration,
    settle: Duration,
) -> Result<String> {
    page.navigate(&url, nav_timeout).await?;
    let mut poller = Poller::new(interval, settle);
    loop {
        let html = page.html().await?;
        if dom::has_title(&html) || !poller.tick().await {
            return Ok(html);
        }
    }
}
