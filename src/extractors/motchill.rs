use crate::config::Config;
use crate::core::{ContentSlug, ContentType, MetaRecord, SessionBackend, SessionManager, StreamRecord};
use crate::extractors::{CatalogHarvester, MetaExtractor, ScrapeContext, StreamResolver};
use crate::mapping::MappingStore;
use std::sync::Arc;
use tracing::debug;

/// A content id from the catalog client, reduced to slug and episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub slug: ContentSlug,
    pub episode: Option<u32>,
}

/// Entry point for everything the front door asks of the site.
#[derive(Clone)]
pub struct MotchillExtractor {
    config: Arc<Config>,
    mapping: Arc<MappingStore>,
    catalog: CatalogHarvester,
    meta: MetaExtractor,
    streams: StreamResolver,
}

impl MotchillExtractor {
    pub fn new(config: Arc<Config>, backend: Arc<dyn SessionBackend>, mapping: Arc<MappingStore>) -> Self {
        let ctx = ScrapeContext::new(config.clone(), SessionManager::new(backend));
        let meta = MetaExtractor::new(ctx.clone(), mapping.clone());
        Self {
            config,
            mapping,
            catalog: CatalogHarvester::new(ctx.clone(), meta.clone()),
            meta,
            streams: StreamResolver::new(ctx),
        }
    }

    pub fn name(&self) -> &'static str {
        "motchill"
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mapping(&self) -> &MappingStore {
        &self.mapping
    }

    pub async fn get_catalog(&self, content_type: ContentType, search: Option<&str>) -> Vec<MetaRecord> {
        self.catalog.get_catalog(content_type, search).await
    }

    pub async fn get_meta(&self, slug: &ContentSlug) -> MetaRecord {
        self.meta.get_meta(slug).await
    }

    pub async fn get_video_sources(&self, slug: &ContentSlug, episode: Option<u32>) -> Vec<StreamRecord> {
        self.streams.get_video_sources(slug, episode).await
    }

    /// Parse a client id into slug and episode.
    ///
    /// Accepts `vietsub-<slug>`, `<external-id>` (translated through the
    /// mapping table), a bare slug, or any of these followed by `:<episode>` or
    /// `:<season>:<episode>`.
    pub fn parse_id(&self, id: &str) -> Option<ContentRef> {
        let id = id.trim().trim_end_matches(".json");
        let mut parts = id.split(':');
        let base = parts.next()?.trim();
        let episode = parts.last().and_then(|ep| ep.trim().parse::<u32>().ok());

        let slug = if is_external_id(base) {
            let slug = self.mapping.slug_for(base);
            if slug.is_none() {
                debug!("No slug mapped for external id {}", base);
            }
            slug?
        } else {
            ContentSlug::from_id(base)?
        };

        Some(ContentRef { slug, episode })
    }
}

/// IMDb-style ids: `tt` followed by digits.
pub fn is_external_id(id: &str) -> bool {
    id.strip_prefix("tt")
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PageSession, Result, ScrapeError};
    use async_trait::async_trait;

    struct NoBrowser;

    #[async_trait]
    impl SessionBackend for NoBrowser {
        async fn open(&self) -> Result<Box<dyn PageSession>> {
            Err(ScrapeError::session("no browser in unit tests"))
        }
    }

    fn extractor() -> MotchillExtractor {
        MotchillExtractor::new(
            Arc::new(Config::default()),
            Arc::new(NoBrowser),
            Arc::new(MappingStore::with_defaults()),
        )
    }

    #[test]
    fn parses_client_ids() {
        let ex = extractor();
        let r = ex.parse_id("vietsub-con-ra-the-thong-gi-nua").unwrap();
        assert_eq!(r.slug.as_str(), "con-ra-the-thong-gi-nua");
        assert_eq!(r.episode, None);

        let r = ex.parse_id("vietsub-phim-a:1:4").unwrap();
        assert_eq!(r.slug.as_str(), "phim-a");
        assert_eq!(r.episode, Some(4));

        let r = ex.parse_id("tt35231547:1:2").unwrap();
        assert_eq!(r.slug.as_str(), "con-ra-the-thong-gi-nua");
        assert_eq!(r.episode, Some(2));

        assert!(ex.parse_id("tt0000001").is_none());
        assert!(ex.parse_id("vietsub-").is_none());
    }

    #[test]
    fn external_id_shape() {
        assert!(is_external_id("tt35231547"));
        assert!(!is_external_id("tt"));
        assert!(!is_external_id("tthe-movie"));
    }

    #[tokio::test]
    async fn failures_degrade_instead_of_erroring() {
        let ex = extractor();
        let slug = ContentSlug::new("phim-a").unwrap();

        assert!(ex.get_catalog(ContentType::Movie, None).await.is_empty());
        assert!(ex.get_video_sources(&slug, Some(1)).await.is_empty());

        let meta = ex.get_meta(&slug).await;
        assert_eq!(meta.id, "vietsub-phim-a");
        assert_eq!(meta.name, "Unknown");
        assert_eq!(meta.content_type, ContentType::Movie);
    }
}
