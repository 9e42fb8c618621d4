pub mod catalog;
pub mod dom;
pub mod meta;
pub mod motchill;
pub mod stream;

use crate::config::Config;
use crate::core::SessionManager;
use std::sync::Arc;

pub use catalog::CatalogHarvester;
pub use meta::MetaExtractor;
pub use motchill::{ContentRef, MotchillExtractor};
pub use stream::StreamResolver;

/// Shared handles every scraping component needs.
#[derive(Clone)]
pub struct ScrapeContext {
    pub config: Arc<Config>,
    pub sessions: SessionManager,
}

impl ScrapeContext {
    pub fn new(config: Arc<Config>, sessions: SessionManager) -> Self {
        Self { config, sessions }
    }

    /// Absolute form of an asset URL found on the site; empty stays empty.
    pub fn absolute_url(&self, path: &str) -> String {
        let path = path.trim();
        if path.is_empty() || path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if let Ok(base) = url::Url::parse(&self.config.base_url) {
            if let Ok(resolved) = base.join(path) {
                return resolved.to_string();
            }
        }
        self.config.page_url(path)
    }
}
