#[cfg(feature = "browser")]
pub mod browser;
pub mod cli;
pub mod config;
pub mod core;
pub mod extractors;
pub mod mapping;
pub mod server;
pub mod utils;

pub use crate::config::Config;
pub use crate::core::{ContentSlug, ContentType, MetaRecord, PageSession, ScrapeError, SessionBackend, StreamRecord};
pub use crate::extractors::MotchillExtractor;
pub use crate::mapping::{MappingEntry, MappingStore};
