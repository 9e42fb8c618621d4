use thiserror::Error;

/// Failures that can abort a scraping step.
///
/// Field misses and lookup misses are not represented here: extraction
/// degrades to typed defaults and lookups return `Option`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The browsing context could not be acquired or torn down.
    #[error("session error: {0}")]
    Session(String),

    #[error("navigation to {url} timed out after {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A script evaluated inside the page threw or returned garbage.
    #[error("page script failed: {0}")]
    Script(String),

    /// A single server option could not be resolved to a media URL.
    #[error("probe of server '{label}' failed: {reason}")]
    Probe { label: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

impl ScrapeError {
    pub fn session(err: impl std::fmt::Display) -> Self {
        Self::Session(err.to_string())
    }

    pub fn script(err: impl std::fmt::Display) -> Self {
        Self::Script(err.to_string())
    }
}
