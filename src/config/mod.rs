use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the source site, without trailing slash.
    pub base_url: String,
    /// Path of the listing page harvested for catalogs.
    pub listing_path: String,
    /// Top-level navigation bound, in seconds.
    pub navigation_timeout: u64,
    /// Upper bound for waiting on client-side rendering after load, in ms.
    pub settle_timeout_ms: u64,
    /// Upper bound for the player to reconfigure after a server click, in ms.
    pub player_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Class fragment marking the currently selected server button.
    pub active_server_marker: String,
    pub max_candidates: usize,
    pub max_enriched: usize,
    pub mapping_file: Option<PathBuf>,
    pub bind: String,
    pub port: u16,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub chrome_args: Vec<String>,
    /// DevTools endpoint (e.g. `ws://localhost:9222`) to use instead of launching.
    pub remote_url: Option<String>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://motchilltv.chat".to_string(),
            listing_path: "/".to_string(),
            navigation_timeout: 30,
            settle_timeout_ms: 3000,
            player_timeout_ms: 3000,
            poll_interval_ms: 250,
            active_server_marker: "#A3765D".to_string(),
            max_candidates: 50,
            max_enriched: 20,
            mapping_file: None,
            bind: "0.0.0.0".to_string(),
            port: 7000,
            browser: BrowserSettings::default(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            chrome_args: Vec::new(),
            remote_url: None,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file when given, otherwise defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.base_url)
            .with_context(|| format!("base_url is not a valid URL: {}", self.base_url))?;
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn player_timeout(&self) -> Duration {
        Duration::from_millis(self.player_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Host name used in fallback descriptions, e.g. `motchilltv.chat`.
    pub fn source_host(&self) -> String {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.base_url.clone())
    }

    pub fn page_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_source_site() {
        let config = Config::default();
        assert_eq!(config.source_host(), "motchilltv.chat");
        assert_eq!(config.page_url("/foo"), "https://motchilltv.chat/foo");
        assert_eq!(config.navigation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8080\n[browser]\nheadless = false").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.browser.headless);
        assert_eq!(config.max_candidates, 50);
    }

    #[test]
    fn rejects_bad_base_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"not a url\"").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
