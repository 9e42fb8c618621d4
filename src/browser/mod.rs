//! Headless Chromium backend over the DevTools protocol.
//!
//! Each session launches its own browser (or attaches a fresh tab to a remote
//! one) and tears it down on close.

use crate::config::BrowserSettings;
use crate::core::{PageSession, Result, ScrapeError, SessionBackend};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Common Chrome executable locations, checked before falling back to
/// chromiumoxide's own detection.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

pub struct ChromiumBackend {
    settings: BrowserSettings,
    request_timeout: Duration,
}

impl ChromiumBackend {
    pub fn new(settings: BrowserSettings, request_timeout: Duration) -> Self {
        Self {
            settings,
            request_timeout,
        }
    }

    fn chrome_executable(&self) -> Option<PathBuf> {
        if let Some(path) = &self.settings.chrome_executable {
            return Some(path.clone());
        }
        CHROME_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>)> {
        info!("Launching browser (headless={})", self.settings.headless);

        let mut builder = BrowserConfig::builder().request_timeout(self.request_timeout);
        if let Some(path) = self.chrome_executable() {
            debug!("Using Chrome at {}", path.display());
            builder = builder.chrome_executable(path);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &self.settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| ScrapeError::session(format!("invalid browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::session(format!("failed to launch browser: {}", e)))?;
        Ok(spawn_handler(browser, handler))
    }

    async fn connect(&self, remote_url: &str) -> Result<(Browser, JoinHandle<()>)> {
        info!("Connecting to remote browser at {}", remote_url);

        let http_url = remote_url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let version: Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ScrapeError::session(format!("failed to reach remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| ScrapeError::session(format!("bad browser version info: {}", e)))?;

        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| ScrapeError::session("no webSocketDebuggerUrl in response"))?;

        let handler_config = HandlerConfig {
            request_timeout: self.request_timeout,
            ..Default::default()
        };
        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| ScrapeError::session(format!("failed to connect to remote browser: {}", e)))?;
        Ok(spawn_handler(browser, handler))
    }
}

fn spawn_handler(browser: Browser, mut handler: chromiumoxide::Handler) -> (Browser, JoinHandle<()>) {
    // The CDP event loop must be polled for the browser to make progress.
    let task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });
    (browser, task)
}

#[async_trait]
impl SessionBackend for ChromiumBackend {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let owned = self.settings.remote_url.is_none();
        let (mut browser, handler) = match &self.settings.remote_url {
            Some(url) => self.connect(url).await?,
            None => self.launch().await?,
        };

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if owned {
                    let _ = browser.close().await;
                    let _ = browser.wait().await;
                }
                handler.abort();
                return Err(ScrapeError::session(format!("failed to open page: {}", e)));
            }
        };

        if let Err(e) = page
            .execute(SetUserAgentOverrideParams::new(self.settings.user_agent.clone()))
            .await
        {
            warn!("Failed to override user agent: {}", e);
        }

        Ok(Box::new(ChromiumSession {
            browser,
            page: Some(page),
            owned,
            handler: Some(handler),
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    /// Whether this session launched the browser and must shut it down.
    owned: bool,
    handler: Option<JoinHandle<()>>,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::session("page already closed"))
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        debug!("Navigating to {}", url);
        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| ScrapeError::NavigationTimeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            })?
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(ScrapeError::script)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page close failed: {}", e);
            }
        }
        if self.owned {
            self.browser
                .close()
                .await
                .map_err(|e| ScrapeError::session(format!("failed to close browser: {}", e)))?;
            if let Err(e) = self.browser.wait().await {
                debug!("Browser process wait failed: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
