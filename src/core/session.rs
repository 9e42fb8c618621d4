//! Session lifecycle and the page capabilities the scrapers rely on.
//!
//! Every operation gets a fresh browsing context from a [`SessionBackend`],
//! drives it through [`PageSession`], and closes it before returning. Nothing
//! is pooled.

use crate::core::error::{Result, ScrapeError};
use crate::core::metadata::PlayerState;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SNAPSHOT_SCRIPT: &str = "document.documentElement.outerHTML";

const PLAYER_STATE_SCRIPT: &str = r#"
(() => {
    if (!window.jwplayer) {
        return null;
    }
    try {
        const playlist = window.jwplayer().getPlaylist();
        if (!playlist || !playlist[0]) {
            return null;
        }
        return {
            file: playlist[0].file || null,
            sources: (playlist[0].sources || []).map(s => ({ file: s.file || null, label: s.label || null }))
        };
    } catch (e) {
        return { error: String(e && e.message || e) };
    }
})()
"#;

/// Capabilities of one open page. Implemented by the Chromium backend and by
/// scripted fakes in tests.
#[async_trait]
pub trait PageSession: Send {
    /// Load `url` and wait for the load event, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&mut self, script: &str) -> Result<Value>;

    async fn close(&mut self) -> Result<()>;

    /// Serialized DOM of the current page.
    async fn html(&mut self) -> Result<String> {
        match self.evaluate(SNAPSHOT_SCRIPT).await? {
            Value::String(html) => Ok(html),
            other => Err(ScrapeError::script(format!(
                "document snapshot returned {}",
                other
            ))),
        }
    }

    /// Click the first `selector` match whose trimmed text equals `text`.
    /// Returns whether a matching element was found.
    async fn click_by_text(&mut self, selector: &str, text: &str) -> Result<bool> {
        let script = format!(
            "(() => {{ const target = Array.from(document.querySelectorAll({sel})).find(el => (el.textContent || '').trim() === {text}); if (!target) {{ return false; }} target.click(); return true; }})()",
            sel = js_string(selector),
            text = js_string(text),
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    /// Head entry of the embedded player's playlist, if a player is present.
    async fn read_player_state(&mut self) -> Result<Option<PlayerState>> {
        let value = self.evaluate(PLAYER_STATE_SCRIPT).await?;
        parse_player_state(value)
    }
}

/// Source of fresh browsing contexts.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}

fn js_string(value: &str) -> String {
    // A JSON string literal is a valid JavaScript string literal.
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub(crate) fn parse_player_state(value: Value) -> Result<Option<PlayerState>> {
    if value.is_null() {
        return Ok(None);
    }
    if let Some(err) = value.get("error").and_then(Value::as_str) {
        return Err(ScrapeError::script(err));
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(ScrapeError::script)
}

/// Hands each unit of work its own page and tears it down afterwards.
#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    /// Run `work` against a fresh page.
    ///
    /// The page is closed whether `work` succeeds or fails. If the page cannot
    /// be opened, `work` never runs and the acquisition error is returned.
    pub async fn with_session<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut dyn PageSession) -> BoxFuture<'a, Result<T>> + Send,
    {
        let mut page = self.backend.open().await?;
        debug!("Session opened");

        let result = work(page.as_mut()).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close session cleanly: {}", e);
        }
        debug!("Session closed");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingPage {
        closed: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PageSession for CountingPage {
        async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
            if url.contains("broken") {
                return Err(ScrapeError::NavigationTimeout {
                    url: url.to_string(),
                    secs: 30,
                });
            }
            Ok(())
        }

        async fn evaluate(&mut self, script: &str) -> Result<Value> {
            self.log.lock().unwrap().push(script.to_string());
            Ok(Value::Bool(true))
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingBackend {
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl CountingBackend {
        fn new(fail: bool) -> Self {
            Self {
                opened: AtomicUsize::new(0),
                closed: Arc::new(AtomicUsize::new(0)),
                log: Arc::new(Mutex::new(Vec::new())),
                fail,
            }
        }
    }

    #[async_trait]
    impl SessionBackend for CountingBackend {
        async fn open(&self) -> Result<Box<dyn PageSession>> {
            if self.fail {
                return Err(ScrapeError::session("no browser"));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingPage {
                closed: self.closed.clone(),
                log: self.log.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn closes_page_on_success_and_failure() {
        let backend = Arc::new(CountingBackend::new(false));
        let manager = SessionManager::new(backend.clone());

        let ok = manager
            .with_session(|page| Box::pin(async move { page.navigate("https://ok", Duration::from_secs(1)).await }))
            .await;
        assert!(ok.is_ok());

        let err = manager
            .with_session(|page| Box::pin(async move { page.navigate("https://broken", Duration::from_secs(1)).await }))
            .await;
        assert!(matches!(err, Err(ScrapeError::NavigationTimeout { .. })));

        assert_eq!(backend.opened.load(Ordering::SeqCst), 2);
        assert_eq!(backend.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn acquisition_failure_skips_work() {
        let manager = SessionManager::new(Arc::new(CountingBackend::new(true)));
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        let result = manager
            .with_session(move |_page| {
                Box::pin(async move {
                    flag.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), ScrapeError>(())
                })
            })
            .await;
        assert!(matches!(result, Err(ScrapeError::Session(_))));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn click_script_escapes_label() {
        let backend = Arc::new(CountingBackend::new(false));
        let manager = SessionManager::new(backend.clone());
        let clicked = manager
            .with_session(|page| Box::pin(async move { page.click_by_text("button", "Server \"2\"").await }))
            .await
            .unwrap();
        assert!(clicked);
        let log = backend.log.lock().unwrap();
        assert!(log[0].contains(r#""Server \"2\"""#));
    }

    #[test]
    fn player_state_parsing() {
        assert_eq!(parse_player_state(Value::Null).unwrap(), None);
        assert!(parse_player_state(serde_json::json!({"error": "boom"})).is_err());
        let state = parse_player_state(serde_json::json!({"file": "https://cdn/a.m3u8"}))
            .unwrap()
            .unwrap();
        assert_eq!(state.media_url(), Some("https://cdn/a.m3u8"));
    }
}
