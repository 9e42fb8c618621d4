//! Stream resolution by driving the play page's server buttons.
//!
//! Selecting a server reconfigures the single embedded player, so options are
//! probed one after another inside one session.

use crate::core::extractor::{element_text, parse_selector};
use crate::core::{ContentSlug, PageSession, Result, ScrapeError, ServerOption, ServerStream, StreamRecord};
use crate::extractors::ScrapeContext;
use crate::utils::Poller;
use scraper::Html;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const SERVER_BUTTONS: &str = "button";
const MAX_LABEL_CHARS: usize = 50;

/// Lower-cased label fragments that mark a button as a server switch.
const SERVER_MARKERS: &[&str] = &["vietsub", "thuyết minh", "thuyetminh", "server"];

/// Prefix of every stream name.
pub const STREAM_LANGUAGE: &str = "VietSub";

#[derive(Clone)]
pub struct StreamResolver {
    ctx: ScrapeContext,
}

impl StreamResolver {
    pub fn new(ctx: ScrapeContext) -> Self {
        Self { ctx }
    }

    /// Playable streams for one episode. Empty when no server resolved.
    pub async fn get_video_sources(&self, slug: &ContentSlug, episode: Option<u32>) -> Vec<StreamRecord> {
        let servers = match self.resolve_servers(slug, episode.unwrap_or(1)).await {
            Ok(servers) => servers,
            Err(e) => {
                warn!("Error scraping servers from {}: {}", slug, e);
                return Vec::new();
            }
        };

        let streams = to_stream_records(&servers, episode);
        if streams.is_empty() {
            warn!("No servers found for {} episode {:?}", slug, episode);
        } else {
            info!("Found {} stream(s) for {} episode {:?}", streams.len(), slug, episode);
        }
        streams
    }

    /// Every discovered server option with the URL it resolved to (empty when
    /// the probe failed).
    pub async fn resolve_servers(&self, slug: &ContentSlug, episode: u32) -> Result<Vec<ServerStream>> {
        let config = &self.ctx.config;
        let probe = ProbePlan {
            url: play_url(&config.base_url, slug, episode),
            active_marker: config.active_server_marker.clone(),
            nav_timeout: config.navigation_timeout(),
            interval: config.poll_interval(),
            settle: config.settle_timeout(),
            player_timeout: config.player_timeout(),
        };

        self.ctx
            .sessions
            .with_session(move |page| Box::pin(probe_servers(page, probe)))
            .await
    }
}

/// `<base>/xem-phim-<slug>-tap-<episode>`
pub fn play_url(base_url: &str, slug: &ContentSlug, episode: u32) -> String {
    format!(
        "{}/xem-phim-{}-tap-{}",
        base_url.trim_end_matches('/'),
        slug,
        episode
    )
}

/// Turn probe results into outward stream records, dropping unresolved ones.
pub fn to_stream_records(servers: &[ServerStream], episode: Option<u32>) -> Vec<StreamRecord> {
    servers
        .iter()
        .filter(|s| !s.url.trim().is_empty())
        .map(|s| {
            let name = match episode {
                Some(ep) => format!("{} - Tập {} - {}", STREAM_LANGUAGE, ep, s.label),
                None => format!("{} - {}", STREAM_LANGUAGE, s.label),
            };
            StreamRecord {
                name,
                title: s.label.clone(),
                url: s.url.clone(),
            }
        })
        .collect()
}

/// Server buttons on a play page, one per distinct label, in page order.
///
/// `active_marker` is the class fragment the site puts on the selected button.
pub fn discover_servers(html: &str, active_marker: &str) -> Vec<ServerOption> {
    let doc = Html::parse_document(html);
    let Some(buttons) = parse_selector(SERVER_BUTTONS) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut options = Vec::new();
    for button in doc.select(&buttons) {
        let label = button.text().collect::<String>().trim().to_string();
        if label.is_empty() || label.chars().count() >= MAX_LABEL_CHARS {
            continue;
        }
        let lower = label.to_lowercase();
        if !SERVER_MARKERS.iter().any(|m| lower.contains(m)) {
            continue;
        }
        if !seen.insert(label.clone()) {
            continue;
        }
        let is_selected = !active_marker.is_empty()
            && button.value().classes().any(|c| c.contains(active_marker));
        options.push(ServerOption { label, is_selected });
    }
    options
}

struct ProbePlan {
    url: String,
    active_marker: String,
    nav_timeout: Duration,
    interval: Duration,
    settle: Duration,
    player_timeout: Duration,
}

async fn probe_servers(page: &mut dyn PageSession, plan: ProbePlan) -> Result<Vec<ServerStream>> {
    info!("Navigating to: {}", plan.url);
    page.navigate(&plan.url, plan.nav_timeout).await?;

    let mut poller = Poller::new(plan.interval, plan.settle);
    let options = loop {
        let html = page.html().await?;
        let options = discover_servers(&html, &plan.active_marker);
        if !options.is_empty() || !poller.tick().await {
            break options;
        }
    };
    debug!("Discovered {} server option(s)", options.len());

    let mut previous = current_media_url(page).await;
    let mut results = Vec::with_capacity(options.len());
    for (index, option) in options.into_iter().enumerate() {
        debug!("Testing server: {}", option.label);
        // Until the first click the player still shows the selected option's stream.
        let untouched = index == 0;
        let url = match probe_option(page, &option, previous.as_deref(), untouched, &plan).await {
            Ok(url) => {
                previous = Some(url.clone());
                url
            }
            Err(e) => {
                warn!("{}", e);
                String::new()
            }
        };
        results.push(ServerStream {
            label: option.label,
            url,
            is_selected: option.is_selected,
        });
    }
    Ok(results)
}

/// Click one option and wait for the player to expose its media URL.
///
/// `previous` is the URL the player showed before this click. A reading equal
/// to it is only accepted at once for the selected option on an untouched
/// page; otherwise the player may not have switched yet, and it is used only
/// once the wait has run out.
async fn probe_option(
    page: &mut dyn PageSession,
    option: &ServerOption,
    previous: Option<&str>,
    untouched: bool,
    plan: &ProbePlan,
) -> Result<String> {
    let probe_err = |reason: String| ScrapeError::Probe {
        label: option.label.clone(),
        reason,
    };

    let clicked = page
        .click_by_text(SERVER_BUTTONS, &option.label)
        .await
        .map_err(|e| probe_err(e.to_string()))?;
    if !clicked {
        return Err(probe_err("button disappeared".to_string()));
    }

    let mut poller = Poller::new(plan.interval, plan.player_timeout);
    let mut last_seen: Option<String> = None;
    let mut last_error: Option<String> = None;
    loop {
        match page.read_player_state().await {
            Ok(Some(state)) => {
                if let Some(url) = state.media_url() {
                    if (option.is_selected && untouched) || previous != Some(url) {
                        return Ok(url.to_string());
                    }
                    last_seen = Some(url.to_string());
                }
            }
            Ok(None) => {}
            Err(e) => last_error = Some(e.to_string()),
        }
        if !poller.tick().await {
            break;
        }
    }

    last_seen.ok_or_else(|| probe_err(last_error.unwrap_or_else(|| "player exposed no media URL".to_string())))
}

async fn current_media_url(page: &mut dyn PageSession) -> Option<String> {
    match page.read_player_state().await {
        Ok(state) => state.and_then(|s| s.media_url().map(str::to_string)),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAY_PAGE: &str = r##"
        <html><body>
            <button class="px-2 bg-[#A3765D] text-white">Vietsub #1</button>
            <button class="px-2">Thuyết Minh #1</button>
            <button>Server 2</button>
            <button>Server 2</button>
            <button>Tập 2</button>
            <button>   </button>
            <button>This server label is far too long to be a real server button</button>
        </body></html>"##;

    #[test]
    fn discovers_server_buttons() {
        let options = discover_servers(PLAY_PAGE, "#A3765D");
        assert_eq!(
            options,
            vec![
                ServerOption { label: "Vietsub #1".into(), is_selected: true },
                ServerOption { label: "Thuyết Minh #1".into(), is_selected: false },
                ServerOption { label: "Server 2".into(), is_selected: false },
            ]
        );
    }

    #[test]
    fn no_buttons_no_options() {
        assert!(discover_servers("<div>loading</div>", "#A3765D").is_empty());
    }

    #[test]
    fn play_url_template() {
        let slug = ContentSlug::new("con-ra-the-thong-gi-nua").unwrap();
        assert_eq!(
            play_url("https://motchilltv.chat/", &slug, 3),
            "https://motchilltv.chat/xem-phim-con-ra-the-thong-gi-nua-tap-3"
        );
    }

    #[test]
    fn stream_names_and_empty_urls() {
        let servers = vec![
            ServerStream { label: "Vietsub #1".into(), url: "https://cdn/a.m3u8".into(), is_selected: true },
            ServerStream { label: "Server 2".into(), url: String::new(), is_selected: false },
        ];
        let with_episode = to_stream_records(&servers, Some(2));
        assert_eq!(with_episode.len(), 1);
        assert_eq!(with_episode[0].name, "VietSub - Tập 2 - Vietsub #1");
        assert_eq!(with_episode[0].url, "https://cdn/a.m3u8");

        let without = to_stream_records(&servers, None);
        assert_eq!(without[0].name, "VietSub - Vietsub #1");
    }
}
