//! Addon HTTP server: manifest, catalog, meta and stream endpoints.

mod handlers;
mod routes;

pub use handlers::{ADDON_ID, MOVIE_CATALOG, SERIES_CATALOG};
pub use routes::create_router;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;

use crate::extractors::MotchillExtractor;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<MotchillExtractor>,
}

impl AppState {
    pub fn new(extractor: MotchillExtractor) -> Self {
        Self {
            extractor: Arc::new(extractor),
        }
    }
}

/// Start the server and run until the listener fails.
pub async fn serve(extractor: MotchillExtractor, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(AppState::new(extractor));

    let addr = listen_addr(host, port)?;
    tracing::info!("VietSub addon running on http://{}", addr);
    tracing::info!("Add to Stremio: http://{}/manifest.json", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Socket address for a bind host; IPv6 hosts such as `::` need no brackets.
pub fn listen_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let ip: IpAddr = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .with_context(|| format!("Invalid bind address: {}", host))?;
    Ok(SocketAddr::new(ip, port))
}
