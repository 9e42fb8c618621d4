//! HTTP handlers. Every scrape failure is already degraded by the extractor,
//! so handlers always answer 200 with a well-formed body.

use std::collections::HashMap;

use axum::{
    extract::{OriginalUri, Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::core::{ContentType, MetaRecord, StreamRecord, ID_PREFIX};

pub const ADDON_ID: &str = "org.vietsub.motchill";
pub const MOVIE_CATALOG: &str = "vietsub-movies";
pub const SERIES_CATALOG: &str = "vietsub-series";

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub metas: Vec<MetaRecord>,
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub meta: Value,
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub streams: Vec<StreamRecord>,
}

pub async fn health() -> impl IntoResponse {
    "VietSub addon is running!"
}

pub async fn manifest(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "id": ADDON_ID,
        "version": env!("CARGO_PKG_VERSION"),
        "name": "VietSub Motchill",
        "description": format!("Vietnamese movies and TV shows from {}", state.extractor.config().source_host()),
        "types": ["movie", "series"],
        "resources": ["catalog", "meta", "stream"],
        "catalogs": [
            {
                "type": "movie",
                "id": MOVIE_CATALOG,
                "name": "Vietnamese Movies",
                "extra": [{ "name": "search", "isRequired": false }]
            },
            {
                "type": "series",
                "id": SERIES_CATALOG,
                "name": "Vietnamese Series",
                "extra": [{ "name": "search", "isRequired": false }]
            }
        ],
        "idPrefixes": [ID_PREFIX, "tt"]
    }))
}

pub async fn catalog(
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<CatalogResponse> {
    let search = query.get("search").map(String::as_str);
    Json(run_catalog(&state, &content_type, &id, search).await)
}

/// `/catalog/:type/:id/search=<q>.json`
///
/// The extra segment is read from the raw URI: `Path` would already have
/// percent-decoded an encoded `&` into a pair separator.
pub async fn catalog_with_extra(
    State(state): State<AppState>,
    Path((content_type, id, _extra)): Path<(String, String, String)>,
    OriginalUri(uri): OriginalUri,
) -> Json<CatalogResponse> {
    let raw_extra = uri.path().rsplit('/').next().unwrap_or_default();
    let extras = parse_extra(raw_extra);
    let search = extras.get("search").map(String::as_str);
    Json(run_catalog(&state, &content_type, &id, search).await)
}

async fn run_catalog(state: &AppState, content_type: &str, id: &str, search: Option<&str>) -> CatalogResponse {
    let id = strip_json(id);
    let metas = match ContentType::parse(content_type) {
        Some(content_type) if is_known_catalog(id) => {
            info!("Catalog request: {} / {} (search: {:?})", content_type, id, search);
            state.extractor.get_catalog(content_type, search).await
        }
        _ => Vec::new(),
    };
    CatalogResponse { metas }
}

pub async fn meta(
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
) -> Json<MetaResponse> {
    let id = strip_json(&id);
    let meta = match state.extractor.parse_id(id) {
        Some(content) => {
            let record = state.extractor.get_meta(&content.slug).await;
            serde_json::to_value(record).unwrap_or(Value::Null)
        }
        None => Value::Null,
    };

    let meta = if meta.is_null() {
        json!({ "id": id, "type": content_type, "name": "Error loading metadata" })
    } else {
        meta
    };
    Json(MetaResponse { meta })
}

pub async fn stream(
    State(state): State<AppState>,
    Path((_content_type, id)): Path<(String, String)>,
) -> Json<StreamResponse> {
    let id = strip_json(&id);
    let streams = match state.extractor.parse_id(id) {
        Some(content) => {
            state
                .extractor
                .get_video_sources(&content.slug, content.episode)
                .await
        }
        None => Vec::new(),
    };
    Json(StreamResponse { streams })
}

fn strip_json(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

fn is_known_catalog(id: &str) -> bool {
    id == MOVIE_CATALOG || id == SERIES_CATALOG
}

/// Parse a still-encoded extra path segment like `search=how%20dare&skip=0.json`.
pub fn parse_extra(raw_extra: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(strip_json(raw_extra).as_bytes())
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_segment_is_decoded() {
        let extras = parse_extra("search=how%20dare%20you&skip=20.json");
        assert_eq!(extras.get("search").map(String::as_str), Some("how dare you"));
        assert_eq!(extras.get("skip").map(String::as_str), Some("20"));

        let extras = parse_extra("search=Tom%20%26%20Jerry.json");
        assert_eq!(extras.get("search").map(String::as_str), Some("Tom & Jerry"));
        assert_eq!(extras.len(), 1);

        // Decoded exactly once
        let extras = parse_extra("search=100%2525.json");
        assert_eq!(extras.get("search").map(String::as_str), Some("100%25"));
    }

    #[test]
    fn catalog_ids() {
        assert!(is_known_catalog("vietsub-movies"));
        assert!(!is_known_catalog("top"));
        assert_eq!(strip_json("vietsub-series.json"), "vietsub-series");
    }
}
