use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix used on every outward-facing id built from a slug.
pub const ID_PREFIX: &str = "vietsub-";

/// Identifier of one title on the source site, taken from its URL path.
///
/// Never empty and never carries [`ID_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentSlug(String);

impl ContentSlug {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim().trim_matches('/');
        let bare = trimmed.strip_prefix(ID_PREFIX).unwrap_or(trimmed);
        if bare.is_empty() {
            None
        } else {
            Some(Self(bare.to_string()))
        }
    }

    /// Parse an outward id such as `vietsub-foo` back into its slug.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::new(id.strip_prefix(ID_PREFIX).unwrap_or(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespaced id, e.g. `vietsub-con-ra-the-thong-gi-nua`.
    pub fn to_id(&self) -> String {
        format!("{}{}", ID_PREFIX, self.0.replace('/', "-"))
    }
}

impl fmt::Display for ContentSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentSlug {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "slug must not be empty".to_string())
    }
}

impl From<ContentSlug> for String {
    fn from(slug: ContentSlug) -> Self {
        slug.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Series,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "movie" => Some(ContentType::Movie),
            "series" => Some(ContentType::Series),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A title found on a listing page, before detail enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub slug: ContentSlug,
    pub title: String,
    pub poster_url: String,
}

/// One episode of a series, as listed in a meta response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub season: u32,
    pub episode: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<Video>,
}

impl MetaRecord {
    /// Record returned when nothing could be scraped at all.
    pub fn minimal(id: impl Into<String>, content_type: ContentType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type,
            name: name.into(),
            poster: None,
            background: None,
            description: None,
            genres: Vec::new(),
            year: None,
            episode_count: None,
            info: None,
            aliases: Vec::new(),
            videos: Vec::new(),
        }
    }
}

/// A "server" button discovered on a play page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOption {
    pub label: String,
    pub is_selected: bool,
}

/// Outcome of probing one server option. `url` is empty when the probe failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStream {
    pub label: String,
    pub url: String,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub name: String,
    pub title: String,
    pub url: String,
}

/// Head entry of the embedded player's playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub sources: Vec<PlayerSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayerSource {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl PlayerState {
    /// First non-empty media URL: the head `file`, else the first source.
    pub fn media_url(&self) -> Option<&str> {
        self.file
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .or_else(|| {
                self.sources
                    .iter()
                    .filter_map(|s| s.file.as_deref())
                    .find(|f| !f.trim().is_empty())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_strips_prefix_and_slashes() {
        assert_eq!(ContentSlug::new("/foo-bar").unwrap().as_str(), "foo-bar");
        assert_eq!(ContentSlug::new("vietsub-foo").unwrap().as_str(), "foo");
        assert_eq!(ContentSlug::from_id("vietsub-foo").unwrap().to_id(), "vietsub-foo");
        assert!(ContentSlug::new("/").is_none());
        assert!(ContentSlug::new("vietsub-").is_none());
    }

    #[test]
    fn meta_serializes_stremio_shape() {
        let meta = MetaRecord::minimal("vietsub-x", ContentType::Series, "X");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "series");
        assert!(json.get("poster").is_none());
        assert!(json.get("videos").is_none());
    }

    #[test]
    fn player_state_falls_back_to_sources() {
        let state: PlayerState = serde_json::from_str(
            r#"{"file":"","sources":[{"file":"https://cdn/x.m3u8","label":"HD"}]}"#,
        )
        .unwrap();
        assert_eq!(state.media_url(), Some("https://cdn/x.m3u8"));
        assert_eq!(PlayerState::default().media_url(), None);
    }
}
