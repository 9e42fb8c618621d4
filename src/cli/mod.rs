use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::core::{ContentType, SessionBackend};
use crate::extractors::MotchillExtractor;
use crate::mapping::MappingStore;

#[derive(Parser)]
#[command(name = "motchill-ng")]
#[command(about = "Catalog, metadata and stream resolver for motchilltv")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "MOTCHILL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Connect to an already running browser instead of launching one
    #[arg(long, global = true)]
    pub remote_browser: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the addon HTTP server
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },
    /// Print the catalog for a content type as JSON
    Catalog {
        /// `movie` or `series`
        content_type: String,
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Print metadata for a content id as JSON
    Meta { id: String },
    /// Print resolved streams for a content id as JSON
    Streams {
        id: String,
        #[arg(short, long)]
        episode: Option<u32>,
    },
    /// Look up a title or id in the mapping table
    Resolve { query: String },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(url) = self.remote_browser {
            config.browser.remote_url = Some(url);
        }

        let mapping = MappingStore::with_defaults();
        if let Some(path) = &config.mapping_file {
            mapping.load_toml(path)?;
        }
        let mapping = Arc::new(mapping);

        let config = Arc::new(config);
        let extractor = || -> Result<MotchillExtractor> {
            info!("Scraping {}", config.base_url);
            Ok(MotchillExtractor::new(
                config.clone(),
                browser_backend(&config)?,
                mapping.clone(),
            ))
        };

        match self.command {
            Command::Resolve { query } => print_json(&mapping.resolve(&query)),
            Command::Serve { bind, port } => {
                let bind = bind.unwrap_or_else(|| config.bind.clone());
                let port = port.unwrap_or(config.port);
                crate::server::serve(extractor()?, &bind, port).await
            }
            Command::Catalog {
                content_type,
                search,
            } => {
                let content_type = ContentType::parse(&content_type)
                    .with_context(|| format!("Unknown content type: {}", content_type))?;
                print_json(&extractor()?.get_catalog(content_type, search.as_deref()).await)
            }
            Command::Meta { id } => {
                let extractor = extractor()?;
                let content = extractor
                    .parse_id(&id)
                    .with_context(|| format!("Cannot resolve id: {}", id))?;
                print_json(&extractor.get_meta(&content.slug).await)
            }
            Command::Streams { id, episode } => {
                let extractor = extractor()?;
                let content = extractor
                    .parse_id(&id)
                    .with_context(|| format!("Cannot resolve id: {}", id))?;
                let episode = episode.or(content.episode);
                print_json(&extractor.get_video_sources(&content.slug, episode).await)
            }
        }
    }
}

#[cfg(feature = "browser")]
fn browser_backend(config: &Config) -> Result<Arc<dyn SessionBackend>> {
    Ok(Arc::new(crate::browser::ChromiumBackend::new(
        config.browser.clone(),
        config.navigation_timeout(),
    )))
}

#[cfg(not(feature = "browser"))]
fn browser_backend(_config: &Config) -> Result<Arc<dyn SessionBackend>> {
    anyhow::bail!("motchill-ng was built without the `browser` feature")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["motchill-ng", "streams", "vietsub-phim-a", "-e", "3"]).unwrap();
        match cli.command {
            Command::Streams { id, episode } => {
                assert_eq!(id, "vietsub-phim-a");
                assert_eq!(episode, Some(3));
            }
            _ => panic!("expected streams"),
        }

        let cli = Cli::try_parse_from(["motchill-ng", "catalog", "series", "--search", "how dare"]).unwrap();
        assert!(matches!(cli.command, Command::Catalog { search: Some(_), .. }));
    }

    #[tokio::test]
    async fn resolve_runs_without_a_browser() {
        let cli = Cli::try_parse_from(["motchill-ng", "resolve", "tt35231547"]).unwrap();
        assert!(cli.run().await.is_ok());
    }

    #[cfg(not(feature = "browser"))]
    #[test]
    fn scraping_needs_the_browser_feature() {
        assert!(browser_backend(&Config::default()).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["motchill-ng", "resolve", "How Dare You", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Resolve { .. }));
    }
}
