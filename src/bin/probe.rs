//! Run the caption and scrape stages once from the command line, without
//! starting the HTTP server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use outfit_recommender::{
    browser::ChromiumSessions,
    caption::{self, CaptionGenerator, HfCaptioner},
    config::Config,
    models::ProductEntry,
    query,
    scrape::ProductScraper,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "outfit-probe", about = "Caption an image and/or search the catalog once")]
struct Cli {
    /// Image to caption. When no --query is given the caption is searched.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Search the catalog for this text instead of a caption.
    #[arg(long)]
    query: Option<String>,

    /// Skip the browser and only print the caption.
    #[arg(long)]
    caption_only: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    myntra: Option<Vec<ProductEntry>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "outfit_recommender=debug,info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_target(false)
        .compact()
        .init();

    if cli.image.is_none() && cli.query.is_none() {
        anyhow::bail!("nothing to do: pass --image and/or --query");
    }

    let config = Config::from_env()?;

    let description = match &cli.image {
        Some(path) => {
            let captioner = HfCaptioner::new(
                &config.caption_endpoint,
                &config.caption_model,
                config.hf_token.clone(),
                config.caption_timeout,
            )?;
            let image = caption::open_image(path).await?;
            Some(captioner.describe(&image).await?)
        }
        None => None,
    };

    let search_text = cli.query.clone().or_else(|| description.clone());
    let mut report = ProbeReport {
        description,
        query: None,
        url: None,
        myntra: None,
    };

    if let Some(text) = search_text.filter(|_| !cli.caption_only) {
        let normalized = query::normalize(&text);
        let sessions = ChromiumSessions::new(config.chrome_executable.clone(), config.navigation_timeout);
        let scraper = ProductScraper::new(Arc::new(sessions), config.origin.clone(), config.render_timeout);

        report.url = Some(query::search_url(scraper.origin(), &normalized));
        report.myntra = Some(scraper.scrape(&normalized).await);
        report.query = Some(normalized);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
