use std::sync::Arc;

use outfit_recommender::{
    api::{self, AppState},
    browser::ChromiumSessions,
    caption::HfCaptioner,
    config::Config,
    scrape::ProductScraper,
    upload,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;

    // The captioner is built once and shared by every request.
    let captioner = HfCaptioner::new(
        &config.caption_endpoint,
        &config.caption_model,
        config.hf_token.clone(),
        config.caption_timeout,
    )?;
    tracing::info!("caption model: {}", captioner.model_url());
    if config.hf_token.is_none() {
        tracing::warn!("HF_TOKEN is not set; caption requests are sent unauthenticated");
    }

    let sessions = ChromiumSessions::new(config.chrome_executable.clone(), config.navigation_timeout);
    let scraper = ProductScraper::new(Arc::new(sessions), config.origin.clone(), config.render_timeout);

    let state = AppState {
        captioner: Arc::new(captioner),
        scraper: Arc::new(scraper),
        temp_dir: upload::ensure_dir(&config.temp_dir).await?,
    };

    let app = api::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
