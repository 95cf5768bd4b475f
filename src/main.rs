//! News source detector binary entrypoint.
//! Loads config, seeds the source store and serves the Axum router on Shuttle.

use news_source_detector::{app, logging, DetectorConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // This enables NEWS_SOURCE_CONFIG_PATH / NEWS_SOURCE_API_KEY from .env.
    let _ = dotenvy::dotenv();

    logging::init_tracing();

    let config = DetectorConfig::load()?;
    let router = app(config)?;

    Ok(router.into())
}
