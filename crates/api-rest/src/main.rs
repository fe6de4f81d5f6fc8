//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the oncology update
//! subscription.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want the
//! REST server (with OpenAPI/Swagger UI). The workspace's main `rxdesk-run`
//! binary runs the REST server and the WebSocket subscriber together.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use oncology::{OncologyClient, OncologyConfig, DEFAULT_REQUEST_TIMEOUT};
use rxdesk_core::{
    config::{flag_from_env_value, page_size_from_env_value},
    CoreConfig,
};

/// Main entry point for the RxDesk REST API server.
///
/// # Environment Variables
/// - `RXDESK_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `ONCOLOGY_API_URL`: Oncology FHIR base URL
/// - `ONCOLOGY_API_KEY`: Static bearer token for oncology requests
/// - `RXDESK_PAGE_SIZE`: Default inventory page size (default: 5)
/// - `RXDESK_SEED`: Seed demo records when truthy
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("RXDESK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting RxDesk REST API on {}", addr);

    let page_size = page_size_from_env_value(std::env::var("RXDESK_PAGE_SIZE").ok())?;
    let seed_demo_data = flag_from_env_value(std::env::var("RXDESK_SEED").ok());
    let cfg = Arc::new(CoreConfig::new(page_size, seed_demo_data)?);

    let oncology_base = std::env::var("ONCOLOGY_API_URL")
        .unwrap_or_else(|_| "https://oncology-api.example.com/fhir".into());
    let oncology_token = std::env::var("ONCOLOGY_API_KEY").unwrap_or_default();
    let oncology_cfg =
        OncologyConfig::new(oncology_base, oncology_token, DEFAULT_REQUEST_TIMEOUT)?;

    let state = AppState::new(cfg, OncologyClient::new(oncology_cfg)?);
    let app = api_rest::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
