//! Main entry point for the RxDesk application.
//!
//! Runs the REST API server and the oncology WebSocket subscriber
//! concurrently:
//! - REST server on port 3000 (configurable via RXDESK_REST_ADDR)
//! - a single long-lived subscription to the oncology update stream, applying
//!   upserts and soft cancellations to the prescription store
//!
//! The subscriber is optional: when `ONCOLOGY_SUBSCRIBE` is off, only the
//! REST server runs and updates arrive via explicit syncs.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use oncology::{OncologyClient, OncologyConfig, OncologyEvent, DEFAULT_REQUEST_TIMEOUT};
use rxdesk_core::config::{flag_from_env_value, page_size_from_env_value};
use rxdesk_core::CoreConfig;

/// # Environment Variables
/// - `RXDESK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `ONCOLOGY_API_URL`: Oncology FHIR base URL
/// - `ONCOLOGY_API_KEY`: Static bearer token for oncology requests
/// - `ONCOLOGY_SUBSCRIBE`: Connect to the update stream when truthy
/// - `RXDESK_PAGE_SIZE`: Default inventory page size (default: 5)
/// - `RXDESK_SEED`: Seed demo records when truthy
///
/// # Errors
/// Returns an error if configuration is invalid, the address cannot be
/// bound, or the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rxdesk=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("RXDESK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let page_size = page_size_from_env_value(std::env::var("RXDESK_PAGE_SIZE").ok())?;
    let seed_demo_data = flag_from_env_value(std::env::var("RXDESK_SEED").ok());
    let cfg = Arc::new(CoreConfig::new(page_size, seed_demo_data)?);

    let oncology_base = std::env::var("ONCOLOGY_API_URL")
        .unwrap_or_else(|_| "https://oncology-api.example.com/fhir".into());
    let oncology_token = std::env::var("ONCOLOGY_API_KEY").unwrap_or_default();
    let oncology_cfg =
        OncologyConfig::new(oncology_base, oncology_token, DEFAULT_REQUEST_TIMEOUT)?;
    let updates_url = oncology_cfg.updates_url();
    let subscribe_enabled = flag_from_env_value(std::env::var("ONCOLOGY_SUBSCRIBE").ok());

    let state = AppState::new(cfg, OncologyClient::new(oncology_cfg)?);

    tracing::info!("++ Starting RxDesk REST on {}", rest_addr);

    let shutdown = CancellationToken::new();

    // Subscriber task: forward oncology events into the prescription store.
    let subscriber = if subscribe_enabled {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<OncologyEvent>(32);
        let subscription_cancel = shutdown.clone();
        let stream = tokio::spawn(async move {
            if let Err(err) = oncology::subscribe(&updates_url, tx, subscription_cancel).await {
                tracing::error!(error = %err, "oncology subscription ended");
            }
        });

        let store = state.clone();
        let apply = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let result = match event {
                    OncologyEvent::Upsert(data) => store
                        .prescriptions()
                        .upsert_from_external(data)
                        .map(|_| ()),
                    OncologyEvent::Cancelled { id } => store
                        .prescriptions()
                        .apply_external_cancellation(&id)
                        .map(|_| ()),
                };
                if let Err(err) = result {
                    tracing::warn!(error = %err, "failed to apply oncology event");
                }
            }
        });

        Some((stream, apply))
    } else {
        None
    };

    // REST server with graceful shutdown on ctrl-c.
    let app = api_rest::router(state);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some((stream, apply)) = subscriber {
        let _ = stream.await;
        drop(apply);
    }

    Ok(())
}
