//! OpenSASE Marketplace - Self-hosted multi-tenant marketplace

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_marketplace::infra::{EventPublisher, HttpPaymentGateway};
use opensase_marketplace::{db, router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let db = db::connect(&config).await?;
    db::migrate(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, events will not be published"); None }
        },
        None => None,
    };
    let gateway = HttpPaymentGateway::new(&config.payment_gateway_url, &config.payment_secret_key)?;

    let port = config.port;
    let state = AppState { db, events: EventPublisher::new(nats), gateway: Arc::new(gateway), config: Arc::new(config) };
    let app = router(state);

    tracing::info!("OpenSASE Marketplace listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
