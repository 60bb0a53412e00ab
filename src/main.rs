// src/main.rs

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use courier::config::CONFIG;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let level = CONFIG.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Courier backend");
    info!("Primary provider preference: {}", CONFIG.primary_provider);

    let app_state = courier::state::create_app_state(&CONFIG).await?;

    let app = courier::api::http::router(app_state);

    let bind_address = CONFIG.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("HTTP server listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
