use std::net::SocketAddr;

use tracing::info;

use courier_server::{Config, app, build_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courier_server=debug,courier_api=debug,courier_gateway=debug,courier_db=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    let state = build_state(&config)?;
    let router = app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
