use prospect_server::config::ServerConfig;
use prospect_server::routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prospect_server=info".parse().expect("valid directive")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!("Starting prospect-server with config: {:?}", config);

    let bind_addr = config.bind_addr.clone();
    let state = AppState::from_config(config)?;
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("prospect-server listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
