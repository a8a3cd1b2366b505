use commerce_client::{admin_endpoint, ShopifyClient};
use returns_hex::application::return_service::ReturnService;
use returns_hex::config::Config;
use returns_hex::inbound::http::{HttpServer, HttpServerConfig};
use returns_repo::{build_repo, Repo};
use secrecy::ExposeSecret;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for DATABASE_URL / SERVER_PORT / SHOPIFY_* when present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let repo: Repo = build_repo(config.database_url.as_deref()).await?;

    let endpoint = admin_endpoint(&config.shopify_store, &config.shopify_api_version);
    let mut client = ShopifyClient::builder(&endpoint)?
        .with_access_token(config.shopify_access_token.expose_secret())?;
    if let Some(timeout) = config.shopify_timeout {
        client = client.with_timeout(timeout);
    }
    let platform = client.build()?;
    tracing::info!(endpoint = %platform.endpoint(), "commerce platform client ready");

    let service = ReturnService::new(repo, platform);

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };

    let http = HttpServer::new(service, server_cfg).await?;
    http.run().await
}
