use anyhow::Context;
use secrecy::SecretString;
use std::env;
use std::time::Duration;

pub const DEFAULT_SHOPIFY_API_VERSION: &str = "2024-10";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: String,
    pub database_url: Option<String>,
    pub shopify_store: String,
    /// Admin API token; only exposed when building the client.
    pub shopify_access_token: SecretString,
    pub shopify_api_version: String,
    pub shopify_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_port = get("SERVER_PORT").unwrap_or_else(|| "3000".into());
        let database_url = get("DATABASE_URL");
        let shopify_store = get("SHOPIFY_STORE").context("SHOPIFY_STORE must be set")?;
        let shopify_access_token = get("SHOPIFY_ACCESS_TOKEN")
            .map(SecretString::from)
            .context("SHOPIFY_ACCESS_TOKEN must be set")?;
        let shopify_api_version =
            get("SHOPIFY_API_VERSION").unwrap_or_else(|| DEFAULT_SHOPIFY_API_VERSION.into());
        let shopify_timeout = get("SHOPIFY_TIMEOUT_SECS")
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .context("SHOPIFY_TIMEOUT_SECS must be a whole number of seconds")?
            .map(Duration::from_secs);

        Ok(Self {
            server_port,
            database_url,
            shopify_store,
            shopify_access_token,
            shopify_api_version,
            shopify_timeout,
        })
    }
}
