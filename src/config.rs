use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api_base_url: String,
    pub bucket: Option<String>,
    pub access_token: Option<String>,
    pub oidc: Option<OidcConfig>,
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub status_ttl: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub token_url: String,
    pub client_id: String,
    pub refresh_token: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Replication status agent for a multi-zone object browser")]
pub struct Args {
    /// Host to bind to (overrides ZONE_STATUS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ZONE_STATUS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Base URL of the storage browser API (overrides ZONE_STATUS_API_BASE_URL)
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Bucket forwarded with every check (overrides ZONE_STATUS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Maximum concurrent consistency checks (overrides ZONE_STATUS_CONCURRENCY)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Auto-refresh interval in milliseconds (overrides ZONE_STATUS_POLL_INTERVAL_MS)
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// How long a fetched status is trusted, in milliseconds (overrides ZONE_STATUS_STATUS_TTL_MS)
    #[arg(long)]
    pub status_ttl_ms: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("ZONE_STATUS_HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let env_port = parse_env("ZONE_STATUS_PORT", 3100u16)?;
        let env_concurrency = parse_env("ZONE_STATUS_CONCURRENCY", 5usize)?;
        let env_poll = parse_env("ZONE_STATUS_POLL_INTERVAL_MS", 10_000u64)?;
        let env_ttl = parse_env("ZONE_STATUS_STATUS_TTL_MS", 30_000u64)?;
        let timeout_secs = parse_env("ZONE_STATUS_REQUEST_TIMEOUT_SECS", 15u64)?;

        let api_base_url = match args.api_base_url {
            Some(url) => url,
            None => env::var("ZONE_STATUS_API_BASE_URL")
                .context("ZONE_STATUS_API_BASE_URL is not set (or pass --api-base-url)")?,
        };

        let oidc = match (
            non_empty_env("ZONE_STATUS_OIDC_TOKEN_URL"),
            non_empty_env("ZONE_STATUS_REFRESH_TOKEN"),
        ) {
            (Some(token_url), Some(refresh_token)) => Some(OidcConfig {
                token_url,
                client_id: env::var("ZONE_STATUS_OIDC_CLIENT_ID")
                    .unwrap_or_else(|_| "ceph-rgw-browser".into()),
                refresh_token,
            }),
            _ => None,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            api_base_url,
            bucket: args.bucket.or_else(|| non_empty_env("ZONE_STATUS_BUCKET")),
            access_token: non_empty_env("ZONE_STATUS_ACCESS_TOKEN"),
            oidc,
            concurrency: args.concurrency.unwrap_or(env_concurrency).max(1),
            poll_interval: Duration::from_millis(args.poll_interval_ms.unwrap_or(env_poll).max(1)),
            status_ttl: Duration::from_millis(args.status_ttl_ms.unwrap_or(env_ttl)),
            request_timeout: Duration::from_secs(timeout_secs),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
