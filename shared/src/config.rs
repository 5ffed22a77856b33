use crate::{Error, Result, TtlMs};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Which entry table implementation backs the dedup guard and result cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    /// DashMap with lazy sweep-on-access
    Sweep,
    /// Moka cache with native time-to-live
    Moka,
}

impl CacheBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sweep" | "dashmap" => Some(CacheBackend::Sweep),
            "moka" => Some(CacheBackend::Moka),
            _ => None,
        }
    }
}

pub struct PipefyConfig {
    pub token: Option<String>,
    pub attachment_field_id: Option<String>,
    pub graphql_endpoint: String,
    pub app_base_url: String,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
}

pub struct ExtractionConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
}

pub struct WebhookConfig {
    pub secret: Option<String>,
    pub require_secret: bool,
}

pub struct CacheConfig {
    pub backend: CacheBackend,
    pub dedup_ttl: TtlMs,
    pub result_ttl: TtlMs,
    pub sweep_interval: TtlMs,
}

pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub output_dir: PathBuf,
    pub pipefy: PipefyConfig,
    pub extraction: ExtractionConfig,
    pub webhook: WebhookConfig,
    pub cache: CacheConfig,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8000;
    const DEFAULT_OUTPUT_DIR: &str = "/data/output";
    const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.pipefy.com/graphql";
    const DEFAULT_APP_URL: &str = "https://app.pipefy.com";
    const DEFAULT_EXTRACTION_ENDPOINT: &str =
        "https://api.va.landing.ai/v1/tools/agentic-document-analysis";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
    const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;
    const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 300;
    const DEFAULT_DEDUP_TTL_SECS: u64 = 60;
    const DEFAULT_RESULT_TTL_SECS: u64 = 24 * 60 * 60;
    const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| -> u64 {
            match var(key) {
                Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                    warn!("{} has invalid value '{}', using {}", key, raw, default);
                    default
                }),
                None => default,
            }
        };

        let http_port = var("PIPEDOC_HTTP_PORT")
            .or_else(|| var("PORT"))
            .and_then(|p| p.trim().parse::<u16>().ok())
            .unwrap_or(Self::DEFAULT_HTTP_PORT);

        let pipefy_token = var("PIPEFY_TOKEN");
        if pipefy_token.is_none() {
            warn!("PIPEFY_TOKEN not set, attachments cannot be resolved or downloaded");
        }

        let attachment_field_id = var("PIPEFY_ATTACHMENT_FIELD_ID");
        if attachment_field_id.is_none() {
            warn!("PIPEFY_ATTACHMENT_FIELD_ID not set, no attachment field will be read");
        }

        let api_key = var("VISION_AGENT_API_KEY");
        if api_key.is_none() {
            warn!("VISION_AGENT_API_KEY not set, document extraction requests will be rejected");
        }

        let backend = match var("PIPEDOC_CACHE_BACKEND") {
            Some(raw) => CacheBackend::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown PIPEDOC_CACHE_BACKEND '{}', using 'sweep'", raw);
                CacheBackend::Sweep
            }),
            None => CacheBackend::Sweep,
        };

        Self {
            host: var("PIPEDOC_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port,
            output_dir: PathBuf::from(
                var("OUTPUT_DIR").unwrap_or_else(|| Self::DEFAULT_OUTPUT_DIR.to_string()),
            ),
            pipefy: PipefyConfig {
                token: pipefy_token,
                attachment_field_id,
                graphql_endpoint: var("PIPEFY_GRAPHQL_ENDPOINT")
                    .unwrap_or_else(|| Self::DEFAULT_GRAPHQL_ENDPOINT.to_string()),
                app_base_url: var("PIPEFY_APP_URL")
                    .unwrap_or_else(|| Self::DEFAULT_APP_URL.to_string()),
                request_timeout: Duration::from_secs(number(
                    "PIPEFY_REQUEST_TIMEOUT_SECS",
                    Self::DEFAULT_REQUEST_TIMEOUT_SECS,
                )),
                download_timeout: Duration::from_secs(number(
                    "PIPEFY_DOWNLOAD_TIMEOUT_SECS",
                    Self::DEFAULT_DOWNLOAD_TIMEOUT_SECS,
                )),
            },
            extraction: ExtractionConfig {
                api_key,
                endpoint: var("VISION_AGENT_ENDPOINT")
                    .unwrap_or_else(|| Self::DEFAULT_EXTRACTION_ENDPOINT.to_string()),
                timeout: Duration::from_secs(number(
                    "VISION_AGENT_TIMEOUT_SECS",
                    Self::DEFAULT_EXTRACTION_TIMEOUT_SECS,
                )),
            },
            webhook: WebhookConfig {
                secret: var("RENDER_SERVICE_SECRET").or_else(|| var("PIPEFY_WEBHOOK_SECRET")),
                require_secret: var("PIPEDOC_REQUIRE_WEBHOOK_SECRET")
                    .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
            cache: CacheConfig {
                backend,
                dedup_ttl: TtlMs::from_secs(number(
                    "PIPEDOC_DEDUP_TTL_SECS",
                    Self::DEFAULT_DEDUP_TTL_SECS,
                )),
                result_ttl: TtlMs::from_secs(number(
                    "PIPEDOC_RESULT_TTL_SECS",
                    Self::DEFAULT_RESULT_TTL_SECS,
                )),
                sweep_interval: TtlMs(number(
                    "PIPEDOC_SWEEP_INTERVAL_MS",
                    Self::DEFAULT_SWEEP_INTERVAL_MS,
                )),
            },
        }
    }

    /// Reject configurations the server must not start with
    pub fn validate(&self) -> Result<()> {
        if self.webhook.require_secret && self.webhook.secret.is_none() {
            return Err(Error::Config(
                "PIPEDOC_REQUIRE_WEBHOOK_SECRET is set but neither RENDER_SERVICE_SECRET nor PIPEFY_WEBHOOK_SECRET is configured".into(),
            ));
        }
        if self.cache.dedup_ttl.0 == 0 {
            return Err(Error::Config("PIPEDOC_DEDUP_TTL_SECS must be positive".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}
