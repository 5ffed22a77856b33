use crate::middleware::WebhookAuth;
use pipedoc::integrations::{
    FsArtifactStore, HttpFileFetcher, LandingExtractionClient, PipefyAttachmentResolver,
};
use pipedoc::{
    Collaborators, DocumentResultCache, SystemClock, TableFactory, WebhookDedupGuard,
    WebhookProcessor,
};
use shared::config::Config;
use std::sync::Arc;
use tracing::{info, warn};

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<WebhookProcessor>,
    pub webhook_auth: WebhookAuth,
}

impl AppState {
    pub fn new(processor: Arc<WebhookProcessor>, webhook_auth: WebhookAuth) -> Self {
        Self {
            processor,
            webhook_auth,
        }
    }

    /// Wire the processor with the production collaborators
    pub fn from_config(config: &Config) -> shared::Result<Self> {
        if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
            warn!(
                "Failed to create output directory {}: {}",
                config.output_dir.display(),
                e
            );
        }

        let factory = TableFactory::new(
            config.cache.backend,
            config.cache.sweep_interval,
            Arc::new(SystemClock),
        );
        let dedup = WebhookDedupGuard::new(factory.build("webhook-dedup", config.cache.dedup_ttl));
        let results =
            DocumentResultCache::new(factory.build("document-results", config.cache.result_ttl));

        let collaborators = Collaborators {
            resolver: Arc::new(PipefyAttachmentResolver::new(&config.pipefy)?),
            fetcher: Arc::new(HttpFileFetcher::new(
                &config.pipefy,
                config.output_dir.clone(),
            )?),
            extractor: Arc::new(LandingExtractionClient::new(&config.extraction)?),
            artifacts: Arc::new(FsArtifactStore::new(&config.output_dir)),
        };

        let webhook_auth = WebhookAuth::new(config.webhook.secret.clone());
        info!(
            "Processor ready (output: {}, cache backend: {:?}, webhook auth: {})",
            config.output_dir.display(),
            factory.backend(),
            if webhook_auth.is_enabled() {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(Self::new(
            Arc::new(WebhookProcessor::new(dedup, results, collaborators)),
            webhook_auth,
        ))
    }
}
