use crate::dedup::{DocumentResultCache, WebhookDedupGuard};
use crate::domain::{ArtifactKey, DownloadedFile, Fingerprint, PipefyId, ProcessingOutcome};
use crate::fingerprint::{content_fingerprint, webhook_fingerprint};
use crate::ports::{ArtifactStore, AttachmentResolver, ExtractionService, FileFetcher};
use serde::Serialize;
use serde_json::Value;
use shared::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// External collaborators the processor drives
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn AttachmentResolver>,
    pub fetcher: Arc<dyn FileFetcher>,
    pub extractor: Arc<dyn ExtractionService>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    pub dedup_entries: usize,
    pub cached_documents: usize,
}

/// Handles one card-move event: dedup, attachment download, extraction
/// with result reuse, artifact write.
pub struct WebhookProcessor {
    dedup: WebhookDedupGuard,
    results: DocumentResultCache,
    collaborators: Collaborators,
}

impl WebhookProcessor {
    pub fn new(
        dedup: WebhookDedupGuard,
        results: DocumentResultCache,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            dedup,
            results,
            collaborators,
        }
    }

    pub async fn process(&self, card_id: &PipefyId, payload: &Value) -> Result<ProcessingOutcome> {
        let fingerprint = webhook_fingerprint(card_id, payload);
        if self.dedup.check_and_register(&fingerprint, card_id) {
            return Ok(ProcessingOutcome::Duplicate);
        }

        info!(card_id = %card_id, "Processing card move");

        let Some(url) = self.collaborators.resolver.resolve(card_id).await? else {
            info!(card_id = %card_id, "No attachment found on card");
            return Ok(ProcessingOutcome::NoAttachment);
        };

        let file = self.collaborators.fetcher.fetch(&url, card_id).await?;
        debug!(
            card_id = %card_id,
            "Downloaded {} to {}",
            file.source_url(),
            file.path().display()
        );

        let outcome = self.process_document(card_id, &file).await;

        let temp_path = file.path().to_path_buf();
        match file.cleanup() {
            Ok(()) => debug!("Removed temporary file {}", temp_path.display()),
            Err(e) => warn!(
                "Failed to remove temporary file {}: {}",
                temp_path.display(),
                e
            ),
        }

        outcome
    }

    async fn process_document(
        &self,
        card_id: &PipefyId,
        file: &DownloadedFile,
    ) -> Result<ProcessingOutcome> {
        let content = content_fingerprint(file.path()).await;
        let card_key = ArtifactKey::Card(card_id.clone());

        // Held until this request has either reused or recorded a result
        let _flight = self.results.claim(&content).await;

        if let Some(cached) = self.results.lookup(&content).await {
            match self
                .collaborators
                .artifacts
                .copy_into(&cached, &card_key)
                .await
            {
                Ok(artifact) => {
                    info!(
                        card_id = %card_id,
                        "Reused cached extraction {} for {}",
                        cached.display(),
                        artifact.display()
                    );
                    return Ok(ProcessingOutcome::Cached { artifact });
                }
                Err(e) => {
                    warn!(card_id = %card_id, "Could not reuse cached extraction: {}", e);
                    self.results.invalidate(&content);
                }
            }
        }

        info!(card_id = %card_id, "Extracting {}", file.path().display());
        let extraction = self.collaborators.extractor.extract(file.path()).await?;
        let artifact = self
            .collaborators
            .artifacts
            .write(&card_key, &extraction.markdown)
            .await?;
        info!(
            card_id = %card_id,
            chunks = extraction.chunks.len(),
            "Saved extraction to {}",
            artifact.display()
        );

        self.remember(&content, &extraction.markdown).await;

        Ok(ProcessingOutcome::Processed {
            artifact,
            chunks: extraction.chunks.len(),
        })
    }

    /// Store a content-addressed copy and point the result cache at it.
    /// Failures only cost a future cache hit.
    async fn remember(&self, content: &Fingerprint, markdown: &str) {
        let Fingerprint::Content(key) = content else {
            return;
        };

        match self
            .collaborators
            .artifacts
            .write(&ArtifactKey::Content(key.clone()), markdown)
            .await
        {
            Ok(path) => {
                self.results.record(content, path);
            }
            Err(e) => warn!("Failed to populate result cache: {}", e),
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            dedup_entries: self.dedup.len(),
            cached_documents: self.results.len(),
        }
    }
}
