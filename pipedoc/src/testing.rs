//! In-memory collaborators for exercising the processor without network
//! access. Enabled for this crate's tests and, through the `testing`
//! feature, for downstream test suites.

use crate::domain::{Chunk, DownloadedFile, ExtractionResult, PipefyId};
use crate::integrations::file_safe;
use crate::ports::{AttachmentResolver, ExtractionService, FileFetcher};
use async_trait::async_trait;
use shared::{Error, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Resolves attachments from a fixed card → URL map
#[derive(Debug, Default)]
pub struct StaticResolver {
    attachments: Mutex<HashMap<PipefyId, String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, card_id: &PipefyId, url: &str) {
        self.attachments
            .lock()
            .unwrap()
            .insert(card_id.clone(), url.to_string());
    }
}

#[async_trait]
impl AttachmentResolver for StaticResolver {
    async fn resolve(&self, card_id: &PipefyId) -> Result<Option<String>> {
        Ok(self.attachments.lock().unwrap().get(card_id).cloned())
    }
}

/// Serves registered byte buffers as downloads into a scratch directory and
/// remembers every file it created.
#[derive(Debug)]
pub struct InMemoryFetcher {
    dir: PathBuf,
    files: Mutex<HashMap<String, Vec<u8>>>,
    downloaded: Mutex<Vec<PathBuf>>,
}

impl InMemoryFetcher {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: Mutex::new(HashMap::new()),
            downloaded: Mutex::new(Vec::new()),
        }
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(url.to_string(), bytes);
    }

    /// Paths of every file handed out so far
    pub fn downloaded(&self) -> Vec<PathBuf> {
        self.downloaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileFetcher for InMemoryFetcher {
    async fn fetch(&self, url: &str, card_id: &PipefyId) -> Result<DownloadedFile> {
        let bytes = self
            .files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Download(format!("{} returned 404 Not Found", url)))?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}_", file_safe(card_id.as_str())))
            .suffix(".pdf")
            .tempfile_in(&self.dir)?;
        file.write_all(&bytes)?;

        let path = file.into_temp_path();
        self.downloaded.lock().unwrap().push(path.to_path_buf());
        Ok(DownloadedFile::new(path, url))
    }
}

/// Extraction fake that echoes the file content into markdown and counts
/// calls. Can be told to fail or to take a while.
#[derive(Debug, Default)]
pub struct CountingExtractor {
    calls: AtomicUsize,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl CountingExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl ExtractionService for CountingExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(Error::Extraction(message));
        }

        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(ExtractionResult {
            markdown: format!("# Extracted\n\n{}\n", text),
            chunks: vec![Chunk {
                text,
                chunk_type: Some("text".into()),
                chunk_id: Some("0".into()),
            }],
        })
    }
}
