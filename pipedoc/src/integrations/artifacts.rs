use crate::domain::ArtifactKey;
use crate::ports::ArtifactStore;
use async_trait::async_trait;
use shared::{Error, Result};
use std::path::{Path, PathBuf};

const CACHE_DIR: &str = ".cache";

/// Writes markdown artifacts under the output directory.
///
/// Card outputs live at `<output>/<card>_extracted.md`; content-addressed
/// copies owned by the result cache live under `<output>/.cache/`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep ids usable as a single file name component
pub(crate) fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Artifact(format!("{}: {}", parent.display(), e)))?;
    }
    Ok(())
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        match key {
            ArtifactKey::Card(card_id) => self
                .root
                .join(format!("{}_extracted.md", file_safe(card_id.as_str()))),
            ArtifactKey::Content(fingerprint) => self
                .root
                .join(CACHE_DIR)
                .join(format!("{}.md", file_safe(fingerprint))),
        }
    }

    async fn write(&self, key: &ArtifactKey, markdown: &str) -> Result<PathBuf> {
        let path = self.path_for(key);
        ensure_parent(&path).await?;
        tokio::fs::write(&path, markdown)
            .await
            .map_err(|e| Error::Artifact(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }

    async fn copy_into(&self, source: &Path, key: &ArtifactKey) -> Result<PathBuf> {
        let path = self.path_for(key);
        ensure_parent(&path).await?;
        tokio::fs::copy(source, &path).await.map_err(|e| {
            Error::Artifact(format!(
                "{} -> {}: {}",
                source.display(),
                path.display(),
                e
            ))
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PipefyId;

    #[test]
    fn test_paths() {
        let store = FsArtifactStore::new("/data/output");

        assert_eq!(
            store.path_for(&ArtifactKey::Card(PipefyId::from("67890"))),
            PathBuf::from("/data/output/67890_extracted.md")
        );
        assert_eq!(
            store.path_for(&ArtifactKey::Card(PipefyId::from("../etc/x"))),
            PathBuf::from("/data/output/___etc_x_extracted.md")
        );
        assert_eq!(
            store.path_for(&ArtifactKey::Content("ab12".into())),
            PathBuf::from("/data/output/.cache/ab12.md")
        );
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("nested"));

        let path = store
            .write(&ArtifactKey::Content("ab12".into()), "# Title")
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Title");
    }

    #[tokio::test]
    async fn test_copy_leaves_source_intact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let source = store
            .write(&ArtifactKey::Content("ab12".into()), "# Cached")
            .await
            .unwrap();

        let copy = store
            .copy_into(&source, &ArtifactKey::Card(PipefyId::from("1")))
            .await
            .unwrap();
        std::fs::write(&copy, "changed").unwrap();

        assert_eq!(std::fs::read_to_string(source).unwrap(), "# Cached");
    }

    #[tokio::test]
    async fn test_copy_of_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let err = store
            .copy_into(&dir.path().join("gone.md"), &ArtifactKey::Card(PipefyId::from("1")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Artifact(_)));
    }
}
