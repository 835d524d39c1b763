use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tokio::fs;

/// Per-scope storage layout. Scopes are disjoint directory trees, which is
/// what lets independent users' pipelines run fully in parallel.
#[derive(Debug, Clone)]
pub struct ScopePaths {
    root: PathBuf,
    scope: String,
}

impl ScopePaths {
    /// A scope key becomes a path component, so only plain identifier
    /// characters are accepted.
    pub fn new(root: &Path, scope: &str) -> Result<Self> {
        if scope.is_empty()
            || !scope
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("invalid scope key: {scope:?}");
        }
        Ok(Self {
            root: root.to_path_buf(),
            scope: scope.to_string(),
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Source documents dropped off by the upload collaborator.
    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("docs").join(&self.scope)
    }

    pub fn chunks_file(&self) -> PathBuf {
        self.root
            .join("chunks")
            .join(&self.scope)
            .join(format!("chunks_{}.jsonl", self.scope))
    }

    pub fn entities_file(&self) -> PathBuf {
        self.root
            .join("entities")
            .join(&self.scope)
            .join(format!("entities_{}.json", self.scope))
    }

    pub fn vector_index_file(&self) -> PathBuf {
        self.root
            .join("vector_stores")
            .join(&self.scope)
            .join("vector_store.json")
    }

    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.documents_dir()).await?;
        for file in [
            self.chunks_file(),
            self.entities_file(),
            self.vector_index_file(),
        ] {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Remove the scope's persisted artifacts. Missing files are fine.
    pub async fn remove_artifacts(&self) -> Result<()> {
        for file in [
            self.chunks_file(),
            self.entities_file(),
            self.vector_index_file(),
        ] {
            match fs::remove_file(&file).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}
