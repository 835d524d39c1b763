use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

/// A source document as handed to the pipeline: a name and its pages.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub pages: Vec<String>,
}

pub struct FileReader;

impl FileReader {
    /// Read a plain-text or markdown document. Form feeds mark page breaks;
    /// a file without them is a single page.
    pub async fn read_document(path: &Path) -> Result<SourceDocument> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension {
            "txt" | "md" => {
                let content = fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read file {path:?}"))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let pages = content.split('\u{0c}').map(|p| p.to_string()).collect();
                Ok(SourceDocument { name, pages })
            }
            _ => anyhow::bail!("unsupported file format: {extension:?}"),
        }
    }

    /// Read every supported document in a directory, sorted by file name so
    /// document indices are stable across runs.
    pub async fn read_directory(dir: &Path) -> Result<Vec<SourceDocument>> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("failed to read directory {dir:?}"))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext == "txt" || ext == "md" {
                        paths.push(path);
                    }
                }
            }
        }
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            documents.push(Self::read_document(&path).await?);
        }
        Ok(documents)
    }
}
