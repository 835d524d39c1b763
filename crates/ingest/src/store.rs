use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::chunk::Chunk;

/// Append-only line-oriented chunk store: one JSON object per line.
///
/// Chunks are written as they are produced so a run can be audited or
/// resumed downstream without replaying the vector/graph build.
pub struct ChunkStore {
    path: PathBuf,
}

impl ChunkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the store for a fresh ingestion run, truncating any previous
    /// content. Within the run chunks are only ever appended.
    pub async fn writer(&self) -> Result<ChunkWriter> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create chunk store directory {parent:?}"))?;
        }
        let file = File::create(&self.path)
            .await
            .with_context(|| format!("failed to open chunk store {:?}", self.path))?;
        Ok(ChunkWriter {
            inner: BufWriter::new(file),
            written: 0,
        })
    }

    /// Load every chunk in file order. A missing or malformed store is an
    /// input error for the caller, not an empty result.
    pub async fn load(&self) -> Result<Vec<Chunk>> {
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read chunk store {:?}", self.path))?;

        let mut chunks = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(line).with_context(|| {
                format!("malformed chunk record at {:?}:{}", self.path, lineno + 1)
            })?;
            chunks.push(chunk);
        }
        Ok(chunks)
    }
}

pub struct ChunkWriter {
    inner: BufWriter<File>,
    written: usize,
}

impl ChunkWriter {
    pub async fn append(&mut self, chunk: &Chunk) -> Result<()> {
        let line = serde_json::to_string(chunk).context("failed to serialize chunk")?;
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the number of chunks written.
    pub async fn finish(mut self) -> Result<usize> {
        self.inner.flush().await.context("failed to flush chunk store")?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> ChunkStore {
        let path = std::env::temp_dir().join(format!("chunk_store_{}_{name}.jsonl", std::process::id()));
        ChunkStore::new(path)
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            doc_id: 0,
            doc: "paper.txt".to_string(),
            page: 1,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn round_trips_chunks_in_order() {
        let store = temp_store("roundtrip");
        let mut writer = store.writer().await.unwrap();
        writer.append(&chunk("d00p0001c01", "first")).await.unwrap();
        writer.append(&chunk("d00p0001c02", "second")).await.unwrap();
        assert_eq!(writer.finish().await.unwrap(), 2);

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].chunk_id, "d00p0001c01");
        assert_eq!(loaded[1].text, "second");
    }

    #[tokio::test]
    async fn missing_store_is_an_error() {
        let store = ChunkStore::new("/nonexistent/never/chunks.jsonl");
        assert!(store.load().await.is_err());
    }
}
