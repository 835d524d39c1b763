pub mod embeddings;

pub use embeddings::{Embedder, OllamaEmbedder};

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use ingest::Chunk;

/// A chunk returned from a similarity query, best matches first.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Persisted similarity index over chunk embeddings.
///
/// Vectors are stored unit-length, so the dot product is cosine similarity
/// and scores are an order-preserving proxy for relevance. An index only
/// exists after a successful `build` or `load`; there is no way to query an
/// unbuilt one.
#[derive(Serialize, Deserialize)]
pub struct VectorIndex {
    entries: Vec<Entry>,
}

impl VectorIndex {
    /// Embed every chunk and build the index. A chunk whose embedding call
    /// fails is skipped; a corpus where everything failed (or an empty
    /// corpus) cannot produce an index.
    pub async fn build<E: Embedder>(chunks: &[Chunk], embedder: &E) -> Result<Self> {
        if chunks.is_empty() {
            bail!("cannot build a vector index from an empty corpus");
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match embedder.embed(&chunk.text).await {
                Ok(vector) => entries.push(Entry {
                    chunk: chunk.clone(),
                    vector: unit_normalize(vector),
                }),
                Err(error) => {
                    warn!(chunk_id = %chunk.chunk_id, error = %error, "embedding failed, chunk not indexed");
                }
            }
        }
        if entries.is_empty() {
            bail!("no chunk could be embedded, index not built");
        }

        info!(indexed = entries.len(), of = chunks.len(), "vector index built");
        Ok(Self { entries })
    }

    /// Top-`k` chunks by cosine similarity, best first.
    pub async fn query<E: Embedder>(
        &self,
        text: &str,
        k: usize,
        embedder: &E,
    ) -> Result<Vec<SearchHit>> {
        let query = unit_normalize(
            embedder
                .embed(text)
                .await
                .context("failed to embed query")?,
        );

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                chunk: entry.chunk.clone(),
                score: dot(&entry.vector, &query),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create index directory {parent:?}"))?;
        }
        let json = serde_json::to_string(self).context("failed to serialize vector index")?;
        fs::write(path, json)
            .await
            .with_context(|| format!("failed to write vector index {path:?}"))?;
        info!(path = %path.display(), chunks = self.entries.len(), "vector index saved");
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read vector index {path:?}"))?;
        let index: Self = serde_json::from_str(&content)
            .with_context(|| format!("malformed vector index {path:?}"))?;
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unit_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut vector {
            *x /= magnitude;
        }
    }
    vector
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic embedder: maps known words onto axes of a 3-d space.
    struct AxisEmbedder;

    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("fail") {
                bail!("embedding service unavailable");
            }
            let lower = text.to_lowercase();
            let axes = [["bert", "transformer"], ["protein", "genome"], ["galaxy", "orbit"]];
            let mut vector = vec![0.0f32; 3];
            for (i, words) in axes.iter().enumerate() {
                for word in words {
                    if lower.contains(word) {
                        vector[i] += 1.0;
                    }
                }
            }
            Ok(vector)
        }
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

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("d00p0001c01", "BERT is a transformer model"),
            chunk("d00p0002c01", "the genome encodes protein structure"),
            chunk("d00p0003c01", "a galaxy holds stars in orbit"),
        ]
    }

    #[tokio::test]
    async fn ranks_by_similarity() {
        let index = VectorIndex::build(&corpus(), &AxisEmbedder).await.unwrap();
        let hits = index.query("transformer models like BERT", 2, &AxisEmbedder).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "d00p0001c01");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn empty_corpus_cannot_build() {
        assert!(VectorIndex::build(&[], &AxisEmbedder).await.is_err());
    }

    #[tokio::test]
    async fn failed_embeddings_are_skipped() {
        let mut chunks = corpus();
        chunks.push(chunk("d00p0004c01", "this one will fail to embed"));
        let index = VectorIndex::build(&chunks, &AxisEmbedder).await.unwrap();
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn persists_and_reloads_without_rebuilding() {
        let index = VectorIndex::build(&corpus(), &AxisEmbedder).await.unwrap();
        let path = std::env::temp_dir().join(format!("vector_index_{}.json", std::process::id()));
        index.save(&path).await.unwrap();

        let reloaded = VectorIndex::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), index.len());
        let hits = reloaded.query("orbit of a galaxy", 1, &AxisEmbedder).await.unwrap();
        assert_eq!(hits[0].chunk.chunk_id, "d00p0003c01");
    }

    #[tokio::test]
    async fn loading_a_missing_index_is_an_error() {
        assert!(VectorIndex::load(Path::new("/nonexistent/index.json")).await.is_err());
    }
}
