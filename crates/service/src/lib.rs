pub mod config;
pub mod paths;
pub mod retry;

pub use config::AppConfig;
pub use paths::ScopePaths;
pub use retry::RetryPolicy;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use extract::{Extractor, ExtractorConfig, OllamaClient};
use graph::{EntityRecord, GraphBuilder, GraphStats, GraphStore, Neo4jStore};
use index::{OllamaEmbedder, VectorIndex};
use ingest::{ChunkStore, ChunkerConfig, FileReader, IngestPipeline};
use query::{HybridSearchEngine, QueryLLM, SearchResult};

/// Install the process-wide tracing subscriber. Called once by whatever
/// embeds the service.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessSummary {
    pub documents: usize,
    pub chunks: usize,
    pub indexed: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExtractSummary {
    pub chunks: usize,
    pub chunks_with_entities: usize,
    pub unique_entities: usize,
}

/// The boundary the web-layer collaborator talks to. Holds the one live
/// graph-store connection for the process; everything else is constructed
/// per call, so the read side stays stateless and scopes stay disjoint.
pub struct KnowledgeBase {
    config: AppConfig,
    store: Neo4jStore,
}

impl KnowledgeBase {
    /// Connect to the graph store (with retry) and prepare its schema.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let retry = RetryPolicy::new(&config.retry);
        let neo4j = &config.neo4j;
        let store = retry
            .retry("neo4j connect", || {
                Neo4jStore::connect(&neo4j.uri, &neo4j.username, &neo4j.password)
            })
            .await?;
        store.init_schema().await?;
        Ok(Self { config, store })
    }

    fn paths(&self, scope: &str) -> Result<ScopePaths> {
        ScopePaths::new(&self.config.data_dir, scope)
    }

    fn embedder(&self) -> OllamaEmbedder {
        OllamaEmbedder::new(
            self.config.embedding.base_url.clone(),
            self.config.embedding.model.clone(),
        )
    }

    fn extractor(&self) -> Extractor<OllamaClient> {
        let llm = OllamaClient::new(
            self.config.llm.base_url.clone(),
            self.config.llm.model.clone(),
        );
        Extractor::new(
            llm,
            ExtractorConfig {
                batch_size: self.config.extraction.batch_size,
                window: self.config.extraction.known_entity_window,
                json_retries: self.config.extraction.json_retries,
            },
        )
    }

    /// Chunk every document in the scope's drop-off directory, persist the
    /// chunks, and build and save the scope's vector index.
    pub async fn process(&self, scope: &str) -> Result<ProcessSummary> {
        let paths = self.paths(scope)?;
        paths.ensure().await?;

        let documents = FileReader::read_directory(&paths.documents_dir()).await?;
        info!(scope, documents = documents.len(), "processing corpus");

        let chunk_store = ChunkStore::new(paths.chunks_file());
        let mut writer = chunk_store.writer().await?;
        let pipeline = IngestPipeline::new(ChunkerConfig {
            chunk_size: self.config.chunking.chunk_size,
            chunk_overlap: self.config.chunking.chunk_overlap,
        });
        let chunks = pipeline.run(&documents, &mut writer).await?;
        writer.finish().await?;

        if chunks.is_empty() {
            warn!(scope, "corpus yielded no chunks, skipping vector index");
            return Ok(ProcessSummary {
                documents: documents.len(),
                chunks: 0,
                indexed: false,
            });
        }

        let index = VectorIndex::build(&chunks, &self.embedder()).await?;
        index.save(&paths.vector_index_file()).await?;

        Ok(ProcessSummary {
            documents: documents.len(),
            chunks: chunks.len(),
            indexed: true,
        })
    }

    /// Run batched entity extraction over the scope's chunk store and
    /// persist the resulting entity map.
    pub async fn extract_entities(&self, scope: &str) -> Result<ExtractSummary> {
        let paths = self.paths(scope)?;

        let chunks = ChunkStore::new(paths.chunks_file())
            .load()
            .await
            .context("no processed chunks for scope")?;
        let pairs: Vec<(String, String)> = chunks
            .into_iter()
            .map(|chunk| (chunk.chunk_id, chunk.text))
            .collect();

        let entities = self.extractor().extract_batches(&pairs).await;

        if entities.is_empty() {
            if pairs.is_empty() {
                return Ok(ExtractSummary {
                    chunks: 0,
                    chunks_with_entities: 0,
                    unique_entities: 0,
                });
            }
            // Every batch failed or came back empty: that aggregate outcome
            // is surfaced, unlike individual batch failures.
            bail!("extraction produced no entities for {} chunks", pairs.len());
        }

        extract::save_entity_map(&entities, &paths.entities_file()).await?;
        let unique_entities = entities
            .values()
            .flatten()
            .collect::<std::collections::HashSet<_>>()
            .len();
        Ok(ExtractSummary {
            chunks: pairs.len(),
            chunks_with_entities: entities.len(),
            unique_entities,
        })
    }

    /// Rebuild the scope's knowledge graph from its persisted entity map.
    pub async fn build_graph(&self, scope: &str) -> Result<GraphStats> {
        let paths = self.paths(scope)?;
        let entities = extract::load_entity_map(&paths.entities_file()).await?;
        GraphBuilder::new(&self.store).build(scope, &entities).await?;
        self.store.stats(scope).await
    }

    /// Drop the scope entirely: graph nodes and persisted artifacts.
    pub async fn delete(&self, scope: &str) -> Result<()> {
        let paths = self.paths(scope)?;
        self.store.delete_all(scope).await?;
        paths.remove_artifacts().await?;
        info!(scope, "scope deleted");
        Ok(())
    }

    /// Hybrid search over the scope. Always yields an answer; degraded
    /// sections are visible only in the trace.
    pub async fn search(&self, scope: &str, query_text: &str, k: usize) -> Result<SearchResult> {
        let paths = self.paths(scope)?;

        let index = match VectorIndex::load(&paths.vector_index_file()).await {
            Ok(index) => Some(index),
            Err(err) => {
                warn!(scope, error = %err, "vector index unavailable for search");
                None
            }
        };

        let engine = HybridSearchEngine::new(
            self.store.clone(),
            scope,
            index,
            self.embedder(),
            self.extractor(),
            QueryLLM::new(
                self.config.llm.base_url.clone(),
                self.config.llm.model.clone(),
            ),
        );
        Ok(engine.search(query_text, k).await)
    }

    pub async fn graph_stats(&self, scope: &str) -> Result<GraphStats> {
        self.paths(scope)?;
        self.store.stats(scope).await
    }

    /// Every entity in the scope, for the collaborator's graph view.
    pub async fn list_entities(&self, scope: &str) -> Result<Vec<EntityRecord>> {
        self.paths(scope)?;
        self.store.all_entities(scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_keys_are_validated_at_the_boundary() {
        let config = AppConfig::default();
        assert!(ScopePaths::new(&config.data_dir, "alice").is_ok());
        assert!(ScopePaths::new(&config.data_dir, "../alice").is_err());
    }
}
