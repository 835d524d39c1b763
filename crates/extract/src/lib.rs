pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;
pub mod window;

pub use llm::{LanguageModel, OllamaClient, complete_json_with_retry};
pub use normalizer::EntityNormalizer;
pub use window::KnownEntities;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};

/// Chunk id to normalized entity names. Chunk ids are fixed-width, so the
/// map's sorted order is corpus order; a missing key means no entities for
/// that chunk.
pub type EntityMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Chunks per language-model call.
    pub batch_size: usize,
    /// Bound on the known-entity window carried between batches.
    pub window: usize,
    /// Invalid-JSON correction rounds per call.
    pub json_retries: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            window: 100,
            json_retries: 3,
        }
    }
}

/// Batched, windowed entity extraction over an ordered chunk sequence, plus
/// the single-text path used at query time.
pub struct Extractor<L: LanguageModel> {
    llm: L,
    normalizer: EntityNormalizer,
    config: ExtractorConfig,
}

impl<L: LanguageModel> Extractor<L> {
    pub fn new(llm: L, config: ExtractorConfig) -> Self {
        Self {
            llm,
            normalizer: EntityNormalizer::new(),
            config,
        }
    }

    /// Process `chunks` in order, in fixed-size batches. Strictly
    /// sequential: each batch's prompt carries the names seen so far, so
    /// batch order is semantically significant and must not be parallelized.
    ///
    /// A failed batch (transport error, unusable response) contributes
    /// nothing and does not stop the run.
    pub async fn extract_batches(&self, chunks: &[(String, String)]) -> EntityMap {
        let mut known = KnownEntities::new(self.config.window);
        let mut entities = EntityMap::new();
        let total_batches = chunks.len().div_ceil(self.config.batch_size.max(1));

        for (batch_index, batch) in chunks.chunks(self.config.batch_size.max(1)).enumerate() {
            let batch_no = batch_index + 1;
            let prompt = prompt::build_batch_prompt(&known.names(), batch);

            let raw = match complete_json_with_retry(&self.llm, &prompt, self.config.json_retries)
                .await
            {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(
                        batch = batch_no,
                        total = total_batches,
                        error = %error,
                        "batch extraction failed, skipping"
                    );
                    continue;
                }
            };

            let batch_ids: Vec<String> = batch.iter().map(|(id, _)| id.clone()).collect();
            let parsed = match schema::parse_batch_response(&raw, &batch_ids) {
                Ok(parsed) => parsed,
                Err(error) => {
                    warn!(
                        batch = batch_no,
                        total = total_batches,
                        error = %error,
                        "unusable batch response, skipping"
                    );
                    continue;
                }
            };

            for chunk_id in &batch_ids {
                let Some(raw_names) = parsed.get(chunk_id) else {
                    continue;
                };
                let mut names: Vec<String> = Vec::new();
                for raw_name in raw_names {
                    let name = self.normalizer.normalize(raw_name);
                    if name.is_empty() || names.contains(&name) {
                        continue;
                    }
                    names.push(name);
                }
                if names.is_empty() {
                    continue;
                }
                for name in &names {
                    known.observe(name);
                }
                entities.insert(chunk_id.clone(), names);
            }
            info!(batch = batch_no, total = total_batches, "batch extracted");
        }

        entities
    }

    /// Extract entities from a single text, normalized. Used for queries.
    pub async fn extract_query(&self, text: &str) -> Result<Vec<String>> {
        let prompt = prompt::build_query_prompt(text);
        let raw = complete_json_with_retry(&self.llm, &prompt, self.config.json_retries).await?;
        let names = schema::parse_query_response(&raw)?;
        Ok(names
            .iter()
            .map(|name| self.normalizer.normalize(name))
            .filter(|name| !name.is_empty())
            .collect())
    }
}

/// Write the run's entity map as a single JSON document.
pub async fn save_entity_map(entities: &EntityMap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create entities directory {parent:?}"))?;
    }
    let json = serde_json::to_string_pretty(entities).context("failed to serialize entity map")?;
    fs::write(path, json)
        .await
        .with_context(|| format!("failed to write entity map {path:?}"))?;
    info!(chunks = entities.len(), path = %path.display(), "entity map saved");
    Ok(())
}

/// Load an entity map. Absence or malformed JSON is fatal for the caller.
pub async fn load_entity_map(path: &Path) -> Result<EntityMap> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read entity map {path:?}"))?;
    serde_json::from_str(&content).with_context(|| format!("malformed entity map {path:?}"))
}
