use anyhow::Result;
use tracing::{error, info, warn};

use extract::EntityMap;
use ingest::ChunkId;

use crate::store::GraphStore;

/// Builds the knowledge graph from an extraction run's entity map.
///
/// A build is full-replace: the target scope is cleared first, and partial
/// or incremental updates are done by re-running extraction plus a full
/// rebuild, never by delta application.
pub struct GraphBuilder<'a, S: GraphStore> {
    store: &'a S,
}

impl<'a, S: GraphStore> GraphBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Rebuild the scope's graph from `entities`, in map order (chunk ids
    /// are fixed-width, so that is corpus order). One chunk entry failing
    /// is logged and skipped; the build carries on.
    pub async fn build(&self, scope: &str, entities: &EntityMap) -> Result<()> {
        self.store.delete_all(scope).await?;

        for (chunk_id, names) in entities {
            if let Err(err) = self.build_entry(scope, chunk_id, names).await {
                error!(chunk_id = %chunk_id, error = %err, "failed to process chunk entry");
            }
        }
        info!(scope, chunks = entities.len(), "graph build complete");
        Ok(())
    }

    async fn build_entry(&self, scope: &str, chunk_id: &str, names: &[String]) -> Result<()> {
        let doc_id = match chunk_id.parse::<ChunkId>() {
            Ok(id) => id.doc,
            Err(err) => {
                warn!(chunk_id = %chunk_id, error = %err, "unparseable chunk id, skipping");
                return Ok(());
            }
        };
        self.store.upsert_document(scope, doc_id).await?;

        // Duplicate names within one chunk must not inflate co-occurrence,
        // so each distinct name is considered once, in list order.
        let mut unique: Vec<&String> = Vec::new();
        for name in names {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        for name in &unique {
            self.store.upsert_entity(scope, name, chunk_id).await?;
            self.store
                .upsert_mention(scope, name, doc_id, chunk_id)
                .await?;
        }

        // Every unordered pair of distinct co-occurring entities, once.
        for (i, name_a) in unique.iter().enumerate() {
            for name_b in &unique[i + 1..] {
                self.store
                    .upsert_relationship(scope, name_a, name_b, chunk_id)
                    .await?;
            }
        }
        Ok(())
    }
}
