use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::store::{EntityRecord, GraphStats, GraphStore, Neighbor};

/// In-process graph store with the same upsert discipline as the Neo4j
/// implementation. Backs tests and small self-contained runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<String, ScopeData>>>,
}

#[derive(Default)]
struct ScopeData {
    documents: Vec<usize>,
    /// name -> provenance chunk ids, first sighting first.
    entities: BTreeMap<String, Vec<String>>,
    /// (entity name, doc id) -> chunk ids.
    mentions: BTreeMap<(String, usize), Vec<String>>,
    /// unordered pair (lexicographically sorted) -> edge.
    relationships: BTreeMap<(String, String), Edge>,
}

#[derive(Default)]
struct Edge {
    chunk_ids: Vec<String>,
    count: i64,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn add_if_absent(chunk_ids: &mut Vec<String>, chunk_id: &str) {
    if !chunk_ids.iter().any(|c| c == chunk_id) {
        chunk_ids.push(chunk_id.to_string());
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_scope<T>(&self, scope: &str, f: impl FnOnce(&mut ScopeData) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(inner.entry(scope.to_string()).or_default())
    }
}

impl GraphStore for MemoryStore {
    async fn upsert_document(&self, scope: &str, doc_id: usize) -> Result<()> {
        self.with_scope(scope, |data| {
            if !data.documents.contains(&doc_id) {
                data.documents.push(doc_id);
            }
        });
        Ok(())
    }

    async fn upsert_entity(&self, scope: &str, name: &str, chunk_id: &str) -> Result<()> {
        self.with_scope(scope, |data| {
            add_if_absent(data.entities.entry(name.to_string()).or_default(), chunk_id);
        });
        Ok(())
    }

    async fn upsert_mention(
        &self,
        scope: &str,
        name: &str,
        doc_id: usize,
        chunk_id: &str,
    ) -> Result<()> {
        self.with_scope(scope, |data| {
            let key = (name.to_string(), doc_id);
            add_if_absent(data.mentions.entry(key).or_default(), chunk_id);
        });
        Ok(())
    }

    async fn upsert_relationship(
        &self,
        scope: &str,
        name_a: &str,
        name_b: &str,
        chunk_id: &str,
    ) -> Result<()> {
        if name_a == name_b {
            return Ok(());
        }
        self.with_scope(scope, |data| {
            let edge = data.relationships.entry(pair_key(name_a, name_b)).or_default();
            add_if_absent(&mut edge.chunk_ids, chunk_id);
            edge.count += 1;
        });
        Ok(())
    }

    async fn entity(&self, scope: &str, name: &str) -> Result<Option<EntityRecord>> {
        Ok(self.with_scope(scope, |data| {
            data.entities.get(name).map(|chunk_ids| EntityRecord {
                name: name.to_string(),
                chunk_ids: chunk_ids.clone(),
            })
        }))
    }

    async fn neighbors(&self, scope: &str, name: &str) -> Result<Vec<Neighbor>> {
        Ok(self.with_scope(scope, |data| {
            let mut neighbors: Vec<Neighbor> = data
                .relationships
                .iter()
                .filter_map(|((a, b), edge)| {
                    let other = if a == name {
                        b
                    } else if b == name {
                        a
                    } else {
                        return None;
                    };
                    Some(Neighbor {
                        name: other.clone(),
                        chunk_ids: data.entities.get(other).cloned().unwrap_or_default(),
                        count: edge.count,
                    })
                })
                .collect();
            neighbors.sort_by(|x, y| y.count.cmp(&x.count).then_with(|| x.name.cmp(&y.name)));
            neighbors
        }))
    }

    async fn all_entities(&self, scope: &str) -> Result<Vec<EntityRecord>> {
        Ok(self.with_scope(scope, |data| {
            data.entities
                .iter()
                .map(|(name, chunk_ids)| EntityRecord {
                    name: name.clone(),
                    chunk_ids: chunk_ids.clone(),
                })
                .collect()
        }))
    }

    async fn stats(&self, scope: &str) -> Result<GraphStats> {
        Ok(self.with_scope(scope, |data| GraphStats {
            node_count: data.documents.len() + data.entities.len(),
            relationship_count: data.mentions.len() + data.relationships.len(),
        }))
    }

    async fn delete_all(&self, scope: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.remove(scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upserts_are_merge_on_key() {
        let store = MemoryStore::new();
        store.upsert_entity("u", "bert", "d00p0001c01").await.unwrap();
        store.upsert_entity("u", "bert", "d00p0001c01").await.unwrap();
        store.upsert_entity("u", "bert", "d00p0002c01").await.unwrap();

        let record = store.entity("u", "bert").await.unwrap().unwrap();
        assert_eq!(record.chunk_ids, vec!["d00p0001c01", "d00p0002c01"]);
    }

    #[tokio::test]
    async fn relationship_is_undirected_and_single_edged() {
        let store = MemoryStore::new();
        store.upsert_entity("u", "a", "c1").await.unwrap();
        store.upsert_entity("u", "b", "c1").await.unwrap();
        store.upsert_relationship("u", "a", "b", "c1").await.unwrap();
        store.upsert_relationship("u", "b", "a", "c2").await.unwrap();

        let neighbors = store.neighbors("u", "a").await.unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].name, "b");
        assert_eq!(neighbors[0].count, 2);

        let stats = store.stats("u").await.unwrap();
        assert_eq!(stats.relationship_count, 1);
    }

    #[tokio::test]
    async fn self_loops_are_rejected() {
        let store = MemoryStore::new();
        store.upsert_entity("u", "a", "c1").await.unwrap();
        store.upsert_relationship("u", "a", "a", "c1").await.unwrap();
        assert!(store.neighbors("u", "a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scopes_are_disjoint() {
        let store = MemoryStore::new();
        store.upsert_entity("u1", "bert", "c1").await.unwrap();
        store.upsert_entity("u2", "gpt", "c1").await.unwrap();

        assert!(store.entity("u1", "gpt").await.unwrap().is_none());
        store.delete_all("u1").await.unwrap();
        assert!(store.entity("u1", "bert").await.unwrap().is_none());
        assert!(store.entity("u2", "gpt").await.unwrap().is_some());
    }
}
