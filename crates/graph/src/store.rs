use anyhow::Result;
use serde::Serialize;

/// An entity node as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct EntityRecord {
    pub name: String,
    /// Provenance: chunks the entity was observed in, first sighting first.
    pub chunk_ids: Vec<String>,
}

/// A RELATED_TO neighbor of some entity.
#[derive(Debug, Clone, Serialize)]
pub struct Neighbor {
    pub name: String,
    /// The neighbor entity's own provenance chunks.
    pub chunk_ids: Vec<String>,
    /// Co-occurrence observations on the connecting edge.
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub relationship_count: usize,
}

/// Contract for the property-graph store backing the knowledge graph.
///
/// All operations are scope-addressed: scopes are disjoint per user/corpus
/// and a scope has a single writer at a time. Upserts are merge-on-key so
/// retries and reruns cannot duplicate nodes or edges; only the cumulative
/// fields (`chunk_ids` sets, relationship `count`) are rerun-sensitive.
pub trait GraphStore {
    /// Create the document node if it does not exist.
    fn upsert_document(&self, scope: &str, doc_id: usize)
    -> impl Future<Output = Result<()>> + Send;

    /// Create the entity or add `chunk_id` to its provenance if absent.
    fn upsert_entity(
        &self,
        scope: &str,
        name: &str,
        chunk_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Link an entity to the document a chunk came from, accumulating the
    /// chunk into the edge's provenance if absent.
    fn upsert_mention(
        &self,
        scope: &str,
        name: &str,
        doc_id: usize,
        chunk_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Record a co-occurrence between two distinct entities. On first
    /// co-occurrence the edge is created with `count = 1`; afterwards
    /// `chunk_id` is added if absent and `count` always increments.
    fn upsert_relationship(
        &self,
        scope: &str,
        name_a: &str,
        name_b: &str,
        chunk_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn entity(
        &self,
        scope: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<EntityRecord>>> + Send;

    /// RELATED_TO neighbors of an entity, ordered by `count` descending.
    fn neighbors(
        &self,
        scope: &str,
        name: &str,
    ) -> impl Future<Output = Result<Vec<Neighbor>>> + Send;

    fn all_entities(&self, scope: &str) -> impl Future<Output = Result<Vec<EntityRecord>>> + Send;

    fn stats(&self, scope: &str) -> impl Future<Output = Result<GraphStats>> + Send;

    /// Remove every node and relationship in the scope.
    fn delete_all(&self, scope: &str) -> impl Future<Output = Result<()>> + Send;
}
