use anyhow::{Context, Result};
use neo4rs::{Graph, Query};
use tracing::info;

use crate::store::{EntityRecord, GraphStats, GraphStore, Neighbor};

/// Neo4j-backed graph store. One live connection per process: the store is
/// connected and verified once at startup and injected into components
/// rather than reached through globals.
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect and verify connectivity with a round trip.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("failed to connect to Neo4j")?;
        let store = Self { graph };
        store.verify().await?;
        info!(uri, "connected to graph store");
        Ok(store)
    }

    pub async fn verify(&self) -> Result<()> {
        self.graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .context("graph store connectivity check failed")
    }

    /// Create lookup indexes for the merge keys.
    pub async fn init_schema(&self) -> Result<()> {
        let query = Query::new(
            "CREATE INDEX entity_name_index IF NOT EXISTS FOR (e:Entity) ON (e.name, e.scope)"
                .to_string(),
        );
        self.graph
            .run(query)
            .await
            .context("failed to create index on Entity.name")?;

        let query = Query::new(
            "CREATE INDEX document_id_index IF NOT EXISTS FOR (d:Document) ON (d.doc_id, d.scope)"
                .to_string(),
        );
        self.graph
            .run(query)
            .await
            .context("failed to create index on Document.doc_id")?;

        Ok(())
    }
}

impl GraphStore for Neo4jStore {
    async fn upsert_document(&self, scope: &str, doc_id: usize) -> Result<()> {
        let query = Query::new(
            "MERGE (d:Document {doc_id: $doc_id, scope: $scope})".to_string(),
        )
        .param("doc_id", doc_id as i64)
        .param("scope", scope.to_string());

        self.graph
            .run(query)
            .await
            .with_context(|| format!("failed to upsert document {doc_id}"))
    }

    async fn upsert_entity(&self, scope: &str, name: &str, chunk_id: &str) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (e:Entity {name: $name, scope: $scope})
            ON CREATE SET e.chunk_ids = [$chunk_id]
            ON MATCH SET e.chunk_ids = CASE
                WHEN NOT $chunk_id IN e.chunk_ids THEN e.chunk_ids + $chunk_id
                ELSE e.chunk_ids END
            "#
            .to_string(),
        )
        .param("name", name.to_string())
        .param("scope", scope.to_string())
        .param("chunk_id", chunk_id.to_string());

        self.graph
            .run(query)
            .await
            .with_context(|| format!("failed to upsert entity {name:?}"))
    }

    async fn upsert_mention(
        &self,
        scope: &str,
        name: &str,
        doc_id: usize,
        chunk_id: &str,
    ) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (e:Entity {name: $name, scope: $scope})
            MATCH (d:Document {doc_id: $doc_id, scope: $scope})
            MERGE (e)-[r:MENTIONED_IN]->(d)
            ON CREATE SET r.chunk_ids = [$chunk_id]
            ON MATCH SET r.chunk_ids = CASE
                WHEN NOT $chunk_id IN r.chunk_ids THEN r.chunk_ids + $chunk_id
                ELSE r.chunk_ids END
            "#
            .to_string(),
        )
        .param("name", name.to_string())
        .param("scope", scope.to_string())
        .param("doc_id", doc_id as i64)
        .param("chunk_id", chunk_id.to_string());

        self.graph
            .run(query)
            .await
            .with_context(|| format!("failed to upsert mention of {name:?} in document {doc_id}"))
    }

    async fn upsert_relationship(
        &self,
        scope: &str,
        name_a: &str,
        name_b: &str,
        chunk_id: &str,
    ) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (e1:Entity {name: $name_a, scope: $scope})
            MATCH (e2:Entity {name: $name_b, scope: $scope})
            WHERE e1 <> e2
            MERGE (e1)-[r:RELATED_TO]-(e2)
            ON CREATE SET r.chunk_ids = [$chunk_id], r.count = 1
            ON MATCH SET r.chunk_ids = CASE
                WHEN NOT $chunk_id IN r.chunk_ids THEN r.chunk_ids + $chunk_id
                ELSE r.chunk_ids END,
                r.count = r.count + 1
            "#
            .to_string(),
        )
        .param("name_a", name_a.to_string())
        .param("name_b", name_b.to_string())
        .param("scope", scope.to_string())
        .param("chunk_id", chunk_id.to_string());

        self.graph.run(query).await.with_context(|| {
            format!("failed to upsert relationship between {name_a:?} and {name_b:?}")
        })
    }

    async fn entity(&self, scope: &str, name: &str) -> Result<Option<EntityRecord>> {
        let query = Query::new(
            r#"
            MATCH (e:Entity {name: $name, scope: $scope})
            RETURN e.name AS name, e.chunk_ids AS chunk_ids
            "#
            .to_string(),
        )
        .param("name", name.to_string())
        .param("scope", scope.to_string());

        let mut result = self.graph.execute(query).await?;
        if let Some(row) = result.next().await? {
            Ok(Some(EntityRecord {
                name: row.get("name")?,
                chunk_ids: row.get("chunk_ids").unwrap_or_default(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn neighbors(&self, scope: &str, name: &str) -> Result<Vec<Neighbor>> {
        let query = Query::new(
            r#"
            MATCH (e:Entity {name: $name, scope: $scope})-[r:RELATED_TO]-(related:Entity)
            RETURN related.name AS name, related.chunk_ids AS chunk_ids, r.count AS count
            ORDER BY r.count DESC
            "#
            .to_string(),
        )
        .param("name", name.to_string())
        .param("scope", scope.to_string());

        let mut result = self.graph.execute(query).await?;
        let mut neighbors = Vec::new();
        while let Some(row) = result.next().await? {
            neighbors.push(Neighbor {
                name: row.get("name")?,
                chunk_ids: row.get("chunk_ids").unwrap_or_default(),
                count: row.get("count").unwrap_or(0),
            });
        }
        Ok(neighbors)
    }

    async fn all_entities(&self, scope: &str) -> Result<Vec<EntityRecord>> {
        let query = Query::new(
            r#"
            MATCH (e:Entity {scope: $scope})
            RETURN e.name AS name, e.chunk_ids AS chunk_ids
            ORDER BY e.name
            "#
            .to_string(),
        )
        .param("scope", scope.to_string());

        let mut result = self.graph.execute(query).await?;
        let mut entities = Vec::new();
        while let Some(row) = result.next().await? {
            entities.push(EntityRecord {
                name: row.get("name")?,
                chunk_ids: row.get("chunk_ids").unwrap_or_default(),
            });
        }
        Ok(entities)
    }

    async fn stats(&self, scope: &str) -> Result<GraphStats> {
        let query = Query::new(
            "MATCH (n {scope: $scope}) RETURN count(n) AS count".to_string(),
        )
        .param("scope", scope.to_string());
        let mut result = self.graph.execute(query).await?;
        let node_count = match result.next().await? {
            Some(row) => row.get::<i64>("count").unwrap_or(0) as usize,
            None => 0,
        };

        let query = Query::new(
            "MATCH ({scope: $scope})-[r]->({scope: $scope}) RETURN count(r) AS count".to_string(),
        )
        .param("scope", scope.to_string());
        let mut result = self.graph.execute(query).await?;
        let relationship_count = match result.next().await? {
            Some(row) => row.get::<i64>("count").unwrap_or(0) as usize,
            None => 0,
        };

        Ok(GraphStats {
            node_count,
            relationship_count,
        })
    }

    async fn delete_all(&self, scope: &str) -> Result<()> {
        let query = Query::new(
            "MATCH (n {scope: $scope}) DETACH DELETE n".to_string(),
        )
        .param("scope", scope.to_string());

        self.graph
            .run(query)
            .await
            .context("failed to delete graph scope")?;
        info!(scope, "graph scope cleared");
        Ok(())
    }
}
