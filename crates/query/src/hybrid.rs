use anyhow::Result;
use serde::Serialize;
use tracing::{error, warn};

use extract::{Extractor, LanguageModel};
use graph::GraphStore;
use index::{Embedder, SearchHit, VectorIndex};
use ingest::ChunkId;

/// The one user-visible failure for the search path; every finer-grained
/// cause stays in the logs.
pub const FAILURE_ANSWER: &str = "An error occurred while processing your query.";

/// A `(document, page)` reference recovered from a chunk id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub document: usize,
    pub page: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub answer: String,
    /// Vector-path chunks in rank order.
    pub sources: Vec<Source>,
    /// Entities extracted from the query text.
    pub query_entities: Vec<String>,
    pub citations: Vec<Citation>,
    pub trace: SearchTrace,
}

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub chunk_id: String,
    pub text: String,
    pub relevance_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchTrace {
    pub entities_extracted: usize,
    pub chunks_retrieved: usize,
    pub graph_records: usize,
    pub context_size: usize,
}

/// One graph-path result: a query entity (or one of its neighbors) with the
/// names it co-occurs with and the aggregate co-occurrence weight.
#[derive(Debug, Clone)]
pub struct GraphRecord {
    pub chunk_id: Option<String>,
    pub entity: String,
    pub related: Vec<String>,
    pub relationship_count: i64,
    pub is_main: bool,
}

/// Fuses vector-similarity and graph-traversal retrieval for one query.
///
/// The two result lists are kept independently ordered; weighing them
/// against each other is deliberately left to the synthesis model rather
/// than a numeric fused score. Each retrieval path degrades to empty on
/// failure; only a synthesis failure is visible to the user.
pub struct HybridSearchEngine<S, E, X, L>
where
    S: GraphStore,
    E: Embedder,
    X: LanguageModel,
    L: LanguageModel,
{
    store: S,
    scope: String,
    index: Option<VectorIndex>,
    embedder: E,
    extractor: Extractor<X>,
    llm: L,
}

impl<S, E, X, L> HybridSearchEngine<S, E, X, L>
where
    S: GraphStore,
    E: Embedder,
    X: LanguageModel,
    L: LanguageModel,
{
    pub fn new(
        store: S,
        scope: impl Into<String>,
        index: Option<VectorIndex>,
        embedder: E,
        extractor: Extractor<X>,
        llm: L,
    ) -> Self {
        Self {
            store,
            scope: scope.into(),
            index,
            embedder,
            extractor,
            llm,
        }
    }

    pub async fn search(&self, query: &str, k: usize) -> SearchResult {
        let entities = match self.extractor.extract_query(query).await {
            Ok(entities) => entities,
            Err(err) => {
                warn!(error = %err, "query entity extraction failed");
                Vec::new()
            }
        };

        let hits = self.vector_search(query, k).await;

        let records = match self.graph_search(&entities, k).await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "graph search failed");
                Vec::new()
            }
        };

        let prompt = build_synthesis_prompt(query, &hits, &records, &entities);
        let citations = collect_citations(&hits, &records);
        let trace = SearchTrace {
            entities_extracted: entities.len(),
            chunks_retrieved: hits.len(),
            graph_records: records.len(),
            context_size: prompt.len(),
        };

        match self.llm.complete(&prompt).await {
            Ok(answer) => SearchResult {
                answer,
                sources: hits
                    .iter()
                    .map(|hit| Source {
                        chunk_id: hit.chunk.chunk_id.clone(),
                        text: hit.chunk.text.clone(),
                        relevance_score: hit.score,
                    })
                    .collect(),
                query_entities: entities,
                citations,
                trace,
            },
            Err(err) => {
                error!(error = %err, "answer synthesis failed");
                SearchResult {
                    answer: FAILURE_ANSWER.to_string(),
                    sources: Vec::new(),
                    query_entities: Vec::new(),
                    citations: Vec::new(),
                    trace,
                }
            }
        }
    }

    async fn vector_search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        let Some(index) = &self.index else {
            warn!("no vector index for scope, vector path empty");
            return Vec::new();
        };
        match index.query(query, k, &self.embedder).await {
            Ok(hits) => hits,
            Err(err) => {
                warn!(error = %err, "vector search failed");
                Vec::new()
            }
        }
    }

    /// For each query entity present in the graph, emit one record for the
    /// entity with all its neighbors plus one record per neighbor, then keep
    /// the `k` heaviest records by aggregate co-occurrence count.
    async fn graph_search(&self, entities: &[String], k: usize) -> Result<Vec<GraphRecord>> {
        let mut records = Vec::new();

        for name in entities {
            let neighbors = self.store.neighbors(&self.scope, name).await?;
            if neighbors.is_empty() {
                continue;
            }
            let detail = self.store.entity(&self.scope, name).await?;
            let total: i64 = neighbors.iter().map(|n| n.count).sum();

            records.push(GraphRecord {
                chunk_id: detail.and_then(|d| d.chunk_ids.into_iter().next()),
                entity: name.clone(),
                related: neighbors.iter().map(|n| n.name.clone()).collect(),
                relationship_count: total,
                is_main: true,
            });

            for neighbor in neighbors {
                let chunk_id = neighbor.chunk_ids.into_iter().next();
                if chunk_id.is_none() {
                    continue;
                }
                records.push(GraphRecord {
                    chunk_id,
                    entity: neighbor.name,
                    related: vec![name.clone()],
                    relationship_count: neighbor.count,
                    is_main: false,
                });
            }
        }

        records.sort_by(|a, b| b.relationship_count.cmp(&a.relationship_count));
        records.truncate(k);
        Ok(records)
    }
}

pub fn format_vector_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No vector search results found.".to_string();
    }
    hits.iter()
        .map(|hit| {
            format!(
                "Chunk {}: {} (Score: {:.4})",
                hit.chunk.chunk_id, hit.chunk.text, hit.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_graph_results(records: &[GraphRecord]) -> String {
    if records.is_empty() {
        return "No graph search results found.".to_string();
    }
    records
        .iter()
        .map(|record| {
            format!(
                "Chunk {}: Entity '{}' with related entities: {}",
                record.chunk_id.as_deref().unwrap_or("unknown"),
                record.entity,
                record.related.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_entities(entities: &[String]) -> String {
    if entities.is_empty() {
        "No entities extracted.".to_string()
    } else {
        entities.join(", ")
    }
}

fn build_synthesis_prompt(
    query: &str,
    hits: &[SearchHit],
    records: &[GraphRecord],
    entities: &[String],
) -> String {
    format!(
        r#"You are a research assistant that helps find relevant information from scientific documents.
You have access to three types of information:
1. Vector search results: similar text chunks based on semantic similarity
2. Graph search results: chunks connected through entity relationships
3. Extracted entities: key concepts from the query

Your task is to:
1. Analyze the search results from both vector and graph search
2. Identify the most relevant chunks based on both semantic similarity and entity relationships
3. Provide a clear, concise answer that synthesizes information from the most relevant chunks
4. Include relevant entity relationships when they provide additional context
5. Explain the relation between entities from different chunks

Guidelines:
- Be concise and avoid repetition
- Focus on the most relevant information
- Use clear, technical language
- Connect related concepts when relevant

Format your response as a synthesized answer followed by:
Referenced from: [list of (document: 0, page: 4) pairs based on chunk ids like d00p0004c01, where d is the document and p the page]

Query: {query}

Vector Search Results:
{vector_results}

Graph Search Results:
{graph_results}

Extracted Entities:
{entity_list}
"#,
        vector_results = format_vector_results(hits),
        graph_results = format_graph_results(records),
        entity_list = format_entities(entities),
    )
}

/// `(document, page)` pairs for every chunk that entered the context,
/// vector hits first, deduplicated in encounter order.
pub fn collect_citations(hits: &[SearchHit], records: &[GraphRecord]) -> Vec<Citation> {
    let ids = hits
        .iter()
        .map(|hit| hit.chunk.chunk_id.as_str())
        .chain(records.iter().filter_map(|r| r.chunk_id.as_deref()));

    let mut citations = Vec::new();
    for id in ids {
        let Ok(parsed) = id.parse::<ChunkId>() else {
            continue;
        };
        let citation = Citation {
            document: parsed.doc,
            page: parsed.page,
        };
        if !citations.contains(&citation) {
            citations.push(citation);
        }
    }
    citations
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use graph::{GraphBuilder, MemoryStore};
    use ingest::Chunk;

    /// Model that always returns the same canned response.
    #[derive(Clone)]
    struct StaticModel {
        response: Result<String, String>,
    }

    impl StaticModel {
        fn ok(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err("model unavailable".to_string()),
            }
        }
    }

    impl LanguageModel for StaticModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.response.clone().map_err(anyhow::Error::msg)
        }
    }

    struct WordEmbedder;

    impl Embedder for WordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("unembeddable") {
                bail!("embedding service down");
            }
            let lower = text.to_lowercase();
            Ok(vec![
                lower.contains("bert") as u8 as f32,
                lower.contains("genome") as u8 as f32,
            ])
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

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let entities: extract::EntityMap = [
            (
                "d00p0001c01".to_string(),
                vec!["bert".to_string(), "transformer".to_string()],
            ),
            (
                "d00p0002c01".to_string(),
                vec!["transformer".to_string(), "bert".to_string()],
            ),
            (
                "d01p0001c01".to_string(),
                vec!["bert".to_string(), "attention".to_string()],
            ),
        ]
        .into_iter()
        .collect();
        GraphBuilder::new(&store).build("u", &entities).await.unwrap();
        store
    }

    async fn index() -> VectorIndex {
        let chunks = vec![
            chunk("d00p0001c01", "BERT uses transformers"),
            chunk("d00p0002c01", "the genome encodes proteins"),
        ];
        VectorIndex::build(&chunks, &WordEmbedder).await.unwrap()
    }

    fn extractor(model: StaticModel) -> Extractor<StaticModel> {
        Extractor::new(model, extract::ExtractorConfig::default())
    }

    #[tokio::test]
    async fn fuses_vector_and_graph_paths() {
        let engine = HybridSearchEngine::new(
            seeded_store().await,
            "u",
            Some(index().await),
            WordEmbedder,
            extractor(StaticModel::ok(r#"{"entities": ["BERT"]}"#)),
            StaticModel::ok("synthesized answer"),
        );

        let result = engine.search("what is BERT?", 3).await;
        assert_eq!(result.answer, "synthesized answer");
        assert_eq!(result.trace.chunks_retrieved, 2);
        assert!(result.trace.graph_records > 0);
        assert_eq!(result.trace.entities_extracted, 1);
        assert_eq!(result.query_entities, vec!["bert"]);
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[0].chunk_id, "d00p0001c01");
        assert!(result.citations.contains(&Citation { document: 0, page: 1 }));
    }

    #[tokio::test]
    async fn entity_less_query_degrades_to_vector_only() {
        let engine = HybridSearchEngine::new(
            seeded_store().await,
            "u",
            Some(index().await),
            WordEmbedder,
            extractor(StaticModel::ok(r#"{"entities": ["quantum chromodynamics"]}"#)),
            StaticModel::ok("vector-informed answer"),
        );

        // No extracted entity exists in the graph: the graph section is
        // empty and the answer still comes back.
        let result = engine.search("tell me about quantum chromodynamics", 3).await;
        assert_eq!(result.answer, "vector-informed answer");
        assert_eq!(result.trace.graph_records, 0);
        assert_eq!(result.trace.chunks_retrieved, 2);
    }

    #[tokio::test]
    async fn extraction_failure_degrades_not_crashes() {
        let engine = HybridSearchEngine::new(
            seeded_store().await,
            "u",
            Some(index().await),
            WordEmbedder,
            extractor(StaticModel::failing()),
            StaticModel::ok("still answered"),
        );

        let result = engine.search("what is BERT?", 3).await;
        assert_eq!(result.answer, "still answered");
        assert_eq!(result.trace.entities_extracted, 0);
        assert_eq!(result.trace.graph_records, 0);
    }

    #[tokio::test]
    async fn missing_index_degrades_vector_path() {
        let engine = HybridSearchEngine::new(
            seeded_store().await,
            "u",
            None,
            WordEmbedder,
            extractor(StaticModel::ok(r#"{"entities": ["bert"]}"#)),
            StaticModel::ok("graph-informed answer"),
        );

        let result = engine.search("what is BERT?", 3).await;
        assert_eq!(result.answer, "graph-informed answer");
        assert_eq!(result.trace.chunks_retrieved, 0);
        assert!(result.trace.graph_records > 0);
    }

    #[tokio::test]
    async fn synthesis_failure_is_the_generic_answer() {
        let engine = HybridSearchEngine::new(
            seeded_store().await,
            "u",
            Some(index().await),
            WordEmbedder,
            extractor(StaticModel::ok(r#"{"entities": ["bert"]}"#)),
            StaticModel::failing(),
        );

        let result = engine.search("what is BERT?", 3).await;
        assert_eq!(result.answer, FAILURE_ANSWER);
        assert!(result.citations.is_empty());
    }

    #[tokio::test]
    async fn graph_records_are_sorted_and_truncated() {
        let store = seeded_store().await;
        let engine = HybridSearchEngine::new(
            store,
            "u",
            None,
            WordEmbedder,
            extractor(StaticModel::ok(r#"{"entities": ["bert"]}"#)),
            StaticModel::ok("answer"),
        );

        let records = engine
            .graph_search(&["bert".to_string()], 2)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        // The main record aggregates both neighbors (2 + 1 observations).
        assert!(records[0].is_main);
        assert_eq!(records[0].relationship_count, 3);
        assert!(records[0].relationship_count >= records[1].relationship_count);
    }

    #[test]
    fn citations_dedupe_and_skip_unparseable_ids() {
        let hits = vec![
            SearchHit {
                chunk: chunk("d00p0001c01", "a"),
                score: 0.9,
            },
            SearchHit {
                chunk: chunk("d00p0001c02", "b"),
                score: 0.8,
            },
        ];
        let records = vec![
            GraphRecord {
                chunk_id: Some("d01p0002c01".to_string()),
                entity: "bert".to_string(),
                related: vec![],
                relationship_count: 1,
                is_main: true,
            },
            GraphRecord {
                chunk_id: Some("garbage".to_string()),
                entity: "noise".to_string(),
                related: vec![],
                relationship_count: 1,
                is_main: false,
            },
        ];

        let citations = collect_citations(&hits, &records);
        assert_eq!(
            citations,
            vec![
                Citation { document: 0, page: 1 },
                Citation { document: 1, page: 2 },
            ]
        );
    }

    #[test]
    fn empty_sections_render_placeholders() {
        assert_eq!(format_vector_results(&[]), "No vector search results found.");
        assert_eq!(format_graph_results(&[]), "No graph search results found.");
    }
}
