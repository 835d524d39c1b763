pub mod chunk;
pub mod chunker;
pub mod reader;
pub mod store;

pub use chunk::{Chunk, ChunkId};
pub use chunker::{Chunker, ChunkerConfig};
pub use reader::{FileReader, SourceDocument};
pub use store::{ChunkStore, ChunkWriter};

use anyhow::Result;
use tracing::info;

/// Heading tokens that mark a document's trailing matter. Once one of them
/// opens a line on a page, that page and every later page of the same
/// document are dropped.
const TRAILING_MATTER_HEADINGS: [&str; 4] =
    ["reference", "references", "bibliography", "acknowledgements"];

fn starts_trailing_matter(page_text: &str) -> bool {
    page_text
        .to_lowercase()
        .lines()
        .any(|line| TRAILING_MATTER_HEADINGS.iter().any(|h| line.starts_with(h)))
}

/// Splits documents into addressable chunks and persists them as produced.
pub struct IngestPipeline {
    chunker: Chunker,
}

impl IngestPipeline {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            chunker: Chunker::new(config),
        }
    }

    /// Chunk one document. `doc_index` is the 0-based corpus position used
    /// in chunk ids; pages are numbered from 1.
    pub fn chunk_document(&self, doc_index: usize, document: &SourceDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut skip = false;

        for (page_index, page) in document.pages.iter().enumerate() {
            let page_no = page_index + 1;
            let text = page.trim();
            if text.is_empty() || skip {
                continue;
            }
            if starts_trailing_matter(text) {
                skip = true;
                info!(
                    doc = %document.name,
                    page = page_no,
                    "trailing matter reached, skipping rest of document"
                );
                continue;
            }
            for (i, piece) in self.chunker.split(text).into_iter().enumerate() {
                let id = ChunkId::new(doc_index, page_no, i + 1);
                chunks.push(Chunk {
                    chunk_id: id.to_string(),
                    doc_id: doc_index,
                    doc: document.name.clone(),
                    page: page_no,
                    text: piece,
                });
            }
        }
        chunks
    }

    /// Chunk the whole corpus in document order, appending each chunk to the
    /// store as it is produced. A document yielding zero chunks is not an
    /// error.
    pub async fn run(
        &self,
        documents: &[SourceDocument],
        writer: &mut ChunkWriter,
    ) -> Result<Vec<Chunk>> {
        let mut all = Vec::new();
        for (doc_index, document) in documents.iter().enumerate() {
            let chunks = self.chunk_document(doc_index, document);
            for chunk in &chunks {
                writer.append(chunk).await?;
            }
            info!(
                doc = %document.name,
                pages = document.pages.len(),
                chunks = chunks.len(),
                "document chunked"
            );
            all.extend(chunks);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, pages: &[&str]) -> SourceDocument {
        SourceDocument {
            name: name.to_string(),
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn pipeline() -> IngestPipeline {
        IngestPipeline::new(ChunkerConfig::default())
    }

    #[test]
    fn assigns_structured_ids() {
        let chunks = pipeline().chunk_document(1, &doc("a.txt", &["some page text", "more text"]));
        assert_eq!(chunks[0].chunk_id, "d01p0001c01");
        assert_eq!(chunks[1].chunk_id, "d01p0002c01");
        assert_eq!(chunks[0].doc_id, 1);
        assert_eq!(chunks[1].page, 2);
    }

    #[test]
    fn reference_heading_latches_page_skip() {
        let chunks = pipeline().chunk_document(
            0,
            &doc(
                "a.txt",
                &[
                    "real content on the first page",
                    "References\n[1] Someone et al.",
                    "content after the references section",
                ],
            ),
        );
        // The latch drops the triggering page and everything after it.
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 1);
    }

    #[test]
    fn heading_match_is_case_insensitive_and_line_anchored() {
        let latched = pipeline().chunk_document(0, &doc("a.txt", &["BIBLIOGRAPHY\nentries"]));
        assert!(latched.is_empty());

        // Mid-line mentions do not latch.
        let kept = pipeline().chunk_document(0, &doc("a.txt", &["see the references for details"]));
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn blank_pages_are_skipped_without_latching() {
        let chunks = pipeline().chunk_document(0, &doc("a.txt", &["", "  \n ", "real text"]));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 3);
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        assert!(pipeline().chunk_document(0, &doc("a.txt", &[])).is_empty());
    }

    #[tokio::test]
    async fn run_persists_chunks_as_produced() {
        let store = ChunkStore::new(
            std::env::temp_dir().join(format!("ingest_run_{}.jsonl", std::process::id())),
        );
        let mut writer = store.writer().await.unwrap();
        let docs = vec![doc("a.txt", &["first page"]), doc("b.txt", &["other page"])];

        let chunks = pipeline().run(&docs, &mut writer).await.unwrap();
        writer.finish().await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), chunks.len());
        assert_eq!(loaded[0].doc_id, 0);
        assert_eq!(loaded[1].doc_id, 1);
        assert_eq!(loaded[1].doc, "b.txt");
    }
}
