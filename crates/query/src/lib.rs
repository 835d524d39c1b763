pub mod hybrid;
pub mod llm;

pub use hybrid::{
    Citation, FAILURE_ANSWER, GraphRecord, HybridSearchEngine, SearchResult, SearchTrace, Source,
};
pub use llm::QueryLLM;
