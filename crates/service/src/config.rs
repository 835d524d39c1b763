use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root under which per-scope chunk stores, entity maps, and vector
    /// indices live.
    pub data_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub extraction: ExtractionConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub neo4j: Neo4jConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub batch_size: usize,
    pub known_entity_window: usize,
    pub json_retries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            chunking: ChunkingConfig {
                chunk_size: 800,
                chunk_overlap: 300,
            },
            extraction: ExtractionConfig {
                batch_size: 5,
                known_entity_window: 100,
                json_retries: 3,
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
            },
            embedding: EmbeddingConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
            },
            neo4j: Neo4jConfig {
                uri: "bolt://localhost:7687".to_string(),
                username: "neo4j".to_string(),
                password: String::new(),
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
        }
    }
}

impl AppConfig {
    /// Defaults with environment overrides for deployment-specific values.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = env::var("OLLAMA_URL") {
            config.llm.base_url = url.clone();
            config.embedding.base_url = url;
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(uri) = env::var("NEO4J_URI") {
            config.neo4j.uri = uri;
        }
        if let Ok(username) = env::var("NEO4J_USERNAME") {
            config.neo4j.username = username;
        }
        if let Ok(password) = env::var("NEO4J_PASSWORD") {
            config.neo4j.password = password;
        }
        config
    }
}
