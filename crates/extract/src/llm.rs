use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::prompt;

/// Contract a completion service must satisfy. The pipeline only needs
/// prompt-in, text-out; everything else (model choice, decoding options)
/// belongs to the implementation.
pub trait LanguageModel {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Ollama-backed client used for extraction. Forces JSON-formatted output.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new("http://localhost:11434".to_string(), "llama3".to_string())
    }
}

impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: "json".to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

/// Complete with a bounded number of invalid-JSON correction rounds. Each
/// round feeds the broken output back through a fix-it prompt.
pub async fn complete_json_with_retry<L: LanguageModel>(
    llm: &L,
    prompt: &str,
    max_retries: usize,
) -> Result<String> {
    for attempt in 0..max_retries {
        let response = llm.complete(prompt).await?;

        if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
            return Ok(response);
        }

        warn!(attempt = attempt + 1, "model returned invalid JSON");

        if attempt < max_retries - 1 {
            let corrected = llm.complete(&prompt::build_retry_prompt(&response)).await?;
            if serde_json::from_str::<serde_json::Value>(&corrected).is_ok() {
                return Ok(corrected);
            }
        }
    }

    anyhow::bail!("failed to get valid JSON after {max_retries} retries")
}
