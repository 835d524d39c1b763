/// Batched extraction prompt. Carries the recent-entity window so the model
/// reuses established names instead of inventing near-duplicates.
pub fn build_batch_prompt(known_entities: &[String], batch: &[(String, String)]) -> String {
    let known = if known_entities.is_empty() {
        "[]".to_string()
    } else {
        format!("[{}]", known_entities.join(", "))
    };
    let batch_texts = batch
        .iter()
        .map(|(chunk_id, text)| format!("{chunk_id}: {text}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an NLP researcher assistant helping extract scientific concepts from text chunks to populate a knowledge graph. You will be given:

1. A list of previously extracted scientific concept names ("known_entities")
2. A set of labeled paragraph chunks from scientific papers, one per line, as "chunkID: chunk text"

Your task:
- Extract key scientific concepts (e.g., methods, models, datasets, techniques).
- For each chunk, return a list of normalized entities.
- If a new concept is similar to one in known_entities (e.g., "Vision-Language Model" vs "vision language"), reuse the known entity name to ensure consistency and reduce duplication.
- Your output must be a valid JSON object with all chunk IDs present.

Instructions:
1. Do not include any explanations or comments in your response.
2. If a chunk has no entities, return an empty list for it.
3. Format must be valid JSON. Output only the JSON.
4. You must extract entities from every single chunk.
5. Use previously seen entity names from the known_entities list when possible.

Input:
- Known entities: {known}
- Text chunks:
{batch_texts}

Return output like:
{{
  "d01p0001c01": ["transformer", "bert"],
  "d01p0001c02": ["language model"]
}}

JSON OUTPUT:"#
    )
}

/// Single-text prompt used at query time.
pub fn build_query_prompt(text: &str) -> String {
    format!(
        r#"Extract key scientific concepts and technical terms from the following text. Focus on:
1. Technical components and architectures
2. Methods and techniques
3. Models and frameworks
4. Important concepts and terminology

Return only a JSON object with a single key "entities" containing a list of extracted entities.
Be concise and specific in entity extraction.

Text: {text}

JSON OUTPUT:"#
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{invalid_json}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#
    )
}
