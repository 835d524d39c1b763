use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use tracing::warn;

/// Parse and validate a batch response. The model must return a JSON object
/// mapping chunk ids to arrays of strings; anything else is rejected here
/// rather than trusted downstream.
///
/// Per-item salvage rules: ids outside the batch are ignored, a non-array
/// value skips that chunk, and non-string array elements are dropped. A
/// missing id is simply no entities for that chunk.
pub fn parse_batch_response(
    raw: &str,
    expected_ids: &[String],
) -> Result<HashMap<String, Vec<String>>> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("batch response is not valid JSON")?;
    let object = value
        .as_object()
        .context("batch response is not a JSON object")?;

    let expected: HashSet<&str> = expected_ids.iter().map(|id| id.as_str()).collect();
    let mut entities = HashMap::new();

    for (chunk_id, value) in object {
        if !expected.contains(chunk_id.as_str()) {
            warn!(chunk_id = %chunk_id, "response names a chunk outside the batch, ignoring");
            continue;
        }
        let Some(items) = value.as_array() else {
            warn!(chunk_id = %chunk_id, "entity list is not an array, skipping chunk");
            continue;
        };
        let mut names = Vec::new();
        for item in items {
            match item.as_str() {
                Some(name) => names.push(name.to_string()),
                None => warn!(chunk_id = %chunk_id, "dropping non-string entity entry"),
            }
        }
        entities.insert(chunk_id.clone(), names);
    }

    Ok(entities)
}

/// Parse the query-time response: `{"entities": [...]}`. An absent key is
/// an empty result, not an error.
pub fn parse_query_response(raw: &str) -> Result<Vec<String>> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("query response is not valid JSON")?;
    let object = value
        .as_object()
        .context("query response is not a JSON object")?;

    let Some(items) = object.get("entities") else {
        return Ok(Vec::new());
    };
    let items = items
        .as_array()
        .context("\"entities\" is not an array")?;

    let mut names = Vec::new();
    for item in items {
        match item.as_str() {
            Some(name) => names.push(name.to_string()),
            None => warn!("dropping non-string query entity entry"),
        }
    }
    Ok(names)
}
