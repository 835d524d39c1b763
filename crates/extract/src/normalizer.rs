use regex::Regex;

/// Canonicalizes entity names: lower-case, trimmed, inner whitespace runs
/// collapsed. Idempotent, so case/whitespace variants of the same string
/// collapse to one canonical form.
pub struct EntityNormalizer {
    whitespace: Regex,
}

impl EntityNormalizer {
    pub fn new() -> Self {
        Self {
            whitespace: Regex::new(r"\s+").unwrap(),
        }
    }

    pub fn normalize(&self, name: &str) -> String {
        let lowered = name.to_lowercase();
        self.whitespace
            .replace_all(lowered.trim(), " ")
            .to_string()
    }
}

impl Default for EntityNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
