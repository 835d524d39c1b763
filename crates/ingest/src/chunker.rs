use std::collections::VecDeque;

/// Separator ladder, coarsest first: paragraph, line, sentence/clause
/// punctuation, whitespace. Raw character slicing is the last resort.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ".", ",", " "];

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Upper bound on chunk length, in characters.
    pub chunk_size: usize,
    /// Characters carried over from the tail of one chunk into the next.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 300,
        }
    }
}

/// Hierarchical character splitter. Prefers the coarsest separator present
/// in the text, recursing into finer separators for any piece still over
/// `chunk_size`, and packs the pieces back into chunks with overlap.
/// Separators stay attached to the text, so chunk content is a verbatim
/// slice of the source.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let Some(pos) = separators.iter().position(|sep| text.contains(sep)) else {
            return self.split_by_chars(text);
        };
        let sep = separators[pos];
        let finer = &separators[pos + 1..];

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, sep) {
            if char_len(piece) <= self.config.chunk_size {
                pending.push(piece.to_string());
                continue;
            }
            // Oversized piece: flush what we have, then recurse into it.
            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.extend(self.split_by_chars(piece));
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }
        chunks
    }

    /// Pack pieces into chunks of at most `chunk_size` characters, re-seeding
    /// each new chunk with the previous chunk's tail until the carried text
    /// drops under `chunk_overlap`.
    fn merge_pieces(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&String> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);
            if total + piece_len > self.config.chunk_size && !window.is_empty() {
                chunks.push(join(&window));
                while total > self.config.chunk_overlap
                    || (total + piece_len > self.config.chunk_size && total > 0)
                {
                    let Some(dropped) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(dropped);
                }
            }
            window.push_back(piece);
            total += piece_len;
        }
        if !window.is_empty() {
            chunks.push(join(&window));
        }
        chunks
    }

    /// Last resort for text with no usable separator: fixed windows of
    /// `chunk_size` characters, stepped so consecutive windows overlap.
    fn split_by_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        let size = self.config.chunk_size.max(1);
        let step = size.saturating_sub(self.config.chunk_overlap).max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

/// Split on `sep`, leaving each occurrence attached to the end of the piece
/// that precedes it.
fn split_keeping_separator<'t>(text: &'t str, sep: &str) -> Vec<&'t str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    while let Some(found) = text[start..].find(sep) {
        let end = start + found + sep.len();
        pieces.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join(pieces: &VecDeque<&String>) -> String {
    pieces.iter().map(|s| s.as_str()).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunker(800, 300).split("A single short paragraph.");
        assert_eq!(chunks, vec!["A single short paragraph.".to_string()]);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = "First paragraph with some words.\n\nSecond paragraph with some words.";
        let chunks = chunker(40, 0).split(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "First paragraph with some words.");
        assert_eq!(chunks[1], "Second paragraph with some words.");
    }

    #[test]
    fn respects_chunk_size() {
        let text = "one. two. three. four. five. six. seven. eight. nine. ten. eleven. twelve";
        for chunk in chunker(20, 5).split(text) {
            assert!(chunk.chars().count() <= 20, "oversized chunk: {chunk:?}");
        }
    }

    #[test]
    fn keeps_sentence_punctuation() {
        let chunks = chunker(30, 0).split("First sentence here. Second sentence here.");
        assert!(chunks.iter().all(|c| c.ends_with('.')), "chunks: {chunks:?}");
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = chunker(25, 12).split(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].contains(tail_word),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn falls_back_to_raw_slicing() {
        let text = "x".repeat(50);
        let chunks = chunker(20, 5).split(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        let covered: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert!(covered >= 50);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunker(800, 300).split("").is_empty());
        assert!(chunker(800, 300).split("   \n\n  ").is_empty());
    }

    #[test]
    fn split_keeping_separator_covers_the_text() {
        let pieces = split_keeping_separator("a. b. c", ".");
        assert_eq!(pieces, vec!["a.", " b.", " c"]);
        assert_eq!(pieces.concat(), "a. b. c");
    }
}
