use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// One addressable slice of a source document. The unit of embedding,
/// extraction, and citation. Created once at ingestion, immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: usize,
    pub doc: String,
    pub page: usize,
    pub text: String,
}

/// Structured chunk address, formatted as `d{doc:02}p{page:04}c{seq:02}`.
///
/// The document index is 0-based; page and intra-page sequence are 1-based.
/// Field positions are fixed-width so the components can be recovered by
/// slicing, and the formatted ids sort in corpus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId {
    pub doc: usize,
    pub page: usize,
    pub seq: usize,
}

impl ChunkId {
    pub fn new(doc: usize, page: usize, seq: usize) -> Self {
        Self { doc, page, seq }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{:02}p{:04}c{:02}", self.doc, self.page, self.seq)
    }
}

impl FromStr for ChunkId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() < 10 || bytes[0] != b'd' || bytes[3] != b'p' || bytes[8] != b'c' {
            bail!("malformed chunk id: {s:?}");
        }
        let doc = s[1..3]
            .parse()
            .with_context(|| format!("bad document field in chunk id {s:?}"))?;
        let page = s[4..8]
            .parse()
            .with_context(|| format!("bad page field in chunk id {s:?}"))?;
        let seq = s[9..]
            .parse()
            .with_context(|| format!("bad sequence field in chunk id {s:?}"))?;
        Ok(Self { doc, page, seq })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_fixed_width() {
        assert_eq!(ChunkId::new(0, 1, 1).to_string(), "d00p0001c01");
        assert_eq!(ChunkId::new(1, 4, 2).to_string(), "d01p0004c02");
        assert_eq!(ChunkId::new(12, 1234, 7).to_string(), "d12p1234c07");
    }

    #[test]
    fn round_trips() {
        for id in ["d00p0001c01", "d01p0004c02", "d99p9999c99", "d03p0010c100"] {
            let parsed: ChunkId = id.parse().unwrap();
            assert_eq!(parsed.to_string(), id);
        }
    }

    #[test]
    fn parses_components() {
        let id: ChunkId = "d01p0004c02".parse().unwrap();
        assert_eq!((id.doc, id.page, id.seq), (1, 4, 2));
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["", "d1p0001c01", "x00p0001c01", "d00q0001c01", "d00p0001c", "dxxp0001c01"] {
            assert!(bad.parse::<ChunkId>().is_err(), "accepted {bad:?}");
        }
    }
}
