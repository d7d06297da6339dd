//! Fixed-window text chunker with overlap.
//!
//! Splits document content into pieces of at most `chunk_size` characters.
//! Each piece after the first starts `overlap` characters before the end of
//! the previous one, so nothing is lost at a boundary. Sizes are counted in
//! Unicode scalar values; a multi-byte character is never split.
//!
//! Each [`Chunk`] carries a SHA-256 hash of its text, stored in the record
//! metadata as `content_hash`.
//!
//! # Algorithm
//!
//! 1. Reject `chunk_size == 0` and `overlap >= chunk_size`.
//! 2. Empty or whitespace-only content yields no chunks.
//! 3. Take `chunk_size` characters from the current start.
//! 4. Stop if the window reached the end; otherwise move the start to
//!    `end - overlap` and repeat.
//!
//! For content of `len` characters the number of chunks is 1 when
//! `len <= chunk_size`, else `1 + ceil((len - chunk_size) / (chunk_size - overlap))`.
//!
//! # Example
//!
//! ```rust
//! use docctx_core::chunk::{chunk_text, reassemble};
//!
//! let chunks = chunk_text("abcdefghij", 4, 1).unwrap();
//! assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
//! assert_eq!(reassemble(&chunks, 1), "abcdefghij");
//! ```

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Validated chunking policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        validate(chunk_size, overlap)?;
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `content` into indexed, hashed chunks.
    pub fn split(&self, content: &str) -> Vec<Chunk> {
        split_windows(content, self.chunk_size, self.overlap)
            .into_iter()
            .enumerate()
            .map(|(index, text)| make_chunk(index, text))
            .collect()
    }
}

fn validate(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::config("chunk_size must be > 0"));
    }
    if overlap >= chunk_size {
        return Err(Error::config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Split `content` into overlapping windows of at most `chunk_size` characters.
pub fn chunk_text(content: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    validate(chunk_size, overlap)?;
    Ok(split_windows(content, chunk_size, overlap))
}

fn split_windows(content: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every character, plus the end of the string.
    let mut bounds: Vec<usize> = content.char_indices().map(|(i, _)| i).collect();
    let len = bounds.len();
    bounds.push(content.len());

    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(len);
        pieces.push(content[bounds[start]..bounds[end]].to_string());
        if end == len {
            break;
        }
        start = end - overlap;
    }
    pieces
}

/// Expected number of chunks for `len` characters.
pub fn expected_chunk_count(len: usize, chunk_size: usize, overlap: usize) -> usize {
    if len == 0 {
        0
    } else if len <= chunk_size {
        1
    } else {
        let step = chunk_size - overlap;
        1 + (len - chunk_size).div_ceil(step)
    }
}

/// Rebuild the original content from chunks produced with the same `overlap`.
pub fn reassemble<S: AsRef<str>>(chunks: &[S], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let text = chunk.as_ref();
        if i == 0 {
            out.push_str(text);
        } else {
            out.extend(text.chars().skip(overlap));
        }
    }
    out
}

fn make_chunk(index: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk { index, text, hash }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 100, 10).unwrap();
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_exact_size_single_chunk() {
        let chunks = chunk_text("abcd", 4, 2).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
        assert!(chunk_text(" \n\t ", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_shared_at_boundaries() {
        let chunks = chunk_text("abcdefghijkl", 5, 2).unwrap();
        assert_eq!(chunks, vec!["abcde", "defgh", "ghijk", "jkl"]);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 2).collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn test_zero_overlap() {
        let chunks = chunk_text("abcdefg", 3, 0).unwrap();
        assert_eq!(chunks, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_invalid_policy_is_config_error() {
        assert!(matches!(
            chunk_text("abc", 4, 4),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            chunk_text("abc", 4, 9),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(Chunker::new(0, 0), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_multibyte_characters_not_split() {
        let text = "ééééé🦀🦀🦀";
        let chunks = chunk_text(text, 3, 1).unwrap();
        for c in &chunks {
            assert!(c.chars().count() <= 3);
        }
        assert_eq!(reassemble(&chunks, 1), text);
    }

    #[test]
    fn test_count_matches_formula() {
        let text: String = (0..1000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        for (size, overlap) in [(100, 0), (100, 20), (7, 3), (999, 998), (1000, 10), (1500, 5)] {
            let chunks = chunk_text(&text, size, overlap).unwrap();
            assert_eq!(
                chunks.len(),
                expected_chunk_count(1000, size, overlap),
                "size={} overlap={}",
                size,
                overlap
            );
            assert_eq!(reassemble(&chunks, overlap), text);
            assert!(chunks.iter().all(|c| c.chars().count() <= size));
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let chunker = Chunker::new(8, 3).unwrap();
        let c1 = chunker.split(text);
        let c2 = chunker.split(text);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_eq!(a.index, b.index);
        }
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let chunker = Chunker::new(10, 4).unwrap();
        let chunks = chunker.split(&"word ".repeat(40));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.hash.len(), 64);
        }
    }
}
