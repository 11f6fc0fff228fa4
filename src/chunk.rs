//! Sliding-window text chunker.
//!
//! Splits document body text into fixed-size [`Chunk`]s with a fixed overlap
//! between adjacent chunks, so information spanning a chunk boundary is not
//! lost to retrieval. Sizes are measured in characters.
//!
//! Each chunk carries its source document's filename as provenance, plus a
//! SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Split a document into chunks of `chunk_size` characters, with adjacent
/// chunks sharing exactly `overlap` characters at the boundary.
///
/// Returns chunks with contiguous indices starting at 0. A document whose
/// body is empty or whitespace-only yields no chunks.
///
/// Invariant: `overlap < chunk_size` (enforced by config validation).
pub fn chunk_document(doc: &Document, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    if doc.body.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = doc.body.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    loop {
        let end = (start + chunk_size).min(len);
        let text: String = chars[start..end].iter().collect();
        chunks.push(make_chunk(doc, index, &text));
        index += 1;

        if end == len {
            break;
        }
        // Step back so the next chunk repeats the last `overlap` chars.
        start = end - overlap;
    }

    chunks
}

fn make_chunk(doc: &Document, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: doc.id.clone(),
        chunk_index: index,
        file_name: doc.file_name.clone(),
        text: text.to_string(),
        hash,
    }
}
