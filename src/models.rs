//! Core data models for the document chat pipeline.
//!
//! These types represent the documents and chunks that flow into the index,
//! and the answers and chat turns that flow back out to the surface.

use serde::{Deserialize, Serialize};

/// A raw document loaded from the source directory before chunking.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Bare filename, carried into every chunk as provenance.
    pub file_name: String,
    /// Path relative to the document root, used for deterministic ordering.
    pub rel_path: String,
    /// Extracted UTF-8 body text.
    pub body: String,
}

/// A bounded slice of a document's text.
///
/// Created once at index-build time and immutable thereafter. The
/// `file_name` back-reference keeps provenance alive through retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub file_name: String,
    pub text: String,
    pub hash: String,
}

/// One retrieved chunk supporting an answer.
#[derive(Debug, Clone)]
pub struct SourceChunk {
    /// Provenance filename; `None` when the chunk's metadata lacks one.
    pub file_name: Option<String>,
    pub text: String,
    pub score: f32,
}

/// Result of asking the index a question: synthesized text plus the
/// ordered chunks that informed it.
#[derive(Debug, Clone)]
pub struct QueryAnswer {
    pub text: String,
    pub sources: Vec<SourceChunk>,
}

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the session's chat history.
///
/// `source_files` is present only on assistant turns that answered
/// successfully; it is sorted and de-duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_files: Option<Vec<String>>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn {
            role: Role::User,
            content: content.into(),
            source_files: None,
        }
    }

    pub fn assistant(content: impl Into<String>, source_files: Option<Vec<String>>) -> Self {
        ChatTurn {
            role: Role::Assistant,
            content: content.into(),
            source_files,
        }
    }
}
