//! Document loading from the configured source directory.
//!
//! Walks the directory, applies include/exclude globs, extracts text per
//! file format, and returns documents in deterministic (path-sorted) order.
//! A file that fails extraction is skipped with a warning; an empty corpus
//! is fatal.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::DataLoadError;
use crate::extract;
use crate::models::Document;

pub fn load_documents(config: &Config) -> Result<Vec<Document>, DataLoadError> {
    let root = &config.documents.dir;
    if !root.exists() {
        return Err(DataLoadError::MissingSourceDir(root.clone()));
    }

    let include_set = build_globset(&config.documents.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.documents.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| DataLoadError::Unreadable {
            path: root.clone(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match read_document(path, &rel_str) {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => {}
            Err(e) => return Err(e),
        }
    }

    documents.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    if documents.is_empty() {
        return Err(DataLoadError::EmptyCorpus(root.clone()));
    }

    Ok(documents)
}

/// Read one file into a document. Returns `Ok(None)` when the file is
/// skipped (failed extraction or empty body).
fn read_document(path: &Path, rel_path: &str) -> Result<Option<Document>, DataLoadError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| rel_path.to_string());

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let body = if extract::is_binary_format(&extension) {
        let bytes = std::fs::read(path).map_err(|e| DataLoadError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        match extract::extract_text(&bytes, &extension) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", rel_str_display(rel_path), e);
                return Ok(None);
            }
        }
    } else {
        match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                // Not UTF-8; skip rather than abort the corpus.
                eprintln!("Warning: skipping {}: not valid UTF-8", rel_str_display(rel_path));
                return Ok(None);
            }
            Err(e) => {
                return Err(DataLoadError::Unreadable {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    };

    if body.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(Document {
        id: Uuid::new_v4().to_string(),
        file_name,
        rel_path: rel_path.to_string(),
        body,
    }))
}

fn rel_str_display(rel: &str) -> &str {
    if rel.is_empty() {
        "(unnamed)"
    } else {
        rel
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, DataLoadError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
