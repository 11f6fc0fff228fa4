//! SQLite persistence for the vector index.
//!
//! The persisted index is a single `index.sqlite` file inside the persist
//! directory: documents, chunks, chunk vectors (little-endian f32 BLOBs),
//! and an `index_meta` key/value table. The layout is written in full
//! before a handle is ever served from it; loading validates structure and
//! counts and fails with [`IndexLoadError`] on anything inconsistent.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::IndexLoadError;
use crate::index::{IndexMeta, IndexedChunk};
use crate::models::{Chunk, Document};

pub async fn connect(path: &Path, create_if_missing: bool) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(create_if_missing)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            rel_path TEXT NOT NULL UNIQUE,
            byte_len INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            file_name TEXT NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(document_id, chunk_index),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Write documents, chunks, and vectors in one transaction, then the meta
/// rows. Meta is written last so a database with meta present is complete.
pub async fn save_index(
    pool: &SqlitePool,
    documents: &[Document],
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    meta: &IndexMeta,
) -> Result<()> {
    debug_assert_eq!(chunks.len(), vectors.len());

    let mut tx = pool.begin().await?;

    for doc in documents {
        sqlx::query("INSERT INTO documents (id, file_name, rel_path, byte_len) VALUES (?, ?, ?, ?)")
            .bind(&doc.id)
            .bind(&doc.file_name)
            .bind(&doc.rel_path)
            .bind(doc.body.len() as i64)
            .execute(&mut *tx)
            .await?;
    }

    for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, file_name, text, hash) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.file_name)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
            .bind(&chunk.id)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
    }

    let meta_rows = [
        ("embedding_model", meta.embedding_model.clone()),
        ("dims", meta.dims.to_string()),
        ("chunk_size", meta.chunk_size.to_string()),
        ("chunk_overlap", meta.chunk_overlap.to_string()),
        ("built_at", meta.built_at.to_string()),
        ("document_count", meta.document_count.to_string()),
        ("chunk_count", meta.chunk_count.to_string()),
    ];
    for (key, value) in meta_rows {
        sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Load index metadata, failing if any required key is absent or
/// unparseable.
pub async fn load_meta(pool: &SqlitePool) -> Result<IndexMeta, IndexLoadError> {
    let rows = sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(pool)
        .await?;

    let mut map = std::collections::HashMap::new();
    for row in rows {
        let key: String = row.get("key");
        let value: String = row.get("value");
        map.insert(key, value);
    }

    let get = |key: &str| -> Result<String, IndexLoadError> {
        map.get(key)
            .cloned()
            .ok_or_else(|| IndexLoadError::Corrupt(format!("index_meta missing key: {}", key)))
    };
    let get_num = |key: &str| -> Result<i64, IndexLoadError> {
        get(key)?
            .parse::<i64>()
            .map_err(|_| IndexLoadError::Corrupt(format!("index_meta key {} is not a number", key)))
    };

    Ok(IndexMeta {
        embedding_model: get("embedding_model")?,
        dims: get_num("dims")? as usize,
        chunk_size: get_num("chunk_size")? as usize,
        chunk_overlap: get_num("chunk_overlap")? as usize,
        built_at: get_num("built_at")?,
        document_count: get_num("document_count")?,
        chunk_count: get_num("chunk_count")?,
    })
}

/// Load every chunk joined with its vector, validating against `meta`:
/// the row count must match `chunk_count`, every chunk must have a vector,
/// and every vector must decode to exactly `dims` floats.
pub async fn load_chunks(
    pool: &SqlitePool,
    meta: &IndexMeta,
) -> Result<Vec<IndexedChunk>, IndexLoadError> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.document_id, c.chunk_index, c.file_name, c.text, v.embedding
        FROM chunks c
        LEFT JOIN chunk_vectors v ON v.chunk_id = c.id
        ORDER BY c.document_id, c.chunk_index
        "#,
    )
    .fetch_all(pool)
    .await?;

    if rows.len() as i64 != meta.chunk_count {
        return Err(IndexLoadError::Corrupt(format!(
            "chunk count mismatch: meta says {}, found {}",
            meta.chunk_count,
            rows.len()
        )));
    }

    let mut chunks = Vec::with_capacity(rows.len());

    for row in rows {
        let id: String = row.get("id");
        let blob: Option<Vec<u8>> = row.get("embedding");
        let blob = blob
            .ok_or_else(|| IndexLoadError::Corrupt(format!("chunk {} has no vector", id)))?;

        let embedding = blob_to_vec(&blob);
        if embedding.len() != meta.dims {
            return Err(IndexLoadError::Corrupt(format!(
                "chunk {} vector has {} dims, expected {}",
                id,
                embedding.len(),
                meta.dims
            )));
        }

        let file_name: String = row.get("file_name");

        chunks.push(IndexedChunk {
            id,
            document_id: row.get("document_id"),
            chunk_index: row.get("chunk_index"),
            file_name: if file_name.is_empty() {
                None
            } else {
                Some(file_name)
            },
            text: row.get("text"),
            embedding,
        });
    }

    Ok(chunks)
}
