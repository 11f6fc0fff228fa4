//! # docchat
//!
//! A local-first document chat assistant with retrieval-grounded answers.
//!
//! docchat loads a directory of documents, splits them into overlapping
//! chunks, embeds the chunks, and builds a persisted vector index. Each
//! question retrieves the most similar chunks and asks a chat model for an
//! answer grounded in them; every answer carries the de-duplicated set of
//! source filenames that contributed to it.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────────┐   ┌───────────┐
//! │  Loader   │──▶│  Provisioner  │──▶│  SQLite   │
//! │ docs dir  │   │ chunk + embed │   │ persisted │
//! └───────────┘   └──────┬────────┘   └───────────┘
//!                        ▼
//!                 ┌─────────────┐   ┌──────────┐
//!                 │ VectorIndex │──▶│ Pipeline │──▶ CLI / HTTP chat
//!                 └─────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat index                  # build (or reload) the index
//! docchat ask "What is covered in the runbooks?"
//! docchat serve                  # start the chat server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed provisioning and query errors |
//! | [`loader`] | Document loading from disk |
//! | [`extract`] | PDF/DOCX text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding backend abstraction |
//! | [`llm`] | Answer synthesis backend |
//! | [`index`] | In-memory vector index |
//! | [`store`] | SQLite index persistence |
//! | [`provision`] | Build-or-reload provisioning |
//! | [`query`] | Query-response pipeline |
//! | [`session`] | Session chat history |
//! | [`server`] | HTTP chat surface |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod loader;
pub mod models;
pub mod provision;
pub mod query;
pub mod server;
pub mod session;
pub mod store;
