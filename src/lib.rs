//! # Lorebase
//!
//! A local-first retrieval-augmented question answering system for document
//! collections.
//!
//! Lorebase scans a corpus of text, markdown, and PDF documents, normalizes
//! and chunks their text, embeds the chunks into a persistent SQLite index,
//! and answers natural-language questions against that index with a
//! generation model, grounding every answer in retrieved context and citing
//! the source documents. Conversations are session-scoped: follow-up
//! questions see the history of their session and nothing else.
//!
//! ## Pipeline
//!
//! ```text
//! corpus ──▶ extract ──▶ normalize ──▶ chunk ──▶ embed ──▶ SQLite index
//!                                                              │
//!                 question ──▶ retrieve top-k ◀────────────────┘
//!                                   │
//!                 history + context ▼
//!                              prompt ──▶ generate ──▶ answer + sources
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lore init                     # create the index database
//! lore ingest                   # extract, chunk, and embed the corpus
//! lore ask "Who built the canal?"
//! lore serve                    # start the HTTP query server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`extract`] | Corpus scanning and document text extraction |
//! | [`normalize`] | Multi-stage text cleanup |
//! | [`chunk`] | Overlapping boundary-aware chunking |
//! | [`embedding`] | Embedding provider abstraction and vector helpers |
//! | [`generation`] | Generation provider abstraction |
//! | [`index`] | Chunk index trait and in-memory implementation |
//! | [`sqlite_index`] | Persistent SQLite index |
//! | [`ingest`] | Index build pipeline and reuse/rebuild ladder |
//! | [`retrieve`] | Top-k retrieval and context assembly |
//! | [`session`] | Keyed conversation sessions |
//! | [`answer`] | Query orchestration and prompt assembly |
//! | [`server`] | HTTP query server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod retrieve;
pub mod server;
pub mod session;
pub mod sqlite_index;
