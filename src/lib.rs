//! # Shareholder RAG
//!
//! Retrieval-augmented question answering over a corpus of Berkshire
//! Hathaway shareholder letters.
//!
//! PDF letters are extracted, chunked, embedded, and held in an in-memory
//! vector index that is snapshotted to a single JSON file. Queries embed the
//! question, rank chunks by cosine similarity, and optionally restrict
//! results by exact metadata match (e.g. `year`).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  PDF corpus │──▶│ Extract+Chunk │──▶│ VectorStore  │──▶ snapshot.json
//! └─────────────┘   └──────────────┘   │ embed+index  │
//!                                      └──────┬───────┘
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!                 ┌──────────┐          ┌──────────┐
//!                 │   CLI    │          │   HTTP   │
//!                 │  (srag)  │          │  (axum)  │
//!                 └──────────┘          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! srag ingest                          # extract, chunk, embed, save
//! srag query "insurance float" --year 2020
//! srag ask "Why does Berkshire like float?"
//! srag serve                           # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Chunks, records, metadata filters |
//! | [`embedding`] | Embedding provider abstraction and cosine similarity |
//! | [`index`] | In-memory vector index |
//! | [`persist`] | JSON snapshot save/load |
//! | [`store`] | The caller-facing vector store |
//! | [`extract`] | PDF and text extraction |
//! | [`chunk`] | Text chunking |
//! | [`ingest`] | Corpus scan and ingestion pipeline |
//! | [`context`] | LLM context formatting |
//! | [`answer`] | Chat model and question answering |
//! | [`server`] | HTTP server |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod index_cmd;
pub mod ingest;
pub mod models;
pub mod persist;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
