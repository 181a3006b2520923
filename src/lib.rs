//! # docdex
//!
//! Office-document ingestion, chunking, and substring search with a warm
//! result cache.
//!
//! docdex watches an import directory of office documents, detects new and
//! changed files by content fingerprint, splits each document into coherent
//! chunks — inferring section boundaries from the document's own line-break
//! statistics, or from ink contours when a document has no text layer — and
//! serves literal substring search over the accumulated chunks, memoizing
//! rendered results until a contributing source changes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────┐   ┌───────────┐
//! │ Import scan  │──▶│  Pipeline             │──▶│  SQLite    │
//! │ fingerprint  │   │ classify → split/OCR  │   │ chunks +   │
//! │ + classify   │   │ → purge+commit        │   │ cache      │
//! └──────────────┘   └───────────────────────┘   └─────┬─────┘
//!                                                      │
//!                                                      ▼
//!                                                ┌───────────┐
//!                                                │  search    │
//!                                                │ cache→scan │
//!                                                └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fingerprint`] | Streaming content hashing for change detection |
//! | [`registry`] | Source rows, new/unchanged/replace classification, purge |
//! | [`splitter`] | Delimiter-inference text chunking |
//! | [`extract`] | Text extraction (plain, PDF, docx) |
//! | [`visual`] | Image-based segmentation with OCR for scanned documents |
//! | [`store`] | Chunk storage and substring scan |
//! | [`cache`] | Persisted query-result cache with per-source invalidation |
//! | [`pipeline`] | Batch orchestration and source removal |
//! | [`search`] | Cache-fronted search and result rendering |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod search;
pub mod splitter;
pub mod status;
pub mod store;
pub mod visual;
