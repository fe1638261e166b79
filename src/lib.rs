//! vecsearch - semantic search over title/abstract records with per-result
//! relevant terms.
//!
//! Records are read from a JSON-lines file and committed in batches to a
//! named collection of a [`VectorStore`]. A search returns the nearest
//! documents and, for each, the tokens from the result set that sit closest
//! to the query in the same embedding space.
//!
//! # Quick start
//!
//! ```
//! use vecsearch::{HashingEmbedder, MemoryStore, ingestion, search};
//!
//! let embedder = HashingEmbedder::default();
//! let store = MemoryStore::new(&embedder);
//!
//! let records = r#"{"id": "1", "title": "Graph theory", "abstract": "Shortest path algorithms."}
//! {"id": "2", "title": "Cooking", "abstract": "Recipes for pasta."}"#;
//! let summary = ingestion::ingest(records.as_bytes(), &store, 10).unwrap();
//! assert_eq!(summary.documents, 2);
//!
//! let hits = search::search(&store, "graph algorithms", 10, 3).unwrap();
//! assert_eq!(hits[0].id, "1");
//! assert!(hits[0].terms.contains(&"graph".to_string()));
//! ```

pub mod cli;
pub mod config;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod ingestion;
pub mod model_manager;
pub mod record;
pub mod search;
pub mod store_db;
pub mod terms;
pub mod tokenizer;
pub mod vector_store;

pub use config::Config;
pub use data_dir::DataDir;
pub use embedding::{Embedder, HashingEmbedder};
pub use error::{Error, Result};
pub use model_manager::ColbertEmbedder;
pub use store_db::RedbStore;
pub use vector_store::{Collection, MemoryStore, VectorStore};
