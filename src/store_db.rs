use std::path::Path;

use rayon::prelude::*;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    record::Metadata,
    vector_store::{Collection, QueryMatch, VectorStore, nearest, validate_add},
};

/// Collection name -> fingerprint of the embedder that built it.
const COLLECTIONS: TableDefinition<&str, &str> =
    TableDefinition::new("collections");
/// `collection\0id` -> JSON-encoded [`StoredDocument`].
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
/// `collection\0id` -> embedding vector.
const EMBEDDINGS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("embeddings");

/// Header size: 4 bytes dimension.
const HEADER_SIZE: usize = 4;

const KEY_SEPARATOR: char = '\0';

#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    text: String,
    metadata: Metadata,
}

/// Persistent [`VectorStore`] backed by a single redb file.
///
/// Embedding format per entry:
/// - 4 bytes: dimension D (u32 LE)
/// - D * 4 bytes: f32 values in native byte order
pub struct RedbStore {
    db: Database,
    embedder: Box<dyn Embedder>,
}

impl RedbStore {
    /// Open or create a store at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use vecsearch::{HashingEmbedder, RedbStore, VectorStore};
    ///
    /// let store = RedbStore::open(
    ///     &tmp.path().join("vecsearch.redb"),
    ///     Box::new(HashingEmbedder::default()),
    /// )
    /// .unwrap();
    /// assert!(store.list_collections().unwrap().is_empty());
    /// ```
    pub fn open(path: &Path, embedder: Box<dyn Embedder>) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(COLLECTIONS)?;
        txn.open_table(DOCUMENTS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.commit()?;

        Ok(Self { db, embedder })
    }

    fn collection_exists(&self, name: &str) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(COLLECTIONS)?;
        Ok(table.get(name)?.is_some())
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("embedder", &self.embedder.id())
            .finish_non_exhaustive()
    }
}

impl VectorStore for RedbStore {
    type Collection<'a> = RedbCollection<'a>;

    fn list_collections(&self) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(COLLECTIONS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, _) = entry?;
            result.push(k.value().to_string());
        }
        Ok(result)
    }

    fn get_or_create_collection(&self, name: &str) -> Result<RedbCollection<'_>> {
        if name.is_empty() || name.contains(KEY_SEPARATOR) {
            return Err(Error::Config(format!(
                "invalid collection name {name:?}"
            )));
        }

        let requested = self.embedder.id();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(COLLECTIONS)?;
            let stored = table.get(name)?.map(|v| v.value().to_string());
            match stored {
                Some(stored) if stored != requested => {
                    return Err(Error::EmbedderMismatch {
                        collection: name.to_string(),
                        stored,
                        requested,
                    });
                }
                Some(_) => {}
                None => {
                    tracing::debug!(collection = name, embedder = %requested, "creating collection");
                    table.insert(name, requested.as_str())?;
                }
            }
        }
        txn.commit()?;

        Ok(RedbCollection {
            store: self,
            name: name.to_string(),
            prefix: format!("{name}{KEY_SEPARATOR}"),
        })
    }

    fn reset(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.delete_table(COLLECTIONS)?;
        txn.delete_table(DOCUMENTS)?;
        txn.delete_table(EMBEDDINGS)?;
        txn.open_table(COLLECTIONS)?;
        txn.open_table(DOCUMENTS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.commit()?;
        tracing::info!("store reset, all collections dropped");
        Ok(())
    }

    fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }
}

/// Handle to a collection inside a [`RedbStore`].
#[derive(Debug)]
pub struct RedbCollection<'a> {
    store: &'a RedbStore,
    name: String,
    prefix: String,
}

impl RedbCollection<'_> {
    fn key(&self, id: &str) -> String {
        format!("{}{id}", self.prefix)
    }

    fn ensure_exists(&self) -> Result<()> {
        if self.store.collection_exists(&self.name)? {
            Ok(())
        } else {
            Err(Error::NotFound {
                kind: "collection",
                name: self.name.clone(),
            })
        }
    }

    /// All `(id, embedding)` pairs of this collection.
    fn load_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let txn = self.store.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;
        let mut result = Vec::new();
        for entry in table.range(self.prefix.as_str()..)? {
            let (k, v) = entry?;
            let Some(id) = k.value().strip_prefix(self.prefix.as_str()) else {
                break;
            };
            if let Some(embedding) = decode_embedding(v.value()) {
                result.push((id.to_string(), embedding));
            }
        }
        Ok(result)
    }
}

impl Collection for RedbCollection<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn add(
        &mut self,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<usize> {
        validate_add(&self.name, ids, texts, metadatas)?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.ensure_exists()?;

        // Drop ids that are already stored; the first write wins.
        let fresh: Vec<usize> = {
            let txn = self.store.db.begin_read()?;
            let table = txn.open_table(DOCUMENTS)?;
            let mut fresh = Vec::with_capacity(ids.len());
            for (i, id) in ids.iter().enumerate() {
                if table.get(self.key(id).as_str())?.is_some() {
                    tracing::warn!(collection = %self.name, %id, "id already present, skipping");
                } else {
                    fresh.push(i);
                }
            }
            fresh
        };
        if fresh.is_empty() {
            return Ok(0);
        }

        let fresh_texts: Vec<String> =
            fresh.iter().map(|&i| texts[i].clone()).collect();
        let embeddings = self.store.embedder.encode_documents(&fresh_texts)?;
        if embeddings.len() != fresh.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                fresh.len(),
                embeddings.len()
            )));
        }

        let txn = self.store.db.begin_write()?;
        {
            let mut documents = txn.open_table(DOCUMENTS)?;
            let mut vectors = txn.open_table(EMBEDDINGS)?;
            for (&i, embedding) in fresh.iter().zip(&embeddings) {
                let key = self.key(&ids[i]);
                let stored = StoredDocument {
                    text: texts[i].clone(),
                    metadata: metadatas[i].clone(),
                };
                let bytes = serde_json::to_vec(&stored)?;
                documents.insert(key.as_str(), bytes.as_slice())?;
                vectors.insert(key.as_str(), encode_embedding(embedding).as_slice())?;
            }
        }
        txn.commit()?;
        Ok(fresh.len())
    }

    fn query(&self, text: &str, k: usize) -> Result<Vec<QueryMatch>> {
        self.ensure_exists()?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.load_embeddings()?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.store.embedder.encode_query(text)?;
        let ranked = nearest(
            &query,
            candidates
                .par_iter()
                .map(|(id, embedding)| (id.as_str(), embedding.as_slice())),
            k,
        );

        let txn = self.store.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut matches = Vec::with_capacity(ranked.len());
        for (i, distance) in ranked {
            let id = &candidates[i].0;
            let Some(guard) = table.get(self.key(id).as_str())? else {
                continue;
            };
            let stored: StoredDocument = serde_json::from_slice(guard.value())?;
            matches.push(QueryMatch {
                id: id.clone(),
                text: stored.text,
                metadata: stored.metadata,
                distance,
            });
        }
        Ok(matches)
    }

    fn count(&self) -> Result<usize> {
        self.ensure_exists()?;
        let txn = self.store.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut count = 0;
        for entry in table.range(self.prefix.as_str()..)? {
            let (k, _) = entry?;
            if !k.value().starts_with(self.prefix.as_str()) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

fn encode_embedding(data: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE + std::mem::size_of_val(data));
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(bytemuck::cast_slice(data));
    bytes
}

/// Returns `None` for entries whose length disagrees with their header.
fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    let header: [u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
    let dimension = u32::from_le_bytes(header) as usize;
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != dimension * 4 {
        return None;
    }

    // redb does not guarantee 4-byte alignment of values.
    Some(match bytemuck::try_cast_slice::<u8, f32>(payload) {
        Ok(floats) => floats.to_vec(),
        Err(_) => payload
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    })
}
