//! The similarity backend surface: named collections of embedded documents
//! that can be bulk-added to and queried by nearest neighbour.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashSet},
};

use rayon::prelude::*;

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    record::Metadata,
};

/// One ranked match returned by [`Collection::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Squared Euclidean distance to the query; lower is closer.
    pub distance: f32,
}

pub trait Collection {
    fn name(&self) -> &str;

    /// Embed and store documents in one atomic operation.
    ///
    /// The three slices are parallel columns and must have equal length.
    /// Ids repeated within one call are rejected; ids already present in
    /// the collection are skipped. Returns the number of documents stored.
    fn add(
        &mut self,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<usize>;

    /// The `k` nearest documents to `text`, by ascending distance.
    fn query(&self, text: &str, k: usize) -> Result<Vec<QueryMatch>>;

    fn count(&self) -> Result<usize>;
}

pub trait VectorStore {
    type Collection<'a>: Collection
    where
        Self: 'a;

    fn list_collections(&self) -> Result<Vec<String>>;

    fn get_or_create_collection(&self, name: &str)
    -> Result<Self::Collection<'_>>;

    /// Drop every collection in the store.
    fn reset(&self) -> Result<()>;

    fn embedder(&self) -> &dyn Embedder;
}

/// Squared Euclidean distance. Vectors of different length are compared
/// over their common prefix.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Check column lengths and in-call id uniqueness for an `add`.
pub(crate) fn validate_add(
    collection: &str,
    ids: &[String],
    texts: &[String],
    metadatas: &[Metadata],
) -> Result<()> {
    if ids.len() != texts.len() || ids.len() != metadatas.len() {
        return Err(Error::InvalidBatch(format!(
            "{} ids, {} texts and {} metadatas",
            ids.len(),
            texts.len(),
            metadatas.len()
        )));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(Error::DuplicateId {
                collection: collection.to_string(),
                id: id.clone(),
            });
        }
    }
    Ok(())
}

/// Indices of the `k` entries closest to `query`, with their distances.
///
/// Ties on distance fall back to the entry's id so results are stable.
pub(crate) fn nearest<'a, I>(
    query: &[f32],
    entries: I,
    k: usize,
) -> Vec<(usize, f32)>
where
    I: IndexedParallelIterator<Item = (&'a str, &'a [f32])>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &str, f32)> = entries
        .enumerate()
        .map(|(i, (id, embedding))| (i, id, squared_l2(query, embedding)))
        .collect();

    scored.sort_by(|a, b| {
        a.2.partial_cmp(&b.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(b.1))
    });
    scored.truncate(k);
    scored.into_iter().map(|(i, _, d)| (i, d)).collect()
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    text: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

/// Entries of one in-memory collection, in insertion order.
#[derive(Debug, Default)]
struct MemoryIndex {
    entries: Vec<Entry>,
    ids: HashSet<String>,
}

/// In-process [`VectorStore`] with nothing persisted.
///
/// Used for per-search term indexes and as a stand-in backend in tests.
/// Dropping the store discards every collection it holds.
pub struct MemoryStore<'e> {
    embedder: &'e dyn Embedder,
    collections: RefCell<BTreeMap<String, MemoryIndex>>,
}

impl<'e> MemoryStore<'e> {
    pub fn new(embedder: &'e dyn Embedder) -> Self {
        Self {
            embedder,
            collections: RefCell::new(BTreeMap::new()),
        }
    }
}

impl std::fmt::Debug for MemoryStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("collections", &self.collections.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<'e> VectorStore for MemoryStore<'e> {
    type Collection<'a>
        = MemoryCollection<'a, 'e>
    where
        Self: 'a;

    fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.borrow().keys().cloned().collect())
    }

    fn get_or_create_collection(
        &self,
        name: &str,
    ) -> Result<MemoryCollection<'_, 'e>> {
        self.collections
            .borrow_mut()
            .entry(name.to_string())
            .or_default();
        Ok(MemoryCollection {
            store: self,
            name: name.to_string(),
        })
    }

    fn reset(&self) -> Result<()> {
        self.collections.borrow_mut().clear();
        Ok(())
    }

    fn embedder(&self) -> &dyn Embedder {
        self.embedder
    }
}

/// Handle to a collection inside a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryCollection<'a, 'e> {
    store: &'a MemoryStore<'e>,
    name: String,
}

impl MemoryCollection<'_, '_> {
    fn missing(&self) -> Error {
        Error::NotFound {
            kind: "collection",
            name: self.name.clone(),
        }
    }
}

impl Collection for MemoryCollection<'_, '_> {
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
        if !self.store.collections.borrow().contains_key(&self.name) {
            return Err(self.missing());
        }

        let embeddings = self.store.embedder.encode_documents(texts)?;
        if embeddings.len() != ids.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                ids.len(),
                embeddings.len()
            )));
        }

        let mut collections = self.store.collections.borrow_mut();
        let index = collections
            .get_mut(&self.name)
            .ok_or_else(|| self.missing())?;

        let mut added = 0;
        for (((id, text), metadata), embedding) in
            ids.iter().zip(texts).zip(metadatas).zip(embeddings)
        {
            if !index.ids.insert(id.clone()) {
                tracing::warn!(collection = %self.name, %id, "id already present, skipping");
                continue;
            }
            index.entries.push(Entry {
                id: id.clone(),
                text: text.clone(),
                metadata: metadata.clone(),
                embedding,
            });
            added += 1;
        }
        Ok(added)
    }

    fn query(&self, text: &str, k: usize) -> Result<Vec<QueryMatch>> {
        if self.count()? == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let query = self.store.embedder.encode_query(text)?;

        let collections = self.store.collections.borrow();
        let index = collections.get(&self.name).ok_or_else(|| self.missing())?;

        let ranked = nearest(
            &query,
            index
                .entries
                .par_iter()
                .map(|e| (e.id.as_str(), e.embedding.as_slice())),
            k,
        );

        Ok(ranked
            .into_iter()
            .map(|(i, distance)| {
                let entry = &index.entries[i];
                QueryMatch {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                    distance,
                }
            })
            .collect())
    }

    fn count(&self) -> Result<usize> {
        self.store
            .collections
            .borrow()
            .get(&self.name)
            .map(|index| index.entries.len())
            .ok_or_else(|| self.missing())
    }
}
