use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    error::Result,
    record::{Batch, Document, Record},
    vector_store::{Collection, VectorStore},
};

/// Name of the collection that holds indexed documents.
pub const DOCS_COLLECTION: &str = "docs";

/// What an ingestion run committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Documents the backend actually stored.
    pub documents: usize,
    /// Bulk `add` calls issued.
    pub batches: usize,
    /// Source lines consumed.
    pub lines: usize,
}

/// Rebuild the docs collection from a JSON-lines file.
pub fn ingest_file<S: VectorStore>(
    path: &Path,
    store: &S,
    max_docs: usize,
) -> Result<IngestSummary> {
    let reader = BufReader::new(File::open(path)?);
    ingest(reader, store, max_docs)
}

/// Rebuild the docs collection from JSON-lines `source`.
///
/// See [`ingest_with_progress`].
pub fn ingest<R: BufRead, S: VectorStore>(
    source: R,
    store: &S,
    max_docs: usize,
) -> Result<IngestSummary> {
    ingest_with_progress(source, store, max_docs, |_| {})
}

/// Rebuild the docs collection, calling `on_batch` with the size of every
/// committed batch.
///
/// If the collection already exists the whole store is reset first, so the
/// result never mixes documents from two builds. Lines are read until one
/// past `max_docs` has been consumed (line indices `0..=max_docs + 1`).
/// Documents are committed in batches of [`crate::record::BATCH_SIZE`],
/// with a final partial batch at the end.
///
/// A malformed line aborts the run; batches committed before it stay.
pub fn ingest_with_progress<R, S, F>(
    source: R,
    store: &S,
    max_docs: usize,
    mut on_batch: F,
) -> Result<IngestSummary>
where
    R: BufRead,
    S: VectorStore,
    F: FnMut(usize),
{
    if store
        .list_collections()?
        .iter()
        .any(|name| name == DOCS_COLLECTION)
    {
        tracing::info!(collection = DOCS_COLLECTION, "collection exists, resetting store");
        store.reset()?;
    }
    let mut collection = store.get_or_create_collection(DOCS_COLLECTION)?;

    let mut summary = IngestSummary::default();
    let mut batch = Batch::new();

    let mut flush = |batch: &mut Batch, summary: &mut IngestSummary| -> Result<()> {
        let columns = batch.take();
        let size = columns.ids.len();
        let added = collection.add(&columns.ids, &columns.texts, &columns.metadatas)?;
        summary.documents += added;
        summary.batches += 1;
        tracing::debug!(
            collection = collection.name(),
            batch = summary.batches,
            size,
            added,
            "committed batch"
        );
        on_batch(size);
        Ok(())
    };

    for (i, line) in source.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        summary.lines = line_no;

        let record = Record::parse(&line, line_no)?;
        batch.push(Document::from_record(record, line_no)?);

        if batch.is_full() {
            flush(&mut batch, &mut summary)?;
        }
        if i > max_docs {
            break;
        }
    }

    if !batch.is_empty() {
        flush(&mut batch, &mut summary)?;
    }

    tracing::info!(
        documents = summary.documents,
        batches = summary.batches,
        lines = summary.lines,
        "ingestion complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        embedding::{Embedder, HashingEmbedder},
        error::Error,
        record::BATCH_SIZE,
        vector_store::MemoryStore,
    };

    /// Records the size of every `encode_documents` call, which the stores
    /// make exactly once per non-empty `add`.
    struct RecordingEmbedder {
        inner: HashingEmbedder,
        calls: RefCell<Vec<usize>>,
    }

    impl RecordingEmbedder {
        fn new() -> Self {
            Self {
                inner: HashingEmbedder::new(64),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Embedder for RecordingEmbedder {
        fn id(&self) -> String {
            self.inner.id()
        }

        fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.borrow_mut().push(texts.len());
            self.inner.encode_documents(texts)
        }

        fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
            self.inner.encode_query(query)
        }
    }

    fn jsonl(n: usize) -> String {
        (0..n)
            .map(|i| {
                format!(
                    r#"{{"id": "doc-{i}", "title": "Title {i}", "abstract": "Abstract number {i}."}}"#
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn doc_count<S: VectorStore>(store: &S) -> usize {
        store
            .get_or_create_collection(DOCS_COLLECTION)
            .unwrap()
            .count()
            .unwrap()
    }

    #[test]
    fn batches_are_full_then_partial() {
        let embedder = RecordingEmbedder::new();
        let store = MemoryStore::new(&embedder);

        let summary = ingest(jsonl(45).as_bytes(), &store, 1000).unwrap();

        assert_eq!(summary.documents, 45);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.lines, 45);
        assert_eq!(*embedder.calls.borrow(), vec![20, 20, 5]);
        assert_eq!(doc_count(&store), 45);
    }

    #[test]
    fn exact_multiple_has_no_empty_flush() {
        let embedder = RecordingEmbedder::new();
        let store = MemoryStore::new(&embedder);

        let summary = ingest(jsonl(40).as_bytes(), &store, 1000).unwrap();

        assert_eq!(summary.batches, 2);
        assert_eq!(*embedder.calls.borrow(), vec![BATCH_SIZE, BATCH_SIZE]);
    }

    #[test]
    fn cutoff_consumes_max_docs_plus_two() {
        for max_docs in [0, 3, 18, 19, 25] {
            let embedder = RecordingEmbedder::new();
            let store = MemoryStore::new(&embedder);

            let summary = ingest(jsonl(100).as_bytes(), &store, max_docs).unwrap();

            let consumed = max_docs + 2;
            assert_eq!(summary.documents, consumed, "max_docs = {max_docs}");
            assert_eq!(summary.lines, consumed);
            assert_eq!(summary.batches, consumed.div_ceil(BATCH_SIZE));

            let calls = embedder.calls.borrow();
            let last = *calls.last().unwrap();
            let expected_last = match consumed % BATCH_SIZE {
                0 => BATCH_SIZE,
                rem => rem,
            };
            assert_eq!(last, expected_last, "max_docs = {max_docs}");
        }
    }

    #[test]
    fn short_input_is_fully_consumed() {
        let embedder = RecordingEmbedder::new();
        let store = MemoryStore::new(&embedder);

        let summary = ingest(jsonl(3).as_bytes(), &store, 10).unwrap();
        assert_eq!(summary.documents, 3);
        assert_eq!(summary.batches, 1);
    }

    #[test]
    fn empty_input_creates_empty_collection() {
        let embedder = RecordingEmbedder::new();
        let store = MemoryStore::new(&embedder);

        let summary = ingest("".as_bytes(), &store, 10).unwrap();
        assert_eq!(summary, IngestSummary::default());
        assert!(embedder.calls.borrow().is_empty());
        assert_eq!(store.list_collections().unwrap(), vec![DOCS_COLLECTION]);
    }

    #[test]
    fn reingest_replaces_previous_build() {
        let embedder = HashingEmbedder::default();
        let store = MemoryStore::new(&embedder);
        store.get_or_create_collection("scratch").unwrap();

        ingest(jsonl(30).as_bytes(), &store, 1000).unwrap();
        let second = r#"{"id": "new-1", "title": "Fresh", "abstract": "Only this one."}"#;
        ingest(second.as_bytes(), &store, 1000).unwrap();

        // Reset drops every collection, not just docs.
        assert_eq!(store.list_collections().unwrap(), vec![DOCS_COLLECTION]);
        let docs = store.get_or_create_collection(DOCS_COLLECTION).unwrap();
        assert_eq!(docs.count().unwrap(), 1);
        let hits = docs.query("fresh", 10).unwrap();
        assert_eq!(hits[0].id, "new-1");
    }

    #[test]
    fn malformed_line_aborts_and_keeps_committed_batches() {
        let embedder = RecordingEmbedder::new();
        let store = MemoryStore::new(&embedder);

        let mut input = jsonl(25);
        input.push_str("\n{\"id\": broken\n");
        input.push_str(&jsonl(5));

        let err = ingest(input.as_bytes(), &store, 1000).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { line: 26, .. }));
        assert_eq!(doc_count(&store), 20);
    }

    #[test]
    fn repeated_id_across_batches_is_not_counted() {
        let embedder = HashingEmbedder::default();
        let store = MemoryStore::new(&embedder);

        let mut input = jsonl(20);
        input.push_str("\n{\"id\": \"doc-0\", \"title\": \"Again\", \"abstract\": \"Repeat.\"}");

        let summary = ingest(input.as_bytes(), &store, 1000).unwrap();

        assert_eq!(summary.lines, 21);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.documents, 20);
        assert_eq!(doc_count(&store), 20);
    }

    #[test]
    fn missing_abstract_is_fatal() {
        let embedder = HashingEmbedder::default();
        let store = MemoryStore::new(&embedder);

        let input = "{\"id\": \"a\", \"title\": \"t\", \"abstract\": \"x\"}\n{\"id\": \"b\", \"title\": \"t\"}";
        let err = ingest(input.as_bytes(), &store, 10).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                line: 2,
                field: "abstract"
            }
        ));
    }

    #[test]
    fn progress_callback_sees_each_batch() {
        let embedder = HashingEmbedder::new(32);
        let store = MemoryStore::new(&embedder);
        let mut seen = Vec::new();

        ingest_with_progress(jsonl(21).as_bytes(), &store, 1000, |n| seen.push(n))
            .unwrap();
        assert_eq!(seen, vec![20, 1]);
    }

    #[test]
    fn ingest_file_reads_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.jsonl");
        std::fs::write(&path, jsonl(7)).unwrap();

        let embedder = HashingEmbedder::default();
        let store = MemoryStore::new(&embedder);
        let summary = ingest_file(&path, &store, 100).unwrap();
        assert_eq!(summary.documents, 7);

        let err = ingest_file(&tmp.path().join("missing.jsonl"), &store, 100)
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
