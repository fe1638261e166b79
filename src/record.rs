use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Number of documents committed per bulk `add`.
pub const BATCH_SIZE: usize = 20;

/// Per-document metadata stored next to the text.
pub type Metadata = BTreeMap<String, String>;

/// One line of the JSON-lines source.
///
/// Fields are optional at parse time; projection into a [`Document`]
/// decides which ones are required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Record {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
}

impl Record {
    /// Parse a single source line. `line` is 1-based and only used for errors.
    pub fn parse(raw: &str, line: usize) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|source| Error::MalformedInput { line, source })
    }
}

/// A record as stored in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    /// Project a record: `text` is `title + " " + abstract`, and the title is
    /// kept as metadata for display.
    pub fn from_record(record: Record, line: usize) -> Result<Self> {
        let id = record
            .id
            .ok_or(Error::MissingField { line, field: "id" })?;
        let title = record
            .title
            .ok_or(Error::MissingField { line, field: "title" })?;
        let abstract_text = record.abstract_text.ok_or(Error::MissingField {
            line,
            field: "abstract",
        })?;

        let text = format!("{title} {abstract_text}");
        let metadata = Metadata::from([("title".to_string(), title)]);

        Ok(Self { id, text, metadata })
    }
}

/// Documents waiting for a single bulk add, split into the parallel
/// columns the backend expects.
#[derive(Debug, Default)]
pub struct Batch {
    ids: Vec<String>,
    texts: Vec<String>,
    metadatas: Vec<Metadata>,
}

/// The drained contents of a [`Batch`].
#[derive(Debug, Default)]
pub struct BatchColumns {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl Batch {
    pub fn new() -> Self {
        Self {
            ids: Vec::with_capacity(BATCH_SIZE),
            texts: Vec::with_capacity(BATCH_SIZE),
            metadatas: Vec::with_capacity(BATCH_SIZE),
        }
    }

    pub fn push(&mut self, doc: Document) {
        self.ids.push(doc.id);
        self.texts.push(doc.text);
        self.metadatas.push(doc.metadata);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= BATCH_SIZE
    }

    /// Empty the batch, returning what it held.
    pub fn take(&mut self) -> BatchColumns {
        BatchColumns {
            ids: std::mem::take(&mut self.ids),
            texts: std::mem::take(&mut self.texts),
            metadatas: std::mem::take(&mut self.metadatas),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_project() {
        let record = Record::parse(
            r#"{"id": "2101.00001", "title": "Graph Theory", "abstract": "On paths.", "authors": "A. B."}"#,
            1,
        )
        .unwrap();
        let doc = Document::from_record(record, 1).unwrap();

        assert_eq!(doc.id, "2101.00001");
        assert_eq!(doc.text, "Graph Theory On paths.");
        assert_eq!(doc.metadata.get("title").unwrap(), "Graph Theory");
    }

    #[test]
    fn malformed_json_reports_line() {
        let err = Record::parse("{not json", 7).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { line: 7, .. }));
    }

    #[test]
    fn missing_fields_parse_but_fail_projection() {
        let record = Record::parse(r#"{"id": "x", "title": "T"}"#, 3).unwrap();
        assert!(record.abstract_text.is_none());

        let err = Document::from_record(record, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                line: 3,
                field: "abstract"
            }
        ));
    }

    #[test]
    fn null_title_is_missing() {
        let record =
            Record::parse(r#"{"id": "x", "title": null, "abstract": "a"}"#, 1)
                .unwrap();
        let err = Document::from_record(record, 1).unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "title", .. }));
    }

    #[test]
    fn batch_fills_and_drains() {
        let mut batch = Batch::new();
        for i in 0..BATCH_SIZE {
            assert!(!batch.is_full());
            batch.push(Document {
                id: i.to_string(),
                text: format!("doc {i}"),
                metadata: Metadata::new(),
            });
        }
        assert!(batch.is_full());
        assert_eq!(batch.len(), BATCH_SIZE);

        let columns = batch.take();
        assert_eq!(columns.ids.len(), BATCH_SIZE);
        assert_eq!(columns.texts[3], "doc 3");
        assert!(batch.is_empty());
    }
}
