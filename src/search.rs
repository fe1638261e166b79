use serde::Serialize;

use crate::{
    error::Result,
    ingestion::DOCS_COLLECTION,
    terms::{rank_terms, select_terms},
    tokenizer::token_set,
    vector_store::{Collection, VectorStore},
};

/// One search result annotated with its most query-relevant terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// 1-based position in the result list.
    pub rank: usize,
    pub id: String,
    pub title: String,
    pub distance: f32,
    #[serde(skip)]
    pub text: String,
    pub terms: Vec<String>,
}

/// Execute the full search pipeline.
///
/// 1. Nearest-neighbour query for the `max_docs` closest documents
/// 2. Unless `num_terms` is 0, rank the vocabulary of all results once
///    against the query
/// 3. Annotate each result with the first `num_terms` ranked tokens that
///    occur in it
///
/// Results keep the backend's ascending-distance order.
pub fn search<S: VectorStore>(
    store: &S,
    query: &str,
    max_docs: usize,
    num_terms: usize,
) -> Result<Vec<SearchHit>> {
    let collection = store.get_or_create_collection(DOCS_COLLECTION)?;
    let matches = collection.query(query, max_docs)?;
    tracing::debug!(query, results = matches.len(), "document query done");

    let ranked = if num_terms == 0 || matches.is_empty() {
        Vec::new()
    } else {
        let texts: Vec<&str> = matches.iter().map(|m| m.text.as_str()).collect();
        rank_terms(store.embedder(), query, texts.as_slice())?
    };

    Ok(matches
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let terms = if ranked.is_empty() {
                Vec::new()
            } else {
                select_terms(&ranked, &token_set(&m.text), num_terms)
            };
            SearchHit {
                rank: i + 1,
                title: m.metadata.get("title").cloned().unwrap_or_default(),
                id: m.id,
                distance: m.distance,
                text: m.text,
                terms,
            }
        })
        .collect())
}

/// Format results for human-readable terminal output.
pub fn format_human(results: &[SearchHit]) -> String {
    if results.is_empty() {
        return "No results found.\n".to_string();
    }

    let mut out = String::from("Results:\n");
    for r in results {
        out.push_str(&format!(
            "{}) ID: {} Title: {} Score: {:.3}\n",
            r.rank, r.id, r.title, r.distance
        ));
        if !r.terms.is_empty() {
            out.push_str("\n Most relevant terms:\n");
            for term in &r.terms {
                out.push_str(&format!(" {term}\n"));
            }
        }
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    result_count: usize,
    results: &'a [SearchHit],
}

/// Format results as a JSON document.
pub fn format_json(results: &[SearchHit], query: &str) -> Result<String> {
    Ok(serde_json::to_string(&JsonOutput {
        query,
        result_count: results.len(),
        results,
    })?)
}
