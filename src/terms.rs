use std::collections::{BTreeSet, HashSet};

use crate::{
    embedding::Embedder,
    error::Result,
    record::Metadata,
    tokenizer::tokenize,
    vector_store::{Collection, MemoryStore, VectorStore},
};

const TERMS_COLLECTION: &str = "terms";

/// A vocabulary token and its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTerm {
    pub token: String,
    pub distance: f32,
}

/// The deduplicated tokens of all `documents`.
pub fn vocabulary<S: AsRef<str>>(documents: &[S]) -> BTreeSet<String> {
    documents
        .iter()
        .flat_map(|doc| tokenize(doc.as_ref()))
        .collect()
}

/// Rank every token found in `documents` by its distance to `query`.
///
/// Each distinct token is embedded as its own one-word document in a
/// throwaway in-memory collection, which is then queried with the full
/// query text. The collection is dropped before returning.
pub fn rank_terms<S: AsRef<str>>(
    embedder: &dyn Embedder,
    query: &str,
    documents: &[S],
) -> Result<Vec<RankedTerm>> {
    let terms: Vec<String> = vocabulary(documents).into_iter().collect();
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let index = MemoryStore::new(embedder);
    let mut collection = index.get_or_create_collection(TERMS_COLLECTION)?;
    let metadatas = vec![Metadata::new(); terms.len()];
    collection.add(&terms, &terms, &metadatas)?;

    let ranked = collection
        .query(query, terms.len())?
        .into_iter()
        .map(|m| RankedTerm {
            token: m.id,
            distance: m.distance,
        })
        .collect::<Vec<_>>();

    tracing::debug!(vocabulary = terms.len(), "ranked terms");
    Ok(ranked)
}

/// Walk `ranked` in order and keep the first `num_terms` tokens that occur
/// in `doc_tokens`.
pub fn select_terms(
    ranked: &[RankedTerm],
    doc_tokens: &HashSet<String>,
    num_terms: usize,
) -> Vec<String> {
    ranked
        .iter()
        .filter(|term| doc_tokens.contains(&term.token))
        .take(num_terms)
        .map(|term| term.token.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{embedding::HashingEmbedder, tokenizer::token_set};

    fn tokens(ranked: &[RankedTerm]) -> Vec<&str> {
        ranked.iter().map(|t| t.token.as_str()).collect()
    }

    fn position(ranked: &[RankedTerm], token: &str) -> usize {
        ranked.iter().position(|t| t.token == token).unwrap()
    }

    #[test]
    fn vocabulary_is_a_set() {
        let vocab = vocabulary(&["Graph theory and algorithms", "graph, Cooking!"]);
        let expected: BTreeSet<String> = ["algorithms", "and", "cooking", "graph", "theory"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(vocab, expected);
    }

    #[test]
    fn query_terms_rank_first() {
        let embedder = HashingEmbedder::default();
        let docs = ["graph theory and algorithms", "cooking recipes"];

        let ranked = rank_terms(&embedder, "graph algorithms", &docs).unwrap();

        assert_eq!(ranked.len(), 6);
        let mut sorted = tokens(&ranked);
        sorted.sort_unstable();
        assert_eq!(
            sorted,
            vec!["algorithms", "and", "cooking", "graph", "recipes", "theory"]
        );

        for hit in ["graph", "algorithms"] {
            for miss in ["cooking", "recipes"] {
                assert!(position(&ranked, hit) < position(&ranked, miss));
            }
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn empty_documents_rank_nothing() {
        let embedder = HashingEmbedder::default();
        let docs: [&str; 0] = [];
        assert!(rank_terms(&embedder, "query", &docs).unwrap().is_empty());
        assert!(rank_terms(&embedder, "query", &["", "?!"]).unwrap().is_empty());
    }

    #[test]
    fn repeated_calls_do_not_share_state() {
        let embedder = HashingEmbedder::default();
        let first = rank_terms(&embedder, "graph", &["graph paper"]).unwrap();
        let second = rank_terms(&embedder, "graph", &["cooking"]).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(tokens(&second), vec!["cooking"]);
    }

    #[test]
    fn select_terms_keeps_global_order_and_membership() {
        let ranked: Vec<RankedTerm> = ["graph", "algorithms", "theory", "cooking", "and"]
            .iter()
            .enumerate()
            .map(|(i, t)| RankedTerm {
                token: t.to_string(),
                distance: i as f32,
            })
            .collect();

        let d1 = token_set("graph theory and algorithms");
        assert_eq!(
            select_terms(&ranked, &d1, 3),
            vec!["graph", "algorithms", "theory"]
        );
        assert_eq!(select_terms(&ranked, &d1, 10).len(), 4);

        let d2 = token_set("cooking recipes");
        assert_eq!(select_terms(&ranked, &d2, 5), vec!["cooking"]);
        assert!(select_terms(&ranked, &d2, 0).is_empty());
    }
}
