use std::collections::HashSet;

/// Split text into comparable tokens.
///
/// ASCII punctuation is removed outright (so `"don't"` becomes `"dont"`),
/// the remainder is lower-cased and split on whitespace.
///
/// # Examples
///
/// ```
/// use vecsearch::tokenizer::tokenize;
///
/// assert_eq!(tokenize("Graph-Theory, 2nd ed."), vec!["graphtheory", "2nd", "ed"]);
/// assert!(tokenize("").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let stripped: String = text
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();

    stripped
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// The distinct tokens of `text`, for membership tests.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}
