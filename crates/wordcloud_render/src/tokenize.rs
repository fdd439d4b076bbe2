//! Text → weighted vocabulary.
//!
//! Processing order: extract word tokens (letters, digits, embedded
//! apostrophes), strip trailing `'s`, drop pure-digit tokens, drop tokens
//! shorter than [`MIN_TOKEN_CHARS`], drop stopwords, then count.

use std::collections::HashMap;

/// Tokens shorter than this never make it into the vocabulary.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Common English words excluded from the vocabulary. Contractions ending in
/// `'s` are absent on purpose: the possessive strip reduces them to their
/// base form before this list is consulted.
pub const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any", "are",
    "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "can't", "cannot", "com", "could", "couldn't", "did", "didn't", "do",
    "does", "doesn't", "doing", "don't", "down", "during", "each", "else", "ever", "few", "for",
    "from", "further", "get", "had", "hadn't", "has", "hasn't", "have", "haven't", "having", "he",
    "hence", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however", "http",
    "i'd", "i'll", "i'm", "i've", "if", "in", "into", "is", "isn't", "it", "its", "itself",
    "just", "like", "me", "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "of",
    "off", "on", "once", "only", "or", "other", "otherwise", "ought", "our", "ours", "ourselves",
    "out", "over", "own", "same", "shall", "shan't", "she", "should", "shouldn't", "since", "so",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "they'd", "they'll", "they're", "they've", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "wasn't", "we", "we'd",
    "we'll", "we're", "we've", "were", "weren't", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "won't", "would", "wouldn't", "you", "you'd", "you'll",
    "you're", "you've", "your", "yours", "yourself", "yourselves",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s").unwrap_or(word)
}

fn is_pure_digits(word: &str) -> bool {
    word.chars().all(|c| c.is_ascii_digit())
}

/// Lowercased word tokens in text order, after all filters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in lowered.chars() {
        if c.is_alphanumeric() || (c == '\'' && !current.is_empty()) {
            current.push(c);
        } else if !current.is_empty() {
            push_token(&mut tokens, &current);
            current.clear();
        }
    }
    if !current.is_empty() {
        push_token(&mut tokens, &current);
    }

    tokens
}

fn push_token(tokens: &mut Vec<String>, raw: &str) {
    let token = strip_possessive(raw.trim_matches('\''));
    if is_pure_digits(token) {
        return;
    }
    if token.chars().count() < MIN_TOKEN_CHARS {
        return;
    }
    if is_stopword(token) {
        return;
    }
    tokens.push(token.to_string());
}

/// Count tokens and keep the `max_words` heaviest, ordered by descending
/// count with alphabetical tie-breaks.
pub fn term_frequencies(text: &str, max_words: usize) -> Vec<(String, u32)> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut frequencies: Vec<(String, u32)> = counts.into_iter().collect();
    frequencies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    frequencies.truncate(max_words);
    frequencies
}
