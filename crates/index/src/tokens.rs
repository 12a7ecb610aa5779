//! Approximate, language-neutral token counting and keyword extraction.
//!
//! The counter is pure and deterministic: identical input always gives
//! the identical count, and concatenation is monotone up to a small
//! additive error at the seam.

use std::collections::HashMap;

const PUNCTUATION: &[char] = &['{', '}', '(', ')', '[', ']', ';', ',', '.', ':', '<', '>'];
const OPERATORS: &[char] = &['=', '+', '-', '*', '/', '%', '&', '|', '^', '~', '!'];

/// tokens ≈ whitespace-split words + punctuation + ⌊operators / 2⌋
pub fn count_tokens(text: &str) -> u32 {
  let words = text.split_whitespace().count();
  let mut punctuation = 0usize;
  let mut operators = 0usize;

  for c in text.chars() {
    if PUNCTUATION.contains(&c) {
      punctuation += 1;
    } else if OPERATORS.contains(&c) {
      operators += 1;
    }
  }

  (words + punctuation + operators / 2) as u32
}

const MAX_KEYWORDS: usize = 10;

const STOPWORDS: &[&str] = &[
  "the", "and", "for", "let", "var", "const", "pub", "use", "mod", "impl", "return", "function", "def", "self",
  "this", "new", "mut", "async", "await", "import", "from", "export", "class", "struct", "enum", "trait", "type",
  "interface", "void", "true", "false", "none", "null", "end",
];

/// Top identifier tokens of a chunk by frequency, at most 10, lowercase,
/// ties broken by first appearance so the result is deterministic.
pub fn extract_keywords(content: &str) -> Vec<String> {
  let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
  let mut order = 0usize;

  for raw in content.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
    let token = raw.trim_matches('_').to_ascii_lowercase();
    if token.len() < 3 || token.chars().all(|c| c.is_ascii_digit()) || STOPWORDS.contains(&token.as_str()) {
      continue;
    }
    let entry = counts.entry(token).or_insert((0, order));
    entry.0 += 1;
    order += 1;
  }

  let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
  ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
  ranked.into_iter().take(MAX_KEYWORDS).map(|(token, _)| token).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_counter_deterministic() {
    let text = "fn add(a: i32, b: i32) -> i32 { a + b }";
    assert_eq!(count_tokens(text), count_tokens(text));
    assert!(count_tokens(text) > 0);
  }

  #[test]
  fn test_counter_components() {
    // 2 words, no punctuation, no operators
    assert_eq!(count_tokens("hello world"), 2);
    // 1 word + 2 punctuation
    assert_eq!(count_tokens("call();"), 1 + 3);
    // operators count at half weight
    assert_eq!(count_tokens("a = b + c"), 5 + 1);
  }

  #[test]
  fn test_counter_monotone_under_concatenation() {
    let a = "fn one() { 1 }";
    let b = "fn two() { 2 }";
    let joined = format!("{}\n{}", a, b);
    let sum = count_tokens(a) + count_tokens(b);
    let whole = count_tokens(&joined);
    // Joining may merge words at the seam; never grows past the sum.
    assert!(whole <= sum);
    assert!(whole + 2 >= sum);
  }

  #[test]
  fn test_empty() {
    assert_eq!(count_tokens(""), 0);
    assert!(extract_keywords("").is_empty());
  }

  #[test]
  fn test_keywords_ranked_by_frequency() {
    let content = "fn handle_login(user: User) { authenticate(user); authenticate(user) }";
    let keywords = extract_keywords(content);
    assert_eq!(keywords[0], "user");
    assert!(keywords.contains(&"authenticate".to_string()));
    assert!(keywords.contains(&"handle_login".to_string()));
  }

  #[test]
  fn test_keywords_capped_at_ten() {
    let content = (0..30).map(|i| format!("identifier{} ", i)).collect::<String>();
    assert_eq!(extract_keywords(&content).len(), 10);
  }

  #[test]
  fn test_keywords_skip_stopwords_and_short() {
    let keywords = extract_keywords("let x = compute_total(self)");
    assert!(!keywords.contains(&"let".to_string()));
    assert!(!keywords.contains(&"x".to_string()));
    assert!(!keywords.contains(&"self".to_string()));
    assert!(keywords.contains(&"compute_total".to_string()));
  }
}
