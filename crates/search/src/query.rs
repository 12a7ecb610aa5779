//! Query preprocessing, expansion, keyword extraction, and the dynamic
//! weight classifier.

use std::collections::HashMap;

/// Code abbreviations expanded before embedding. Matching is per word
/// and case-insensitive; anything else passes through untouched.
const ABBREVIATIONS: &[(&str, &str)] = &[
  ("auth", "authentication"),
  ("cfg", "configuration"),
  ("req", "request"),
  ("res", "response"),
  ("db", "database"),
  ("repo", "repository"),
  ("env", "environment"),
  ("docs", "documentation"),
  ("err", "error"),
  ("msg", "message"),
];

/// Synonym table driving fallback query variants
const SYNONYMS: &[(&str, &[&str])] = &[
  ("error", &["exception", "failure"]),
  ("delete", &["remove"]),
  ("create", &["build", "make"]),
  ("fetch", &["get", "load"]),
  ("update", &["modify", "change"]),
  ("search", &["find", "lookup"]),
  ("parse", &["read", "decode"]),
  ("test", &["spec", "check"]),
];

/// Collapse whitespace and expand known code abbreviations
pub fn preprocess(query: &str) -> String {
  query
    .split_whitespace()
    .map(expand_word)
    .collect::<Vec<_>>()
    .join(" ")
}

fn expand_word(word: &str) -> String {
  let lower = word.to_lowercase();
  for (abbr, full) in ABBREVIATIONS {
    if lower == *abbr {
      return full.to_string();
    }
  }
  word.to_string()
}

/// Synonym-substituted variants of a query, one substitution per
/// variant, in table order. Deterministic; the original is excluded.
pub fn expand_variants(query: &str) -> Vec<String> {
  let words: Vec<&str> = query.split_whitespace().collect();
  let mut variants = Vec::new();

  for (i, word) in words.iter().enumerate() {
    let lower = word.to_lowercase();
    for (base, subs) in SYNONYMS {
      if lower == *base {
        for sub in *subs {
          let mut variant = words.clone();
          variant[i] = sub;
          variants.push(variant.join(" "));
        }
      }
    }
  }

  variants
}

/// Top query keywords by term frequency, at most 10
pub fn extract_query_keywords(query: &str) -> Vec<String> {
  let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
  let mut order = 0usize;

  for raw in query.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
    let token = raw.trim_matches('_').to_ascii_lowercase();
    if token.len() < 2 {
      continue;
    }
    let entry = counts.entry(token).or_insert((0, order));
    entry.0 += 1;
    order += 1;
  }

  let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
  ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
  ranked.into_iter().take(10).map(|(token, _)| token).collect()
}

/// Weight pair for hybrid scoring: `final = vector·vs + keyword·ks`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryWeights {
  pub vector: f32,
  pub keyword: f32,
}

const CODE_PUNCTUATION: &[char] = &['{', '}', '(', ')', '[', ']', ';', ',', '.', '<', '>'];
const CODE_OPERATORS: &[char] = &['=', '+', '-', '*', '/', '%', '&', '|', '^', '~'];

/// Pick hybrid weights from the query's shape:
/// symbol-like queries lean on the vector, long natural-language
/// queries lean more on keyword overlap.
pub fn classify_query(query: &str) -> QueryWeights {
  let looks_like_code = query.chars().any(|c| CODE_PUNCTUATION.contains(&c))
    || query.chars().any(|c| CODE_OPERATORS.contains(&c))
    || has_camel_case(query)
    || query.contains('_');

  if looks_like_code {
    return QueryWeights {
      vector: 0.8,
      keyword: 0.2,
    };
  }

  if query.split_whitespace().count() > 3 {
    QueryWeights {
      vector: 0.6,
      keyword: 0.4,
    }
  } else {
    QueryWeights {
      vector: 0.7,
      keyword: 0.3,
    }
  }
}

fn has_camel_case(query: &str) -> bool {
  let mut prev_lower = false;
  for c in query.chars() {
    if c.is_ascii_uppercase() && prev_lower {
      return true;
    }
    prev_lower = c.is_ascii_lowercase();
  }
  false
}
