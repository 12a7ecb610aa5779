/// USD per million tokens for known remote embedding models. Unknown
/// models fall back to a conservative default so cost estimates stay
/// non-zero rather than silently optimistic.
const PRICES: &[(&str, f64)] = &[
  ("text-embedding-3-small", 0.02),
  ("text-embedding-3-large", 0.13),
  ("text-embedding-ada-002", 0.10),
  ("voyage-code-2", 0.12),
  ("voyage-2", 0.10),
];

const DEFAULT_PRICE: f64 = 0.10;

pub fn price_per_million_tokens(model: &str) -> f64 {
  PRICES
    .iter()
    .find(|(name, _)| *name == model)
    .map(|(_, price)| *price)
    .unwrap_or(DEFAULT_PRICE)
}
