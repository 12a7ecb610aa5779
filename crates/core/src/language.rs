use serde::{Deserialize, Serialize};

/// Languages the indexer understands. Extensions outside this table are
/// skipped during enumeration rather than treated as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  Rust,
  Python,
  JavaScript,
  TypeScript,
  Tsx,
  Jsx,
  Go,
  Java,
  Ruby,
  C,
  Cpp,
}

impl Language {
  pub fn from_extension(ext: &str) -> Option<Self> {
    match ext.to_lowercase().as_str() {
      "rs" => Some(Language::Rust),
      "py" | "pyi" | "pyw" => Some(Language::Python),
      "js" | "mjs" | "cjs" => Some(Language::JavaScript),
      "ts" | "mts" => Some(Language::TypeScript),
      "tsx" => Some(Language::Tsx),
      "jsx" => Some(Language::Jsx),
      "go" => Some(Language::Go),
      "java" => Some(Language::Java),
      "rb" | "rake" => Some(Language::Ruby),
      "c" => Some(Language::C),
      "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "h" => Some(Language::Cpp),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Language::Rust => "rust",
      Language::Python => "python",
      Language::JavaScript => "javascript",
      Language::TypeScript => "typescript",
      Language::Tsx => "tsx",
      Language::Jsx => "jsx",
      Language::Go => "go",
      Language::Java => "java",
      Language::Ruby => "ruby",
      Language::C => "c",
      Language::Cpp => "cpp",
    }
  }

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.to_lowercase().as_str() {
      "rust" => Some(Language::Rust),
      "python" => Some(Language::Python),
      "javascript" => Some(Language::JavaScript),
      "typescript" => Some(Language::TypeScript),
      "tsx" => Some(Language::Tsx),
      "jsx" => Some(Language::Jsx),
      "go" => Some(Language::Go),
      "java" => Some(Language::Java),
      "ruby" => Some(Language::Ruby),
      "c" => Some(Language::C),
      "cpp" => Some(Language::Cpp),
      _ => None,
    }
  }
}

impl std::fmt::Display for Language {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
