//! Tree-sitter based code parsing for Semantica.
//!
//! Exposes one capability: `parse(source, language) -> CodeNode`, a
//! tree of definition nodes (functions, methods, classes, modules,
//! interfaces, type aliases) the chunker consumes. The chunker never
//! sees tree-sitter types.

mod languages;
mod parser;

pub use parser::{CodeParser, ParseError};

// Re-export for convenience
pub use semantica_core::{ChunkType, CodeNode, Language};
