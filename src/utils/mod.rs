//! Utility functions shared by the query engine.
//!
//! - [`tokenizer`] - Query-side lexical normalization ([`Analyzer`])
//! - [`progress`] - Progress bar that compiles to a no-op without the `progress` feature

pub mod progress;
pub mod tokenizer;

pub use tokenizer::*;
