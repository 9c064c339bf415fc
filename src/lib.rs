//! # qeval - structured query evaluation
//!
//! qeval evaluates structured queries over an inverted index
//! document-at-a-time, under unranked and ranked Boolean, BM25 and Indri
//! retrieval models, with optional pseudo-relevance feedback.
//!
//! ## Architecture
//!
//! - [`index`] - Index access layer and an in-memory reference index
//! - [`query`] - Parsing, optimization, operator trees, scoring and feedback
//! - [`batch`] - Query-file driver writing TREC ranking files
//! - [`config`] - Parameter file loading
//! - [`output`] - TREC rows and console printing
//! - [`utils`] - Query analyzer and progress reporting
//!
//! ## Quick Start
//!
//! ```ignore
//! use qeval::index::IndexReader;
//! use qeval::query::{IndriParams, QueryExecutor, RetrievalModel};
//! use std::path::Path;
//!
//! let index = IndexReader::open(Path::new("/path/to/index.json"))?;
//! let analyzer = index.analyzer();
//! let model = RetrievalModel::Indri(IndriParams::default());
//!
//! let executor = QueryExecutor::new(&index, &model, &analyzer);
//! let results = executor.execute("#wand(0.7 apple 0.3 #near/1(pie recipe))")?;
//!
//! for doc in results.iter().take(10) {
//!     println!("{} {}", index.external_doc_id(doc.doc_id)?, doc.score);
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod index;
pub mod output;
pub mod query;
pub mod utils;

pub use error::{Error, ParseError, Result};
