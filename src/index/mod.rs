pub mod reader;
pub mod stats;
pub mod types;

pub use reader::{IndexAccess, IndexFile, IndexReader, StoredDocument};
pub use types::*;
