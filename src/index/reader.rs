use crate::error::{Error, Result};
use crate::index::types::*;
use crate::utils::Analyzer;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// File name looked up when an index directory is opened
pub const INDEX_FILE: &str = "index.json";

/// Read-only access to field lengths, term statistics, postings and doc ids.
///
/// Query evaluation only ever reads through this trait. Implementations must
/// tolerate concurrent reads: independent queries are evaluated in parallel.
pub trait IndexAccess: Send + Sync {
    /// Number of tokens in `field` of `doc`
    fn field_length(&self, field: Field, doc: DocId) -> Result<u32>;
    /// Total number of tokens in `field` over the collection
    fn sum_of_field_lengths(&self, field: Field) -> Result<u64>;
    /// Number of documents that have a non-empty `field`
    fn doc_count(&self, field: Field) -> Result<u32>;
    /// Number of documents in the collection
    fn num_docs(&self) -> Result<u32>;
    /// Inverted list of `term` in `field`; empty for unknown terms
    fn inverted_list(&self, term: &str, field: Field) -> Result<InvertedList>;
    fn term_vector(&self, doc: DocId, field: Field) -> Result<TermVector>;
    fn external_doc_id(&self, doc: DocId) -> Result<String>;
    fn internal_doc_id(&self, external: &str) -> Result<DocId>;
}

/// A document whose fields are already analyzed into tokens
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    #[serde(default)]
    pub fields: FxHashMap<Field, Vec<String>>,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: FxHashMap::default(),
        }
    }

    pub fn with_field<I, S>(mut self, field: Field, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(field, tokens.into_iter().map(Into::into).collect());
        self
    }
}

/// On-disk layout of an index file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IndexFile {
    /// Stopwords removed when the documents were analyzed
    #[serde(default)]
    pub stopwords: Vec<String>,
    pub documents: Vec<StoredDocument>,
}

#[derive(Debug, Default)]
struct FieldStats {
    sum_lengths: u64,
    doc_count: u32,
}

/// In-memory index over pre-analyzed documents
pub struct IndexReader {
    documents: Vec<StoredDocument>,
    postings: FxHashMap<(Field, String), InvertedList>,
    field_stats: FxHashMap<Field, FieldStats>,
    external_ids: FxHashMap<String, DocId>,
    stopwords: Vec<String>,
}

impl IndexReader {
    /// Open an index file, or the `index.json` inside a directory
    pub fn open(path: &Path) -> Result<Self> {
        let file_path = if path.is_dir() {
            path.join(INDEX_FILE)
        } else {
            path.to_path_buf()
        };

        let file = File::open(&file_path).map_err(|e| {
            Error::index(format!("cannot open index {}: {}", file_path.display(), e))
        })?;
        let index: IndexFile = serde_json::from_reader(BufReader::new(file))?;

        tracing::debug!(
            path = %file_path.display(),
            documents = index.documents.len(),
            "index loaded"
        );

        Ok(Self::from_documents(index.documents, index.stopwords))
    }

    /// Build the in-memory structures from documents in internal id order
    pub fn from_documents(documents: Vec<StoredDocument>, stopwords: Vec<String>) -> Self {
        let mut postings: FxHashMap<(Field, String), InvertedList> = FxHashMap::default();
        let mut field_stats: FxHashMap<Field, FieldStats> = FxHashMap::default();
        let mut external_ids = FxHashMap::default();

        for (doc_id, doc) in documents.iter().enumerate() {
            let doc_id = doc_id as DocId;
            external_ids.insert(doc.id.clone(), doc_id);

            for (&field, tokens) in &doc.fields {
                if tokens.is_empty() {
                    continue;
                }
                let stats = field_stats.entry(field).or_default();
                stats.sum_lengths += tokens.len() as u64;
                stats.doc_count += 1;

                // Group positions per term, keeping first-occurrence order
                let mut order: Vec<&str> = Vec::new();
                let mut positions: FxHashMap<&str, Vec<Position>> = FxHashMap::default();
                for (pos, token) in tokens.iter().enumerate() {
                    positions
                        .entry(token.as_str())
                        .or_insert_with(|| {
                            order.push(token.as_str());
                            Vec::new()
                        })
                        .push(pos as Position);
                }

                for term in order {
                    let term_positions = positions.remove(term).unwrap_or_default();
                    postings
                        .entry((field, term.to_string()))
                        .or_insert_with(|| InvertedList::new(field))
                        .append_posting(doc_id, term_positions);
                }
            }
        }

        Self {
            documents,
            postings,
            field_stats,
            external_ids,
            stopwords,
        }
    }

    /// Analyzer matching the normalization applied to the stored documents
    pub fn analyzer(&self) -> Analyzer {
        Analyzer::new(self.stopwords.iter().cloned())
    }

    /// Number of distinct terms indexed in a field
    pub fn vocabulary_size(&self, field: Field) -> usize {
        self.postings.keys().filter(|(f, _)| *f == field).count()
    }

    fn document(&self, doc: DocId) -> Result<&StoredDocument> {
        self.documents
            .get(doc as usize)
            .ok_or_else(|| Error::index(format!("document {} is out of range", doc)))
    }

    fn tokens(&self, doc: DocId, field: Field) -> Result<&[String]> {
        Ok(self
            .document(doc)?
            .fields
            .get(&field)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }
}

impl IndexAccess for IndexReader {
    fn field_length(&self, field: Field, doc: DocId) -> Result<u32> {
        Ok(self.tokens(doc, field)?.len() as u32)
    }

    fn sum_of_field_lengths(&self, field: Field) -> Result<u64> {
        Ok(self.field_stats.get(&field).map_or(0, |s| s.sum_lengths))
    }

    fn doc_count(&self, field: Field) -> Result<u32> {
        Ok(self.field_stats.get(&field).map_or(0, |s| s.doc_count))
    }

    fn num_docs(&self) -> Result<u32> {
        Ok(self.documents.len() as u32)
    }

    fn inverted_list(&self, term: &str, field: Field) -> Result<InvertedList> {
        Ok(self
            .postings
            .get(&(field, term.to_string()))
            .cloned()
            .unwrap_or_else(|| InvertedList::new(field)))
    }

    fn term_vector(&self, doc: DocId, field: Field) -> Result<TermVector> {
        let tokens = self.tokens(doc, field)?;
        let mut entries: Vec<TermVectorEntry> = Vec::new();
        let mut slots: FxHashMap<&str, usize> = FxHashMap::default();

        for token in tokens {
            match slots.get(token.as_str()) {
                Some(&i) => entries[i].tf += 1,
                None => {
                    let ctf = self
                        .postings
                        .get(&(field, token.clone()))
                        .map_or(0, |l| l.ctf);
                    slots.insert(token.as_str(), entries.len());
                    entries.push(TermVectorEntry {
                        stem: token.clone(),
                        tf: 1,
                        ctf,
                    });
                }
            }
        }

        Ok(TermVector {
            doc_id: doc,
            field,
            length: tokens.len() as u32,
            entries,
        })
    }

    fn external_doc_id(&self, doc: DocId) -> Result<String> {
        Ok(self.document(doc)?.id.clone())
    }

    fn internal_doc_id(&self, external: &str) -> Result<DocId> {
        self.external_ids
            .get(external)
            .copied()
            .ok_or_else(|| Error::index(format!("unknown external document id '{}'", external)))
    }
}
