use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal identifier for a document in the index (0-based load order)
pub type DocId = u32;

/// Token offset within a field
pub type Position = u32;

/// Document fields that queries may address with a `.field` suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    #[default]
    Body,
    Title,
    Url,
    Keywords,
    Inlink,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Body,
        Field::Title,
        Field::Url,
        Field::Keywords,
        Field::Inlink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Body => "body",
            Field::Title => "title",
            Field::Url => "url",
            Field::Keywords => "keywords",
            Field::Inlink => "inlink",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "body" => Ok(Field::Body),
            "title" => Ok(Field::Title),
            "url" => Ok(Field::Url),
            "keywords" => Ok(Field::Keywords),
            "inlink" => Ok(Field::Inlink),
            _ => Err(()),
        }
    }
}

/// Posting entry - one document's occurrences of a term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
    /// Ascending token offsets in the field
    pub positions: Vec<Position>,
}

impl Posting {
    pub fn new(doc_id: DocId, positions: Vec<Position>) -> Self {
        Self {
            doc_id,
            tf: positions.len() as u32,
            positions,
        }
    }
}

/// Inverted list for one term (or one proximity/synonym result) in one field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvertedList {
    pub field: Field,
    /// Collection term frequency
    pub ctf: u64,
    /// Document frequency
    pub df: u32,
    /// Ordered by ascending doc id
    pub postings: Vec<Posting>,
}

impl InvertedList {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            ..Default::default()
        }
    }

    /// Append a posting for a document beyond every document already present.
    pub fn append_posting(&mut self, doc_id: DocId, positions: Vec<Position>) {
        debug_assert!(self.postings.last().is_none_or(|p| p.doc_id < doc_id));
        self.df += 1;
        self.ctf += positions.len() as u64;
        self.postings.push(Posting::new(doc_id, positions));
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// Per-term statistics of one document field
#[derive(Debug, Clone, PartialEq)]
pub struct TermVectorEntry {
    pub stem: String,
    /// Occurrences in this document
    pub tf: u32,
    /// Occurrences in the whole collection
    pub ctf: u64,
}

/// Term vector of one document field, stems in order of first occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct TermVector {
    pub doc_id: DocId,
    pub field: Field,
    /// Number of tokens in the field
    pub length: u32,
    pub entries: Vec<TermVectorEntry>,
}

impl TermVector {
    pub fn stem_freq(&self, stem: &str) -> u32 {
        self.entries
            .iter()
            .find(|e| e.stem == stem)
            .map(|e| e.tf)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_str() {
        assert_eq!("title".parse::<Field>(), Ok(Field::Title));
        assert_eq!("INLINK".parse::<Field>(), Ok(Field::Inlink));
        assert!("anchor".parse::<Field>().is_err());
    }

    #[test]
    fn test_append_posting_updates_statistics() {
        let mut list = InvertedList::new(Field::Body);
        list.append_posting(1, vec![0, 4]);
        list.append_posting(3, vec![2]);
        assert_eq!(list.df, 2);
        assert_eq!(list.ctf, 3);
        assert_eq!(list.postings[0].tf, 2);
    }
}
