use crate::index::DocId;
use std::cmp::Ordering;

/// One scored document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

/// Documents and scores produced by one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreList {
    entries: Vec<ScoredDoc>,
}

impl ScoreList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, doc_id: DocId, score: f64) {
        self.entries.push(ScoredDoc { doc_id, score });
    }

    /// Descending score, ties broken by ascending internal id
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&ScoredDoc> {
        self.entries.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredDoc> {
        self.entries.iter()
    }
}

impl FromIterator<(DocId, f64)> for ScoreList {
    fn from_iter<I: IntoIterator<Item = (DocId, f64)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(doc_id, score)| ScoredDoc { doc_id, score })
                .collect(),
        }
    }
}
