//! Pseudo-relevance feedback.
//!
//! Terms are mined from the body term vectors of the top documents of an
//! initial ranking, weighted by how likely the feedback documents are to
//! generate them, and appended to the original query with a weighted AND.

use crate::error::{Error, Result};
use crate::index::{Field, IndexAccess};
use crate::query::executor::QueryExecutor;
use crate::query::score_list::ScoreList;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs;
use std::path::{Path, PathBuf};

/// Feedback settings from the parameter file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackParams {
    /// Number of top documents mined for terms
    pub docs: usize,
    /// Number of expansion terms kept
    pub terms: usize,
    /// Dirichlet smoothing of p(t|d)
    pub mu: f64,
    /// Weight of the original query in the expanded query
    pub orig_weight: f64,
    /// Precomputed initial rankings, used instead of a first retrieval pass
    pub initial_ranking_file: Option<PathBuf>,
    /// File that receives the expansion query of every processed query
    pub expansion_query_file: Option<PathBuf>,
}

impl FeedbackParams {
    pub fn validate(&self) -> Result<()> {
        if self.docs == 0 || self.terms == 0 {
            return Err(Error::config("fbDocs and fbTerms must be positive"));
        }
        if self.mu < 0.0 {
            return Err(Error::config("fbMu must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.orig_weight) {
            return Err(Error::config("fbOrigWeight must be within [0, 1]"));
        }
        Ok(())
    }
}

/// A candidate expansion term and its feedback weight
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionTerm {
    pub term: String,
    pub weight: f64,
}

/// Heap entry ordered so that the weakest candidate is on top
#[derive(Debug)]
struct Candidate {
    score: f64,
    seq: usize,
    term: String,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower score is weaker; among equal scores the later one is weaker
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Keeps the `capacity` best terms seen so far
struct TopTerms {
    heap: BinaryHeap<Candidate>,
    capacity: usize,
}

impl TopTerms {
    fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    fn try_insert(&mut self, candidate: Candidate) {
        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|weakest| candidate < *weakest) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    /// Strongest first
    fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

/// Round to 4 decimal places
fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}

/// Score every term of the top `params.docs` documents' body vectors and
/// keep the best `params.terms`, strongest first.
pub fn expansion_terms(
    index: &dyn IndexAccess,
    ranking: &ScoreList,
    params: &FeedbackParams,
) -> Result<Vec<ExpansionTerm>> {
    let field = Field::Body;
    let sum_len = index.sum_of_field_lengths(field)? as f64;
    if sum_len <= 0.0 {
        return Ok(Vec::new());
    }

    let top: Vec<_> = ranking.iter().take(params.docs).copied().collect();
    let mut vectors = Vec::with_capacity(top.len());
    for scored in &top {
        vectors.push(index.term_vector(scored.doc_id, field)?);
    }

    // Vocabulary of the feedback documents in first-seen order
    let mut vocabulary: Vec<(String, u64)> = Vec::new();
    let mut slots: FxHashMap<String, usize> = FxHashMap::default();
    for vector in &vectors {
        for entry in &vector.entries {
            if !slots.contains_key(&entry.stem) {
                slots.insert(entry.stem.clone(), vocabulary.len());
                vocabulary.push((entry.stem.clone(), entry.ctf));
            }
        }
    }

    let mut scores = vec![0.0f64; vocabulary.len()];
    for (scored, vector) in top.iter().zip(&vectors) {
        let doc_len = vector.length as f64;
        let doc_tf: FxHashMap<&str, u32> = vector
            .entries
            .iter()
            .map(|e| (e.stem.as_str(), e.tf))
            .collect();

        for ((term, ctf), score) in vocabulary.iter().zip(scores.iter_mut()) {
            if *ctf == 0 {
                continue;
            }
            let ctf = *ctf as f64;
            let p_mle = ctf / sum_len;
            let tf = doc_tf.get(term.as_str()).copied().unwrap_or(0) as f64;
            let p_td = (tf + params.mu * p_mle) / (doc_len + params.mu);
            *score += scored.score * (sum_len / ctf).ln() * p_td;
        }
    }

    let mut best = TopTerms::new(params.terms);
    for (seq, ((term, _), score)) in vocabulary.into_iter().zip(scores).enumerate() {
        // Field-qualified or punctuated stems would not parse back as terms
        if term.contains('.') || term.contains(',') {
            continue;
        }
        best.try_insert(Candidate { score, seq, term });
    }

    Ok(best
        .into_sorted_vec()
        .into_iter()
        .map(|c| ExpansionTerm {
            term: c.term,
            weight: round4(c.score),
        })
        .collect())
}

/// `#wand(w1 t1 w2 t2 ..)`
pub fn expansion_query(terms: &[ExpansionTerm]) -> String {
    let operands: Vec<String> = terms
        .iter()
        .map(|t| format!("{} {}", t.weight, t.term))
        .collect();
    format!("#wand({})", operands.join(" "))
}

/// Combine the original query with an expansion query
pub fn expanded_query(original: &str, expansion: &str, orig_weight: f64) -> String {
    format!(
        "#wand({} #and({}) {} {})",
        orig_weight,
        original,
        round4(1.0 - orig_weight),
        expansion
    )
}

/// Initial rankings per query id, read from a TREC-format run file
/// (`qid Q0 docid rank score tag`). Unusable lines are skipped.
pub fn load_initial_rankings(
    path: &Path,
    index: &dyn IndexAccess,
) -> Result<FxHashMap<String, ScoreList>> {
    let content = fs::read_to_string(path)?;
    let mut rankings: FxHashMap<String, ScoreList> = FxHashMap::default();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            tracing::warn!(line = line_no + 1, "skipping short initial ranking line");
            continue;
        }
        let Ok(score) = fields[4].parse::<f64>() else {
            tracing::warn!(line = line_no + 1, score = fields[4], "skipping line with bad score");
            continue;
        };
        let doc = match index.internal_doc_id(fields[2]) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "skipping unknown document");
                continue;
            }
        };
        rankings
            .entry(fields[0].to_string())
            .or_default()
            .push(doc, score);
    }

    for ranking in rankings.values_mut() {
        ranking.sort();
    }
    Ok(rankings)
}

/// Result of a feedback round
#[derive(Debug, Clone)]
pub struct Expansion {
    pub terms: Vec<ExpansionTerm>,
    /// `#wand` over the expansion terms alone
    pub expansion_query: String,
    /// Original and expansion query combined
    pub query: String,
    pub results: ScoreList,
}

/// Runs a query through one round of pseudo-relevance feedback
pub struct FeedbackEngine<'a, 'e> {
    executor: &'e QueryExecutor<'a>,
    params: &'e FeedbackParams,
}

impl<'a, 'e> FeedbackEngine<'a, 'e> {
    pub fn new(executor: &'e QueryExecutor<'a>, params: &'e FeedbackParams) -> Self {
        Self { executor, params }
    }

    /// Expand `query` from `initial` (or from its own ranking when absent)
    /// and evaluate the expanded query.
    pub fn run(&self, query: &str, initial: Option<&ScoreList>) -> Result<Expansion> {
        let computed;
        let initial = match initial {
            Some(ranking) => ranking,
            None => {
                computed = self.executor.execute(query)?;
                &computed
            }
        };

        let terms = expansion_terms(self.executor.index(), initial, self.params)?;
        let expansion_query = expansion_query(&terms);
        let query = expanded_query(query, &expansion_query, self.params.orig_weight);
        tracing::debug!(expanded = %query, "feedback query built");

        let results = self.executor.execute(&query)?;
        Ok(Expansion {
            terms,
            expansion_query,
            query,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::reader::tests::body_index;
    use crate::query::model::{IndriParams, RetrievalModel};

    fn params(docs: usize, terms: usize) -> FeedbackParams {
        FeedbackParams {
            docs,
            terms,
            mu: 0.0,
            orig_weight: 0.6,
            initial_ranking_file: None,
            expansion_query_file: None,
        }
    }

    #[test]
    fn test_expansion_term_weights() {
        let index = body_index(&["a b", "a c", "d e f g"]);
        let ranking: ScoreList = [(0, 1.0)].into_iter().collect();
        let terms = expansion_terms(&index, &ranking, &params(1, 5)).unwrap();

        // mu = 0: weight = score * ln(sumLen/ctf) * tf/docLen
        let sum_len: f64 = 8.0;
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].term, "b");
        assert_eq!(terms[0].weight, round4((sum_len / 1.0).ln() * 0.5));
        assert_eq!(terms[1].term, "a");
        assert_eq!(terms[1].weight, round4((sum_len / 2.0).ln() * 0.5));
    }

    #[test]
    fn test_keeps_top_terms_with_stable_ties() {
        let index = body_index(&["p q r s", "t"]);
        let ranking: ScoreList = [(0, 1.0)].into_iter().collect();
        let terms = expansion_terms(&index, &ranking, &params(1, 2)).unwrap();
        let names: Vec<&str> = terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(names, vec!["p", "q"]);
    }

    #[test]
    fn test_terms_absent_from_a_document_still_accumulate() {
        let index = body_index(&["a", "b", "c c c c"]);
        let ranking: ScoreList = [(0, 0.5), (1, 0.5)].into_iter().collect();
        let mut fb = params(2, 5);
        fb.mu = 10.0;
        let terms = expansion_terms(&index, &ranking, &fb).unwrap();
        assert_eq!(terms.len(), 2);
        assert!(terms.iter().all(|t| t.weight > 0.0));
        // Symmetric statistics give identical weights, first seen wins
        assert_eq!(terms[0].term, "a");
        assert_eq!(terms[0].weight, terms[1].weight);
    }

    #[test]
    fn test_punctuated_terms_skipped() {
        let index = body_index(&["www.example.com plain", "x"]);
        let ranking: ScoreList = [(0, 1.0)].into_iter().collect();
        let terms = expansion_terms(&index, &ranking, &params(1, 5)).unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].term, "plain");
    }

    #[test]
    fn test_query_strings() {
        let terms = vec![
            ExpansionTerm {
                term: "b".into(),
                weight: 0.25,
            },
            ExpansionTerm {
                term: "a".into(),
                weight: 0.1234,
            },
        ];
        let expansion = expansion_query(&terms);
        assert_eq!(expansion, "#wand(0.25 b 0.1234 a)");
        assert_eq!(
            expanded_query("x y", &expansion, 0.6),
            "#wand(0.6 #and(x y) 0.4 #wand(0.25 b 0.1234 a))"
        );
    }

    #[test]
    fn test_load_initial_rankings() {
        let index = body_index(&["a", "b", "c"]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("initial.teIn");
        fs::write(
            &path,
            "7 Q0 doc-2 1 3.5 run\n7 Q0 doc-0 2 1.25 run\n8 Q0 doc-1 1 2.0 run\n\
             8 Q0 missing 2 1.0 run\nbroken line\n8 Q0 doc-0 3 nan-ish run\n",
        )
        .unwrap();

        let rankings = load_initial_rankings(&path, &index).unwrap();
        assert_eq!(rankings.len(), 2);
        let seven: Vec<_> = rankings["7"].iter().map(|d| (d.doc_id, d.score)).collect();
        assert_eq!(seven, vec![(2, 3.5), (0, 1.25)]);
        assert_eq!(rankings["8"].len(), 1);
    }

    #[test]
    fn test_feedback_round() {
        let index = body_index(&[
            "apple pie recipe",
            "apple tart recipe",
            "car engine",
            "recipe book",
            "pie chart",
        ]);
        let analyzer = index.analyzer();
        let model = RetrievalModel::Indri(IndriParams::default());
        let executor = QueryExecutor::new(&index, &model, &analyzer);
        let fb = FeedbackParams {
            mu: 0.0,
            ..params(2, 3)
        };

        let expansion = FeedbackEngine::new(&executor, &fb).run("apple", None).unwrap();
        assert_eq!(expansion.terms.len(), 3);
        assert!(expansion.query.starts_with("#wand(0.6 #and(apple) 0.4 #wand("));
        assert!(expansion.results.iter().any(|d| d.doc_id == 3));
        assert!(expansion.results.get(0).is_some_and(|d| d.doc_id <= 1));
    }

    #[test]
    fn test_validate() {
        assert!(params(10, 5).validate().is_ok());
        assert!(params(0, 5).validate().is_err());
        let mut bad = params(10, 5);
        bad.orig_weight = 1.5;
        assert!(bad.validate().is_err());
    }
}
