//! Retrieval models and their scoring formulas.
//!
//! A model is built once from configuration and then only read, so a single
//! value can be shared by every evaluation running in parallel.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Okapi BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub k3: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            k3: 0.0,
        }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<()> {
        if self.k1 < 0.0 || self.k3 < 0.0 {
            return Err(Error::config("BM25:k_1 and BM25:k_3 must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(Error::config("BM25:b must be within [0, 1]"));
        }
        Ok(())
    }

    /// Robertson/Sparck-Jones weight, floored at zero for very common terms
    pub fn rsj_weight(num_docs: f64, df: f64) -> f64 {
        ((num_docs - df + 0.5) / (df + 0.5)).ln().max(0.0)
    }

    pub fn tf_weight(&self, tf: f64, doc_len: f64, avg_len: f64) -> f64 {
        let norm = if avg_len > 0.0 { doc_len / avg_len } else { 1.0 };
        tf / (tf + self.k1 * (1.0 - self.b + self.b * norm))
    }

    pub fn user_weight(&self, qtf: f64) -> f64 {
        (self.k3 + 1.0) * qtf / (self.k3 + qtf)
    }

    /// Score contribution of one query term in one document
    pub fn term_score(&self, stats: &Bm25TermStats) -> f64 {
        Self::rsj_weight(stats.num_docs, stats.df)
            * self.tf_weight(stats.tf, stats.doc_len, stats.avg_len)
            * self.user_weight(stats.qtf)
    }
}

/// Inputs of a single BM25 term contribution
#[derive(Debug, Clone, Copy)]
pub struct Bm25TermStats {
    pub tf: f64,
    pub df: f64,
    pub num_docs: f64,
    pub doc_len: f64,
    pub avg_len: f64,
    pub qtf: f64,
}

/// Indri (Dirichlet + Jelinek-Mercer smoothed query likelihood) parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndriParams {
    pub lambda: f64,
    pub mu: f64,
}

impl Default for IndriParams {
    fn default() -> Self {
        Self {
            lambda: 0.4,
            mu: 2500.0,
        }
    }
}

/// Pseudo count used for terms that never occur in the collection, so that
/// their smoothed probability stays above zero.
const UNSEEN_TERM_CTF: f64 = 0.5;

impl IndriParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(Error::config("Indri:lambda must be within [0, 1]"));
        }
        if self.mu < 0.0 {
            return Err(Error::config("Indri:mu must be non-negative"));
        }
        Ok(())
    }

    /// Smoothed p(t|d). Pass `tf = 0` for the default score of an unmatched term.
    pub fn probability(&self, tf: f64, doc_len: f64, ctf: u64, sum_len: u64) -> f64 {
        let p_mle = collection_probability(ctf, sum_len);
        let denom = doc_len + self.mu;
        let dirichlet = if denom > 0.0 {
            (tf + self.mu * p_mle) / denom
        } else {
            0.0
        };
        (1.0 - self.lambda) * dirichlet + self.lambda * p_mle
    }
}

/// Maximum likelihood estimate p(t|C)
pub fn collection_probability(ctf: u64, sum_len: u64) -> f64 {
    if sum_len == 0 {
        return 0.0;
    }
    let ctf = if ctf == 0 { UNSEEN_TERM_CTF } else { ctf as f64 };
    ctf / sum_len as f64
}

/// Retrieval model in force for an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum RetrievalModel {
    UnrankedBoolean,
    RankedBoolean,
    Bm25(Bm25Params),
    Indri(IndriParams),
}

impl RetrievalModel {
    /// Build a model from its configuration name (case-insensitive)
    pub fn from_name(name: &str, bm25: Bm25Params, indri: IndriParams) -> Result<Self> {
        let model = match name.trim().to_ascii_lowercase().as_str() {
            "unrankedboolean" => RetrievalModel::UnrankedBoolean,
            "rankedboolean" => RetrievalModel::RankedBoolean,
            "bm25" => {
                bm25.validate()?;
                RetrievalModel::Bm25(bm25)
            }
            "indri" => {
                indri.validate()?;
                RetrievalModel::Indri(indri)
            }
            _ => {
                return Err(Error::config(format!("unknown retrieval model '{}'", name)));
            }
        };
        Ok(model)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RetrievalModel::UnrankedBoolean => "UnrankedBoolean",
            RetrievalModel::RankedBoolean => "RankedBoolean",
            RetrievalModel::Bm25(_) => "BM25",
            RetrievalModel::Indri(_) => "Indri",
        }
    }

    /// Operator implicitly wrapped around every query
    pub fn default_operator(&self) -> &'static str {
        match self {
            RetrievalModel::UnrankedBoolean | RetrievalModel::RankedBoolean => "#or",
            RetrievalModel::Bm25(_) => "#sum",
            RetrievalModel::Indri(_) => "#and",
        }
    }

    /// AND-family operators match documents missing some operand
    pub fn soft_and(&self) -> bool {
        matches!(self, RetrievalModel::Indri(_))
    }
}
