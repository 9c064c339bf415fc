//! Document scores of the scoring operators under each retrieval model.

use crate::error::{Error, Result};
use crate::index::{DocId, Field, IndexAccess};
use crate::query::model::{Bm25Params, Bm25TermStats, IndriParams, RetrievalModel};
use crate::query::node::{NodeKind, QueryNode};
use rustc_hash::FxHashMap;

/// Read-only state shared by every scoring call of an evaluation
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub index: &'a dyn IndexAccess,
    pub model: &'a RetrievalModel,
}

impl<'a> EvalContext<'a> {
    pub fn new(index: &'a dyn IndexAccess, model: &'a RetrievalModel) -> Self {
        Self { index, model }
    }
}

impl QueryNode {
    /// Score of the node's current match. Only meaningful right after
    /// `has_match` returned true.
    pub fn score(&mut self, ctx: &EvalContext<'_>) -> Result<f64> {
        let Some(doc) = self.current() else {
            return Ok(0.0);
        };

        match (&self.kind, ctx.model) {
            (NodeKind::Not, _) => Ok(0.0),
            (NodeKind::Score, _) => match self.args.first() {
                Some(arg) => score_inverted_list(arg, ctx, doc),
                None => Ok(0.0),
            },
            (kind, _) if kind.is_inverted_list() => score_inverted_list(self, ctx, doc),
            (NodeKind::And | NodeKind::Or, RetrievalModel::UnrankedBoolean) => Ok(1.0),
            (NodeKind::And, RetrievalModel::RankedBoolean) => {
                let mut min: Option<f64> = None;
                for arg in &mut self.args {
                    let score = arg.score(ctx)?;
                    min = Some(min.map_or(score, |m| m.min(score)));
                }
                Ok(min.unwrap_or(0.0))
            }
            (NodeKind::Or, RetrievalModel::RankedBoolean) => {
                let mut max = 0.0f64;
                for arg in &mut self.args {
                    if arg.matches(ctx.model, doc) {
                        max = max.max(arg.score(ctx)?);
                    }
                }
                Ok(max)
            }
            (
                NodeKind::And | NodeKind::Or | NodeKind::WAnd | NodeKind::WSum,
                RetrievalModel::Indri(_),
            ) => self.indri_score(ctx, doc),
            (NodeKind::Sum, RetrievalModel::Bm25(params)) => self.bm25_sum(ctx, doc, params),
            (kind, model) => Err(Error::ModelMismatch {
                operator: kind.name(),
                model: model.name(),
            }),
        }
    }

    /// Score of a document this node does not match. Only the Indri model
    /// assigns non-zero default scores.
    pub fn default_score(&self, ctx: &EvalContext<'_>, doc: DocId) -> Result<f64> {
        let RetrievalModel::Indri(params) = ctx.model else {
            return Ok(0.0);
        };

        match &self.kind {
            NodeKind::Score => match self.args.first() {
                Some(arg) => indri_probability(arg, ctx.index, params, doc, 0.0),
                None => Ok(0.0),
            },
            kind if kind.is_inverted_list() => {
                indri_probability(self, ctx.index, params, doc, 0.0)
            }
            NodeKind::And | NodeKind::Or | NodeKind::WAnd | NodeKind::WSum => {
                let defaults = self
                    .args
                    .iter()
                    .map(|arg| arg.default_score(ctx, doc))
                    .collect::<Result<Vec<_>>>()?;
                Ok(combine_indri(&self.kind, &defaults, &self.weights))
            }
            _ => Ok(0.0),
        }
    }

    fn indri_score(&mut self, ctx: &EvalContext<'_>, doc: DocId) -> Result<f64> {
        if self.kind == NodeKind::Or {
            // Noisy-OR only counts the operands present in the document
            let mut miss = 1.0;
            for arg in &mut self.args {
                if arg.matches(ctx.model, doc) {
                    miss *= 1.0 - arg.score(ctx)?;
                }
            }
            return Ok(1.0 - miss);
        }

        let mut probs = Vec::with_capacity(self.args.len());
        for arg in &mut self.args {
            let p = if arg.matches(ctx.model, doc) {
                arg.score(ctx)?
            } else {
                arg.default_score(ctx, doc)?
            };
            probs.push(p);
        }
        Ok(combine_indri(&self.kind, &probs, &self.weights))
    }

    fn bm25_sum(&mut self, ctx: &EvalContext<'_>, doc: DocId, params: &Bm25Params) -> Result<f64> {
        let Some(terms) = &self.sum_terms else {
            return Err(Error::index("#sum scored before initialize"));
        };

        let mut sum = 0.0;
        let operands = self.args.iter_mut().zip(&terms.qtf).zip(&terms.avg_len);
        for ((arg, &qtf), &avg_len) in operands {
            if !arg.matches(ctx.model, doc) {
                continue;
            }
            let Some(term) = arg.scored_list() else {
                sum += arg.score(ctx)?;
                continue;
            };
            // A repeated term is scored once, its repetitions only raise qtf
            if qtf == 0 {
                continue;
            }

            let stats = Bm25TermStats {
                tf: term.posting().map_or(0, |p| p.tf) as f64,
                df: term.inverted_list().map_or(0, |l| l.df) as f64,
                num_docs: terms.num_docs,
                doc_len: ctx.index.field_length(term.field(), doc)? as f64,
                avg_len,
                qtf: qtf as f64,
            };
            sum += params.term_score(&stats);
        }
        Ok(sum)
    }

    /// The inverted-list node this node scores, for term-like operands
    fn scored_list(&self) -> Option<&QueryNode> {
        match &self.kind {
            NodeKind::Score => self.args.first().filter(|a| a.kind.is_inverted_list()),
            kind if kind.is_inverted_list() => Some(self),
            _ => None,
        }
    }
}

/// Per-operand BM25 constants of a `#sum` node. They depend only on the
/// query and collection statistics, so they are computed once per tree.
#[derive(Debug, Clone, Default)]
pub struct SumTerms {
    /// Query term frequency carried by each operand: the repeat count on a
    /// term's first occurrence, 0 on its repetitions and on other operands
    qtf: Vec<u32>,
    /// Average length of the operand's field
    avg_len: Vec<f64>,
    num_docs: f64,
}

impl SumTerms {
    pub fn new(args: &[QueryNode], index: &dyn IndexAccess) -> Result<Self> {
        let keys: Vec<Option<String>> = args
            .iter()
            .map(|arg| arg.scored_list().map(|term| term.to_string()))
            .collect();
        let mut counts: FxHashMap<&str, u32> = FxHashMap::default();
        for key in keys.iter().flatten() {
            *counts.entry(key.as_str()).or_default() += 1;
        }

        let mut qtf = Vec::with_capacity(args.len());
        let mut avg_len = Vec::with_capacity(args.len());
        for (arg, key) in args.iter().zip(&keys) {
            qtf.push(key.as_deref().and_then(|k| counts.insert(k, 0)).unwrap_or(0));
            avg_len.push(match arg.scored_list() {
                Some(term) => average_field_length(index, term.field())?,
                None => 0.0,
            });
        }

        Ok(Self {
            qtf,
            avg_len,
            num_docs: index.num_docs()? as f64,
        })
    }
}

fn average_field_length(index: &dyn IndexAccess, field: Field) -> Result<f64> {
    let doc_count = index.doc_count(field)?;
    if doc_count == 0 {
        return Ok(0.0);
    }
    Ok(index.sum_of_field_lengths(field)? as f64 / doc_count as f64)
}

/// Score of an inverted-list node positioned on `doc`
fn score_inverted_list(node: &QueryNode, ctx: &EvalContext<'_>, doc: DocId) -> Result<f64> {
    match ctx.model {
        RetrievalModel::UnrankedBoolean => Ok(1.0),
        RetrievalModel::RankedBoolean => Ok(node.posting().map_or(0, |p| p.tf) as f64),
        RetrievalModel::Indri(params) => {
            let tf = node.posting().map_or(0, |p| p.tf) as f64;
            indri_probability(node, ctx.index, params, doc, tf)
        }
        RetrievalModel::Bm25(_) => Err(Error::ModelMismatch {
            operator: NodeKind::Score.name(),
            model: ctx.model.name(),
        }),
    }
}

fn indri_probability(
    node: &QueryNode,
    index: &dyn IndexAccess,
    params: &IndriParams,
    doc: DocId,
    tf: f64,
) -> Result<f64> {
    let field = node.field();
    let ctf = node.inverted_list().map_or(0, |l| l.ctf);
    let doc_len = index.field_length(field, doc)? as f64;
    let sum_len = index.sum_of_field_lengths(field)?;
    Ok(params.probability(tf, doc_len, ctf, sum_len))
}

/// Combine operand probabilities the way an Indri operator does
fn combine_indri(kind: &NodeKind, probs: &[f64], weights: &[f64]) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }
    match kind {
        NodeKind::And => {
            let exp = 1.0 / probs.len() as f64;
            probs.iter().map(|p| p.powf(exp)).product()
        }
        NodeKind::Or => 1.0 - probs.iter().map(|p| 1.0 - p).product::<f64>(),
        NodeKind::WAnd => normalized_weights(weights, probs.len())
            .zip(probs)
            .map(|(w, p)| p.powf(w))
            .product(),
        NodeKind::WSum => normalized_weights(weights, probs.len())
            .zip(probs)
            .map(|(w, p)| p * w)
            .sum(),
        _ => 0.0,
    }
}

/// `w_i / Σw`, uniform when the weights do not sum to a positive value
fn normalized_weights(weights: &[f64], n: usize) -> impl Iterator<Item = f64> + '_ {
    let total: f64 = (0..n).map(|i| weights.get(i).copied().unwrap_or(1.0)).sum();
    (0..n).map(move |i| {
        if total > 0.0 {
            weights.get(i).copied().unwrap_or(1.0) / total
        } else {
            1.0 / n as f64
        }
    })
}
