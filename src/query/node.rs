//! Operator tree and the document-at-a-time iterator protocol.
//!
//! Every node walks its matches in ascending document id order. Term and
//! proximity nodes (the inverted-list kinds) hold a materialized list and walk
//! it with a document cursor plus a position cursor inside the current posting.
//! Scoring nodes hold no list; they derive their current match from their
//! children and cache it until the next advance.

use crate::error::Result;
use crate::index::{DocId, Field, IndexAccess, InvertedList, Position, Posting};
use crate::query::model::RetrievalModel;
use crate::query::proximity;
use crate::query::scorer::SumTerms;
use std::fmt;

/// Operator kinds of the query language
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Term { term: String, field: Field },
    Syn,
    /// Ordered window, adjacent gaps at most n
    Near(u32),
    /// Unordered window, span smaller than n
    Window(u32),
    And,
    Or,
    Not,
    Sum,
    WAnd,
    WSum,
    /// Adapter that makes a term or proximity node scorable
    Score,
}

impl NodeKind {
    /// Operator name as written in queries
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Term { .. } => "term",
            NodeKind::Syn => "#syn",
            NodeKind::Near(_) => "#near",
            NodeKind::Window(_) => "#window",
            NodeKind::And => "#and",
            NodeKind::Or => "#or",
            NodeKind::Not => "#not",
            NodeKind::Sum => "#sum",
            NodeKind::WAnd => "#wand",
            NodeKind::WSum => "#wsum",
            NodeKind::Score => "#score",
        }
    }

    /// Kinds that produce an inverted list rather than a score
    pub fn is_inverted_list(&self) -> bool {
        matches!(
            self,
            NodeKind::Term { .. } | NodeKind::Syn | NodeKind::Near(_) | NodeKind::Window(_)
        )
    }

    /// Kinds whose operands each carry a weight
    pub fn is_weighted(&self) -> bool {
        matches!(self, NodeKind::WAnd | NodeKind::WSum)
    }
}

/// A node of the operator tree together with its iteration state
#[derive(Debug, Clone)]
pub struct QueryNode {
    pub kind: NodeKind,
    pub args: Vec<QueryNode>,
    /// Operand weights, parallel to `args`; only used by `#wand` and `#wsum`
    pub weights: Vec<f64>,
    list: Option<InvertedList>,
    doc_cursor: usize,
    loc_cursor: usize,
    matched: Option<DocId>,
    /// BM25 operand constants of a `#sum`, set by `initialize`
    pub(crate) sum_terms: Option<SumTerms>,
}

impl QueryNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            args: Vec::new(),
            weights: Vec::new(),
            list: None,
            doc_cursor: 0,
            loc_cursor: 0,
            matched: None,
            sum_terms: None,
        }
    }

    pub fn term(term: impl Into<String>, field: Field) -> Self {
        Self::new(NodeKind::Term {
            term: term.into(),
            field,
        })
    }

    /// Builder form of `push_arg`
    pub fn with_args<I: IntoIterator<Item = QueryNode>>(mut self, args: I) -> Self {
        for arg in args {
            self.push_arg(arg);
        }
        self
    }

    pub fn push_arg(&mut self, arg: QueryNode) {
        self.args.push(arg);
        self.weights.push(1.0);
    }

    pub fn push_weighted_arg(&mut self, weight: f64, arg: QueryNode) {
        self.args.push(arg);
        self.weights.push(weight);
    }

    /// Field searched by an inverted-list node: its own for a term, the
    /// first operand's otherwise.
    pub fn field(&self) -> Field {
        match &self.kind {
            NodeKind::Term { field, .. } => *field,
            _ => self.args.first().map(QueryNode::field).unwrap_or_default(),
        }
    }

    /// Materialized inverted list, available after `initialize`
    pub fn inverted_list(&self) -> Option<&InvertedList> {
        self.list.as_ref()
    }

    /// Prepare the subtree for iteration. Inverted-list nodes fetch or compute
    /// their whole list here, children first.
    pub fn initialize(&mut self, index: &dyn IndexAccess) -> Result<()> {
        for arg in &mut self.args {
            arg.initialize(index)?;
        }

        let field = self.field();
        self.list = match &self.kind {
            NodeKind::Term { term, field } => Some(index.inverted_list(term, *field)?),
            NodeKind::Syn => Some(proximity::synonym(&mut self.args, field)),
            NodeKind::Near(distance) => Some(proximity::near(&mut self.args, *distance, field)),
            NodeKind::Window(size) => Some(proximity::window(&mut self.args, *size, field)),
            _ => None,
        };

        if let Some(list) = &self.list {
            tracing::debug!(node = %self, df = list.df, ctf = list.ctf, "inverted list ready");
        }
        self.sum_terms = match self.kind {
            NodeKind::Sum => Some(SumTerms::new(&self.args, index)?),
            _ => None,
        };

        self.doc_cursor = 0;
        self.loc_cursor = 0;
        self.matched = None;
        Ok(())
    }

    /// Whether the node has a current match, searching forward from the
    /// current cursor positions when needed.
    pub fn has_match(&mut self, model: &RetrievalModel) -> bool {
        if self.kind.is_inverted_list() {
            return self.posting().is_some();
        }
        if self.matched.is_some() {
            return true;
        }

        self.matched = match self.kind {
            NodeKind::And | NodeKind::WAnd if !model.soft_and() => {
                match_all(&mut self.args, model)
            }
            NodeKind::And | NodeKind::WAnd | NodeKind::Or | NodeKind::Sum | NodeKind::WSum => {
                match_min(&mut self.args, model)
            }
            NodeKind::Score => match self.args.first_mut() {
                Some(arg) => {
                    if arg.has_match(model) {
                        arg.current()
                    } else {
                        None
                    }
                }
                None => None,
            },
            NodeKind::Not => {
                // Matches exactly when no operand does, but never yields a
                // document of its own.
                return match_min(&mut self.args, model).is_none();
            }
            _ => None,
        };
        self.matched.is_some()
    }

    /// Current matching document, if any
    pub fn current(&self) -> Option<DocId> {
        if self.kind.is_inverted_list() {
            self.posting().map(|p| p.doc_id)
        } else {
            self.matched
        }
    }

    /// Move past `doc`; afterwards the node never reports a document <= `doc`
    pub fn advance_past(&mut self, doc: DocId) {
        if self.kind.is_inverted_list() {
            self.advance_cursor_while(|d| d <= doc);
        } else {
            for arg in &mut self.args {
                arg.advance_past(doc);
            }
            self.matched = None;
        }
    }

    /// Move to the first document >= `doc`
    pub fn advance_to(&mut self, doc: DocId) {
        if self.kind.is_inverted_list() {
            self.advance_cursor_while(|d| d < doc);
        } else {
            if self.matched.is_some_and(|m| m >= doc) {
                return;
            }
            for arg in &mut self.args {
                arg.advance_to(doc);
            }
            self.matched = None;
        }
    }

    /// Convenience for scoring a specific document
    pub fn matches(&mut self, model: &RetrievalModel, doc: DocId) -> bool {
        self.has_match(model) && self.current() == Some(doc)
    }

    fn advance_cursor_while(&mut self, mut before: impl FnMut(DocId) -> bool) {
        let Some(list) = &self.list else {
            return;
        };
        let start = self.doc_cursor;
        while self.doc_cursor < list.postings.len() && before(list.postings[self.doc_cursor].doc_id) {
            self.doc_cursor += 1;
        }
        if self.doc_cursor != start {
            self.loc_cursor = 0;
        }
    }

    /// Posting under the document cursor
    pub fn posting(&self) -> Option<&Posting> {
        self.list.as_ref()?.postings.get(self.doc_cursor)
    }

    /// Position under the position cursor of the current posting
    pub fn position_current(&self) -> Option<Position> {
        self.posting()?.positions.get(self.loc_cursor).copied()
    }

    pub fn position_advance(&mut self) {
        if self.position_current().is_some() {
            self.loc_cursor += 1;
        }
    }

    /// Move the position cursor to the first position > `pos`
    pub fn position_advance_past(&mut self, pos: Position) {
        while self.position_current().is_some_and(|p| p <= pos) {
            self.loc_cursor += 1;
        }
    }

    pub fn position_reset(&mut self) {
        self.loc_cursor = 0;
    }
}

/// Find the next document matched by every node, leaving all of them on it.
pub fn match_all(args: &mut [QueryNode], model: &RetrievalModel) -> Option<DocId> {
    let (first, rest) = args.split_first_mut()?;
    'search: loop {
        if !first.has_match(model) {
            return None;
        }
        let doc = first.current()?;
        for arg in rest.iter_mut() {
            arg.advance_to(doc);
            if !arg.has_match(model) {
                return None;
            }
            let other = arg.current()?;
            if other != doc {
                first.advance_to(other);
                continue 'search;
            }
        }
        return Some(doc);
    }
}

/// Smallest current document among the nodes that have a match.
pub fn match_min(args: &mut [QueryNode], model: &RetrievalModel) -> Option<DocId> {
    let mut min = None;
    for arg in args.iter_mut() {
        if !arg.has_match(model) {
            continue;
        }
        if let Some(doc) = arg.current() {
            min = Some(min.map_or(doc, |m: DocId| m.min(doc)));
        }
    }
    min
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Term { term, field } => return write!(f, "{}.{}", term, field),
            NodeKind::Score => {
                return match self.args.first() {
                    Some(arg) => write!(f, "{}", arg),
                    None => f.write_str("#score()"),
                };
            }
            NodeKind::Near(n) | NodeKind::Window(n) => write!(f, "{}/{}(", self.kind.name(), n)?,
            kind => write!(f, "{}(", kind.name())?,
        }

        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if self.kind.is_weighted() {
                write!(f, "{} ", self.weights.get(i).copied().unwrap_or(1.0))?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::reader::tests::body_index;
    use crate::query::model::{Bm25Params, IndriParams};

    fn score(arg: QueryNode) -> QueryNode {
        QueryNode::new(NodeKind::Score).with_args([arg])
    }

    fn body(term: &str) -> QueryNode {
        QueryNode::term(term, Field::Body)
    }

    fn drain(node: &mut QueryNode, model: &RetrievalModel) -> Vec<DocId> {
        let mut docs = Vec::new();
        while node.has_match(model) {
            let Some(doc) = node.current() else { break };
            docs.push(doc);
            node.advance_past(doc);
        }
        docs
    }

    #[test]
    fn test_term_cursor() {
        let index = body_index(&["a", "b", "a b", "a"]);
        let mut node = body("a");
        node.initialize(&index).unwrap();

        assert_eq!(node.current(), Some(0));
        node.advance_to(1);
        assert_eq!(node.current(), Some(2));
        node.advance_to(2);
        assert_eq!(node.current(), Some(2));
        node.advance_past(2);
        assert_eq!(node.current(), Some(3));
        node.advance_past(3);
        assert_eq!(node.current(), None);
        assert!(!node.has_match(&RetrievalModel::UnrankedBoolean));
    }

    #[test]
    fn test_position_cursor() {
        let index = body_index(&["a x a y a"]);
        let mut node = body("a");
        node.initialize(&index).unwrap();

        assert_eq!(node.position_current(), Some(0));
        node.position_advance_past(1);
        assert_eq!(node.position_current(), Some(2));
        node.position_advance();
        assert_eq!(node.position_current(), Some(4));
        node.position_advance();
        assert_eq!(node.position_current(), None);
        node.position_reset();
        assert_eq!(node.position_current(), Some(0));
    }

    #[test]
    fn test_score_adapter_follows_its_operand() {
        let index = body_index(&["a", "b", "a b", "c"]);
        let model = RetrievalModel::RankedBoolean;
        let mut node = score(body("a"));
        node.initialize(&index).unwrap();

        assert!(node.has_match(&model));
        assert_eq!(node.current(), Some(0));
        node.advance_past(0);
        assert_eq!(node.current(), None);
        assert!(node.has_match(&model));
        assert_eq!(node.current(), Some(2));
        node.advance_past(2);
        assert!(!node.has_match(&model));
        assert_eq!(node.current(), None);

        let mut empty = QueryNode::new(NodeKind::Score);
        empty.initialize(&index).unwrap();
        assert!(!empty.has_match(&model));
    }

    #[test]
    fn test_and_match_all_under_boolean() {
        let index = body_index(&["a", "a b", "b", "b a", "a"]);
        let mut node = QueryNode::new(NodeKind::And).with_args([score(body("a")), score(body("b"))]);
        node.initialize(&index).unwrap();
        assert_eq!(drain(&mut node, &RetrievalModel::RankedBoolean), vec![1, 3]);
    }

    #[test]
    fn test_and_match_min_under_indri() {
        let index = body_index(&["a", "a b", "b", "c"]);
        let model = RetrievalModel::Indri(IndriParams::default());
        let mut node = QueryNode::new(NodeKind::And).with_args([score(body("a")), score(body("b"))]);
        node.initialize(&index).unwrap();
        assert_eq!(drain(&mut node, &model), vec![0, 1, 2]);
    }

    #[test]
    fn test_or_and_sum_match_min() {
        let index = body_index(&["a", "c", "b", "a b"]);
        let model = RetrievalModel::Bm25(Bm25Params::default());
        for kind in [NodeKind::Or, NodeKind::Sum] {
            let mut node = QueryNode::new(kind).with_args([score(body("a")), score(body("b"))]);
            node.initialize(&index).unwrap();
            assert_eq!(drain(&mut node, &model), vec![0, 2, 3]);
        }
    }

    #[test]
    fn test_nested_scoring_nodes() {
        let index = body_index(&["a b", "a c", "b c", "a b c"]);
        let model = RetrievalModel::RankedBoolean;
        let inner = QueryNode::new(NodeKind::Or).with_args([score(body("b")), score(body("c"))]);
        let mut node = QueryNode::new(NodeKind::And).with_args([score(body("a")), inner]);
        node.initialize(&index).unwrap();
        assert_eq!(drain(&mut node, &model), vec![0, 1, 3]);
    }

    #[test]
    fn test_not_never_yields_a_document() {
        let index = body_index(&["a", "b"]);
        let model = RetrievalModel::UnrankedBoolean;
        let mut node = QueryNode::new(NodeKind::Not).with_args([score(body("zzz"))]);
        node.initialize(&index).unwrap();
        assert!(node.has_match(&model));
        assert_eq!(node.current(), None);

        let mut node = QueryNode::new(NodeKind::Not).with_args([score(body("a"))]);
        node.initialize(&index).unwrap();
        assert!(!node.has_match(&model));
    }

    #[test]
    fn test_cursor_monotonic() {
        let index = body_index(&["a", "a", "b", "a", "a b"]);
        let model = RetrievalModel::RankedBoolean;
        let mut node = QueryNode::new(NodeKind::Or).with_args([score(body("a")), score(body("b"))]);
        node.initialize(&index).unwrap();
        let docs = drain(&mut node, &model);
        assert!(docs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(docs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_display() {
        let near = QueryNode::new(NodeKind::Near(3)).with_args([body("a"), body("b")]);
        assert_eq!(near.to_string(), "#near/3(a.body b.body)");

        let mut wand = QueryNode::new(NodeKind::WAnd);
        wand.push_weighted_arg(0.6, score(body("a")));
        wand.push_weighted_arg(0.4, score(QueryNode::term("b", Field::Title)));
        assert_eq!(wand.to_string(), "#wand(0.6 a.body 0.4 b.title)");

        let sum = QueryNode::new(NodeKind::Sum).with_args([score(near)]);
        assert_eq!(sum.to_string(), "#sum(#near/3(a.body b.body))");
    }

    #[test]
    fn test_field_inherited_from_first_operand() {
        let syn = QueryNode::new(NodeKind::Syn)
            .with_args([QueryNode::term("a", Field::Title), QueryNode::term("b", Field::Title)]);
        assert_eq!(syn.field(), Field::Title);
        assert_eq!(QueryNode::new(NodeKind::Syn).field(), Field::Body);
    }
}
