use crate::query::node::{NodeKind, QueryNode};

/// Remove subtrees that can never match: operators left without operands
/// (for example after stopword removal) disappear, recursively. Terms are
/// kept as they are. Single-operand operators are not collapsed.
pub fn optimize(node: QueryNode) -> Option<QueryNode> {
    if matches!(node.kind, NodeKind::Term { .. }) {
        return Some(node);
    }

    let QueryNode {
        kind,
        args,
        weights,
        ..
    } = node;

    let mut optimized = QueryNode::new(kind);
    for (i, arg) in args.into_iter().enumerate() {
        if let Some(arg) = optimize(arg) {
            optimized.push_weighted_arg(weights.get(i).copied().unwrap_or(1.0), arg);
        }
    }

    if optimized.args.is_empty() {
        None
    } else {
        Some(optimized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::model::{Bm25Params, IndriParams, RetrievalModel};
    use crate::query::parser::parse_query;
    use crate::utils::Analyzer;

    fn plan(query: &str, model: &RetrievalModel) -> Option<String> {
        let tree = parse_query(query, model, &Analyzer::english()).unwrap();
        optimize(tree).map(|t| t.to_string())
    }

    #[test]
    fn test_empty_proximity_removed() {
        let model = RetrievalModel::Bm25(Bm25Params::default());
        assert_eq!(plan("apple #near/1(of the)", &model).as_deref(), Some("#sum(apple.body)"));
    }

    #[test]
    fn test_all_stopwords_prunes_root() {
        let model = RetrievalModel::Indri(IndriParams::default());
        assert_eq!(plan("the of #syn(a)", &model), None);
    }

    #[test]
    fn test_weights_stay_with_operands() {
        let model = RetrievalModel::Indri(IndriParams::default());
        assert_eq!(
            plan("#wand(0.2 #syn(the) 0.3 x 0.5 y)", &model).as_deref(),
            Some("#and(#wand(0.3 x.body 0.5 y.body))")
        );
    }

    #[test]
    fn test_single_operand_kept() {
        let model = RetrievalModel::RankedBoolean;
        assert_eq!(plan("#and(#and(x))", &model).as_deref(), Some("#or(#and(#and(x.body)))"));
    }

    #[test]
    fn test_idempotent() {
        let model = RetrievalModel::Indri(IndriParams::default());
        let analyzer = Analyzer::english();
        for query in ["#or(a #near/2(the of) #wsum(1 b 2 #syn(c d)))", "x #and(the)", "#window/3(a b)"] {
            let once = optimize(parse_query(query, &model, &analyzer).unwrap()).unwrap();
            let rendered = once.to_string();
            let twice = optimize(once).unwrap();
            assert_eq!(rendered, twice.to_string());
        }
    }
}
