use crate::error::Result;
use crate::index::IndexAccess;
use crate::query::model::RetrievalModel;
use crate::query::node::QueryNode;
use crate::query::optimizer::optimize;
use crate::query::parser::parse_query;
use crate::query::score_list::ScoreList;
use crate::query::scorer::EvalContext;
use crate::utils::Analyzer;

/// Query processor: parse, optimize and evaluate a query document-at-a-time
pub struct QueryExecutor<'a> {
    index: &'a dyn IndexAccess,
    model: &'a RetrievalModel,
    analyzer: &'a Analyzer,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(index: &'a dyn IndexAccess, model: &'a RetrievalModel, analyzer: &'a Analyzer) -> Self {
        Self {
            index,
            model,
            analyzer,
        }
    }

    pub fn model(&self) -> &RetrievalModel {
        self.model
    }

    pub fn index(&self) -> &dyn IndexAccess {
        self.index
    }

    /// Parse a query into its operator tree
    pub fn parse(&self, query: &str) -> Result<QueryNode> {
        Ok(parse_query(query, self.model, self.analyzer)?)
    }

    /// Parse and optimize; `None` when nothing in the query can match
    pub fn plan(&self, query: &str) -> Result<Option<QueryNode>> {
        let tree = optimize(self.parse(query)?);
        match &tree {
            Some(tree) => tracing::debug!(query, plan = %tree, "query planned"),
            None => tracing::debug!(query, "query optimized away"),
        }
        Ok(tree)
    }

    /// Evaluate a query and return its documents sorted by score
    pub fn execute(&self, query: &str) -> Result<ScoreList> {
        let plan = self.plan(query)?;
        self.execute_plan(plan)
    }

    /// Evaluate an already optimized tree
    pub fn execute_plan(&self, plan: Option<QueryNode>) -> Result<ScoreList> {
        let mut results = ScoreList::new();
        let Some(mut root) = plan else {
            return Ok(results);
        };
        if root.args.is_empty() {
            return Ok(results);
        }

        let ctx = EvalContext::new(self.index, self.model);
        root.initialize(self.index)?;

        while root.has_match(self.model) {
            let Some(doc) = root.current() else {
                break;
            };
            let score = root.score(&ctx)?;
            results.push(doc, score);
            root.advance_past(doc);
        }

        results.sort();
        Ok(results)
    }
}
