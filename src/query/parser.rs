//! Query language parser.
//!
//! Syntax:
//! - `term` or `term.field` (fields: body, title, url, keywords, inlink)
//! - `#and(..)`, `#or(..)`, `#sum(..)`, `#syn(..)`
//! - `#near/N(..)` ordered window, `#window/N(..)` unordered window
//! - `#wand(w1 q1 w2 q2 ..)`, `#wsum(w1 q1 ..)` weighted operands
//!
//! Every query is wrapped in the retrieval model's default operator, so the
//! root is always a scoring operator.

use crate::error::ParseError;
use crate::index::Field;
use crate::query::model::RetrievalModel;
use crate::query::node::{NodeKind, QueryNode};
use crate::utils::Analyzer;
use regex::Regex;
use std::sync::OnceLock;

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse a query string into an operator tree rooted at a scoring operator
pub fn parse_query(
    query: &str,
    model: &RetrievalModel,
    analyzer: &Analyzer,
) -> ParseResult<QueryNode> {
    let wrapped = format!("{}({})", model.default_operator(), query);
    QueryParser::new(&wrapped, analyzer).parse()
}

fn distance_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#(near|window)/(\d+)$").ok())
        .as_ref()
}

/// One operator under construction
struct Frame {
    node: QueryNode,
    /// Weight read for the next operand of `#wand`/`#wsum`
    pending_weight: Option<f64>,
}

impl Frame {
    fn new(node: QueryNode) -> Self {
        Self {
            node,
            pending_weight: None,
        }
    }

    fn expects_weight(&self) -> bool {
        self.node.kind.is_weighted() && self.pending_weight.is_none()
    }

    fn push_operand(&mut self, operand: QueryNode) -> ParseResult<()> {
        let parent = &self.node.kind;
        let operand = if parent.is_inverted_list() {
            if !operand.kind.is_inverted_list() {
                return Err(ParseError::InvalidOperand {
                    operator: parent.name().to_string(),
                    operand: operand.kind.name().to_string(),
                });
            }
            operand
        } else if operand.kind.is_inverted_list() {
            QueryNode::new(NodeKind::Score).with_args([operand])
        } else {
            operand
        };

        if parent.is_weighted() {
            let weight = self.pending_weight.ok_or_else(|| ParseError::MissingWeight {
                operator: parent.name().to_string(),
            })?;
            self.node.push_weighted_arg(weight, operand);
        } else {
            self.node.push_arg(operand);
        }
        Ok(())
    }

    /// Add the terms produced from one query token. They all share the
    /// token's weight, which is consumed even when no term survives analysis.
    fn push_terms(&mut self, terms: Vec<QueryNode>) -> ParseResult<()> {
        for term in terms {
            self.push_operand(term)?;
        }
        self.pending_weight = None;
        Ok(())
    }
}

struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
    analyzer: &'a Analyzer,
}

impl<'a> QueryParser<'a> {
    fn new(input: &'a str, analyzer: &'a Analyzer) -> Self {
        Self {
            input,
            pos: 0,
            analyzer,
        }
    }

    fn parse(&mut self) -> ParseResult<QueryNode> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<QueryNode> = None;

        while let Some(token) = self.next_token() {
            if root.is_some() {
                return Err(ParseError::TrailingTokens {
                    query: self.input.to_string(),
                });
            }

            if token == ")" {
                let Some(frame) = stack.pop() else {
                    return Err(self.unbalanced());
                };
                if frame.pending_weight.is_some() {
                    return Err(ParseError::DanglingWeight {
                        operator: frame.node.kind.name().to_string(),
                    });
                }
                match stack.last_mut() {
                    Some(parent) => {
                        parent.push_operand(frame.node)?;
                        parent.pending_weight = None;
                    }
                    None => root = Some(frame.node),
                }
                continue;
            }

            if let Some(top) = stack.last_mut()
                && top.expects_weight()
            {
                let weight = token
                    .parse::<f64>()
                    .ok()
                    .filter(|w| w.is_finite() && *w >= 0.0)
                    .ok_or_else(|| ParseError::ExpectedWeight {
                        token: token.to_string(),
                    })?;
                top.pending_weight = Some(weight);
                continue;
            }

            if token.starts_with('#') {
                stack.push(Frame::new(operator(token)?));
                continue;
            }

            let Some(top) = stack.last_mut() else {
                return Err(self.unbalanced());
            };
            top.push_terms(self.term_nodes(token)?)?;
        }

        match root {
            Some(root) if stack.is_empty() => Ok(root),
            _ => Err(self.unbalanced()),
        }
    }

    fn unbalanced(&self) -> ParseError {
        ParseError::UnbalancedParentheses {
            query: self.input.to_string(),
        }
    }

    /// Next token: a closing parenthesis or a run of non-delimiters.
    /// Opening parentheses only separate tokens.
    fn next_token(&mut self) -> Option<&'a str> {
        let input = self.input;
        let rest = &input[self.pos..];
        self.pos += rest.len() - rest.trim_start_matches(is_separator).len();

        let rest = &input[self.pos..];
        if rest.is_empty() {
            return None;
        }
        if rest.starts_with(')') {
            self.pos += 1;
            return Some(&rest[..1]);
        }

        let len = rest.find(|c| is_separator(c) || c == ')').unwrap_or(rest.len());
        self.pos += len;
        Some(&rest[..len])
    }

    /// Split `term[.field]`, then run the term text through the analyzer
    fn term_nodes(&self, token: &str) -> ParseResult<Vec<QueryNode>> {
        let (text, field) = match token.split_once('.') {
            Some((text, field)) => {
                let field = field.parse::<Field>().map_err(|_| ParseError::UnknownField {
                    token: token.to_string(),
                })?;
                (text, field)
            }
            None => (token, Field::Body),
        };

        Ok(self
            .analyzer
            .analyze(text)
            .into_iter()
            .map(|term| QueryNode::term(term, field))
            .collect())
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | ',' | '(')
}

/// Node for an operator keyword (case-insensitive)
fn operator(token: &str) -> ParseResult<QueryNode> {
    let lower = token.to_ascii_lowercase();
    let kind = match lower.as_str() {
        "#and" => NodeKind::And,
        "#or" => NodeKind::Or,
        "#sum" => NodeKind::Sum,
        "#syn" => NodeKind::Syn,
        "#wand" => NodeKind::WAnd,
        "#wsum" => NodeKind::WSum,
        _ if lower.starts_with("#near") || lower.starts_with("#window") => {
            let caps = distance_regex()
                .and_then(|re| re.captures(&lower))
                .ok_or_else(|| ParseError::MalformedDistance {
                    token: token.to_string(),
                })?;
            let distance = caps[2]
                .parse::<u32>()
                .map_err(|_| ParseError::MalformedDistance {
                    token: token.to_string(),
                })?;
            if &caps[1] == "near" {
                NodeKind::Near(distance)
            } else {
                NodeKind::Window(distance)
            }
        }
        _ => {
            return Err(ParseError::UnknownOperator {
                token: token.to_string(),
            });
        }
    };
    Ok(QueryNode::new(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::model::{Bm25Params, IndriParams};

    fn bm25() -> RetrievalModel {
        RetrievalModel::Bm25(Bm25Params::default())
    }

    fn indri() -> RetrievalModel {
        RetrievalModel::Indri(IndriParams::default())
    }

    fn parse(query: &str, model: &RetrievalModel) -> ParseResult<QueryNode> {
        parse_query(query, model, &Analyzer::new(["the", "of"]))
    }

    fn render(query: &str, model: &RetrievalModel) -> String {
        parse(query, model).unwrap().to_string()
    }

    #[test]
    fn test_wrapped_in_default_operator() {
        assert_eq!(render("apple.title", &bm25()), "#sum(apple.title)");
        assert_eq!(render("a b", &indri()), "#and(a.body b.body)");
        assert_eq!(
            render("apple pie", &RetrievalModel::UnrankedBoolean),
            "#or(apple.body pie.body)"
        );
    }

    #[test]
    fn test_terms_wrapped_in_score() {
        let root = parse("apple #near/2(a b)", &bm25()).unwrap();
        assert_eq!(root.kind, NodeKind::Sum);
        assert!(root.args.iter().all(|a| a.kind == NodeKind::Score));
        assert_eq!(root.args[1].args[0].kind, NodeKind::Near(2));
    }

    #[test]
    fn test_nested_operators() {
        assert_eq!(
            render("#AND(a #OR(b c.title) #syn(d e))", &RetrievalModel::RankedBoolean),
            "#or(#and(a.body #or(b.body c.title) #syn(d.body e.body)))"
        );
        assert_eq!(
            render("#window/8(a #near/1(b c))", &indri()),
            "#and(#window/8(a.body #near/1(b.body c.body)))"
        );
    }

    #[test]
    fn test_commas_are_separators() {
        assert_eq!(render("#and(a,b)", &indri()), "#and(#and(a.body b.body))");
    }

    #[test]
    fn test_weighted_operators() {
        let root = parse("#wand(0.6 a 0.4 #and(b c))", &indri()).unwrap();
        let wand = &root.args[0];
        assert_eq!(wand.kind, NodeKind::WAnd);
        assert_eq!(wand.weights, vec![0.6, 0.4]);
        assert_eq!(wand.args[1].kind, NodeKind::And);
        assert_eq!(wand.to_string(), "#wand(0.6 a.body 0.4 #and(b.body c.body))");
    }

    #[test]
    fn test_weight_shared_by_split_term() {
        let root = parse("#wsum(2 near-death 1 x)", &indri()).unwrap();
        let wsum = &root.args[0];
        assert_eq!(wsum.args.len(), 3);
        assert_eq!(wsum.weights, vec![2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_weight_of_stopword_dropped() {
        let root = parse("#wand(0.3 the 0.7 apple)", &indri()).unwrap();
        let wand = &root.args[0];
        assert_eq!(wand.to_string(), "#wand(0.7 apple.body)");
    }

    #[test]
    fn test_stopwords_removed() {
        assert_eq!(render("the apple", &bm25()), "#sum(apple.body)");
        assert_eq!(render("#near/1(of the)", &bm25()), "#sum(#near/1())");
    }

    #[test]
    fn test_case_insensitive_keywords() {
        assert_eq!(render("#NEAR/3(a b)", &bm25()), "#sum(#near/3(a.body b.body))");
        assert_eq!(render("#WSUM(1 a)", &indri()), "#and(#wsum(1 a.body))");
    }

    #[test]
    fn test_errors() {
        let model = indri();
        assert!(matches!(parse("apple.nowhere", &model), Err(ParseError::UnknownField { .. })));
        assert!(matches!(parse("#near/x(a b)", &model), Err(ParseError::MalformedDistance { .. })));
        assert!(matches!(parse("#near(a b)", &model), Err(ParseError::MalformedDistance { .. })));
        assert!(matches!(parse("#bogus(a)", &model), Err(ParseError::UnknownOperator { .. })));
        assert!(matches!(parse("#wand(a 0.5)", &model), Err(ParseError::ExpectedWeight { .. })));
        assert!(matches!(
            parse("#wand(-0.5 a 1.0 b)", &model),
            Err(ParseError::ExpectedWeight { token }) if token == "-0.5"
        ));
        assert!(matches!(parse("#wsum(1.0 a -2 b)", &model), Err(ParseError::ExpectedWeight { .. })));
        assert!(parse("#wsum(0 a 1 b)", &model).is_ok());
        assert!(matches!(parse("#wand(0.5 a 0.2)", &model), Err(ParseError::DanglingWeight { .. })));
        assert!(matches!(parse("#syn(#and(a b))", &model), Err(ParseError::InvalidOperand { .. })));
        assert!(matches!(parse("#and(a b", &model), Err(ParseError::UnbalancedParentheses { .. })));
        assert!(matches!(parse("a) b", &model), Err(ParseError::TrailingTokens { .. })));
    }

    #[test]
    fn test_display_round_trip() {
        let model = indri();
        for query in [
            "#wand(0.6 #and(a b) 0.4 #wsum(1 c 2 d.title))",
            "#or(#syn(a b) #window/4(c d))",
            "#near/2(a #syn(b c))",
        ] {
            let first = parse(query, &model).unwrap();
            let inner = first.args[0].to_string();
            let second = parse(&inner, &model).unwrap();
            assert_eq!(first.to_string(), second.to_string());
        }
    }
}
