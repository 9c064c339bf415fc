pub mod executor;
pub mod feedback;
pub mod model;
pub mod node;
pub mod optimizer;
pub mod parser;
mod proximity;
pub mod score_list;
pub mod scorer;

pub use executor::QueryExecutor;
pub use feedback::{Expansion, ExpansionTerm, FeedbackEngine, FeedbackParams};
pub use model::{Bm25Params, IndriParams, RetrievalModel};
pub use node::{NodeKind, QueryNode};
pub use optimizer::optimize;
pub use parser::parse_query;
pub use score_list::{ScoreList, ScoredDoc};
pub use scorer::EvalContext;
