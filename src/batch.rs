//! Batch evaluation of a query file.
//!
//! Queries are independent, so they are evaluated in parallel over the shared
//! read-only index. Output is written afterwards in query-file order, which
//! keeps the ranking file identical to a sequential run.

use crate::config::Params;
use crate::error::ParseError;
use crate::index::{IndexAccess, IndexReader};
use crate::output::{self, MAX_RESULTS, TrecRow};
use crate::query::feedback::load_initial_rankings;
use crate::query::{FeedbackEngine, QueryExecutor, ScoreList};
use crate::utils::progress;
use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// One line of a query file
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLine {
    pub qid: String,
    pub text: String,
}

impl QueryLine {
    /// Parse `qid: query text`
    pub fn parse(line: &str) -> std::result::Result<Self, ParseError> {
        let Some((qid, text)) = line.split_once(':') else {
            return Err(ParseError::MissingQueryId {
                line: line.to_string(),
            });
        };
        Ok(Self {
            qid: qid.trim().to_string(),
            text: text.trim().to_string(),
        })
    }
}

pub fn read_queries(path: &Path) -> Result<Vec<QueryLine>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read query file {}", path.display()))?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| QueryLine::parse(line).map_err(anyhow::Error::from))
        .collect()
}

/// Options of a batch run that are not part of the parameter file
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Echo ranking rows to stdout
    pub print: bool,
    pub color: bool,
    pub progress: bool,
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub queries: usize,
    pub rows: usize,
}

struct QueryOutcome {
    /// At most `MAX_RESULTS` rows
    rows: Vec<TrecRow>,
    /// Documents matched before truncation
    matched: usize,
    /// Expansion `#wand` when feedback ran
    expansion: Option<String>,
}

/// Evaluate every query of the parameter file and write the ranking file
pub fn run(params: &Params, options: RunOptions) -> Result<RunSummary> {
    let start = Instant::now();

    let index = IndexReader::open(&params.index_path)
        .with_context(|| format!("Failed to open index {}", params.index_path.display()))?;
    let analyzer = index.analyzer();
    let executor = QueryExecutor::new(&index, &params.model, &analyzer);

    tracing::info!(
        model = %serde_json::to_string(&params.model)?,
        documents = index.num_docs()?,
        "retrieval model initialized"
    );

    let queries = read_queries(&params.query_file)?;

    let initial_rankings = match params
        .feedback
        .as_ref()
        .and_then(|fb| fb.initial_ranking_file.as_deref())
    {
        Some(path) => load_initial_rankings(path, &index)
            .with_context(|| format!("Failed to read initial rankings {}", path.display()))?,
        None => FxHashMap::default(),
    };

    let mut ranking_out = BufWriter::new(
        File::create(&params.output_path)
            .with_context(|| format!("Failed to create {}", params.output_path.display()))?,
    );
    let expansion_path = params
        .feedback
        .as_ref()
        .and_then(|fb| fb.expansion_query_file.as_deref());
    if let Some(path) = expansion_path {
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    }

    let bar = progress::query_bar(queries.len(), options.progress);
    // Collecting into a Result stops scheduling new queries after the first failure
    let outcomes: Result<Vec<QueryOutcome>> = queries
        .par_iter()
        .map(|query| {
            let outcome = evaluate(&executor, params, query, initial_rankings.get(&query.qid))
                .with_context(|| format!("Query {} failed: '{}'", query.qid, query.text));
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            outcome
        })
        .collect();
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    let outcomes = outcomes?;

    let mut summary = RunSummary::default();
    for (query, outcome) in queries.iter().zip(outcomes) {
        tracing::info!(qid = %query.qid, results = outcome.matched, "query evaluated");

        output::write_rows(&mut ranking_out, &outcome.rows)?;
        if options.print {
            output::print_rows(&outcome.rows, options.color)?;
        }
        if let (Some(path), Some(expansion)) = (expansion_path, &outcome.expansion) {
            append_expansion(path, &query.qid, expansion)?;
        }

        summary.queries += 1;
        summary.rows += outcome.rows.len();
    }
    ranking_out.flush()?;

    tracing::info!(
        queries = summary.queries,
        rows = summary.rows,
        elapsed_ms = start.elapsed().as_millis() as u64,
        output = %params.output_path.display(),
        "run complete"
    );

    Ok(summary)
}

fn evaluate(
    executor: &QueryExecutor<'_>,
    params: &Params,
    query: &QueryLine,
    initial: Option<&ScoreList>,
) -> Result<QueryOutcome> {
    let (results, expansion) = match &params.feedback {
        None => (executor.execute(&query.text)?, None),
        Some(fb) => {
            if initial.is_none() && fb.initial_ranking_file.is_some() {
                tracing::warn!(qid = %query.qid, "no initial ranking, retrieving one");
            }
            let expansion = FeedbackEngine::new(executor, fb).run(&query.text, initial)?;
            (expansion.results, Some(expansion.expansion_query))
        }
    };

    // Only the written rows outlive the evaluation
    let rows = output::trec_rows(
        &query.qid,
        &results,
        executor.index(),
        &params.run_tag,
        MAX_RESULTS,
    )?;
    Ok(QueryOutcome {
        rows,
        matched: results.len(),
        expansion,
    })
}

fn append_expansion(path: &Path, qid: &str, expansion: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{}: {}", qid, expansion)?;
    Ok(())
}

/// Rows of a single query, for the `search` command
pub fn search(
    executor: &QueryExecutor<'_>,
    index: &dyn IndexAccess,
    query: &str,
    limit: usize,
) -> Result<Vec<TrecRow>> {
    let results = executor.execute(query)?;
    Ok(output::trec_rows("0", &results, index, "search", limit)?)
}
