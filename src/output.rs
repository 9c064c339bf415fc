//! TREC-format ranking output

use crate::error::Result;
use crate::index::IndexAccess;
use crate::query::ScoreList;
use std::fmt;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Rows written per query
pub const MAX_RESULTS: usize = 100;

/// Document id of the placeholder row of a query without results
pub const DUMMY_DOC: &str = "dummy";

/// One `qid Q0 docid rank score tag` line
#[derive(Debug, Clone, PartialEq)]
pub struct TrecRow {
    pub qid: String,
    pub doc: String,
    pub rank: usize,
    pub score: f64,
    pub run_tag: String,
}

impl fmt::Display for TrecRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\tQ0\t{}\t{}\t{}\t{}",
            self.qid, self.doc, self.rank, self.score, self.run_tag
        )
    }
}

/// Rows for the best `limit` documents of a sorted result list, or a single
/// placeholder row when there are none.
pub fn trec_rows(
    qid: &str,
    results: &ScoreList,
    index: &dyn IndexAccess,
    run_tag: &str,
    limit: usize,
) -> Result<Vec<TrecRow>> {
    if results.is_empty() {
        return Ok(vec![TrecRow {
            qid: qid.to_string(),
            doc: DUMMY_DOC.to_string(),
            rank: 1,
            score: 0.0,
            run_tag: run_tag.to_string(),
        }]);
    }

    results
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, scored)| {
            Ok(TrecRow {
                qid: qid.to_string(),
                doc: index.external_doc_id(scored.doc_id)?,
                rank: i + 1,
                score: scored.score,
                run_tag: run_tag.to_string(),
            })
        })
        .collect()
}

pub fn write_rows<W: Write>(out: &mut W, rows: &[TrecRow]) -> io::Result<()> {
    for row in rows {
        writeln!(out, "{}", row)?;
    }
    Ok(())
}

/// Print rows to stdout with the query id, document and score highlighted
pub fn print_rows(rows: &[TrecRow], color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);

    for row in rows {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(stdout, "{}", row.qid)?;
        stdout.reset()?;
        write!(stdout, "\tQ0\t")?;

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        write!(stdout, "{}", row.doc)?;
        stdout.reset()?;
        write!(stdout, "\t{}\t", row.rank)?;

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(stdout, "{}", row.score)?;
        stdout.reset()?;
        writeln!(stdout, "\t{}", row.run_tag)?;
    }

    Ok(())
}
