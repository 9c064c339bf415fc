//! Parameter file loading.
//!
//! A parameter file is a list of `key=value` lines. Blank lines and lines
//! starting with `#` are ignored.

use crate::error::{Error, Result};
use crate::query::{Bm25Params, FeedbackParams, IndriParams, RetrievalModel};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Run tag used when the parameter file does not set `runTag`
pub const DEFAULT_RUN_TAG: &str = "run-1";

/// Typed parameters of one batch run
#[derive(Debug, Clone)]
pub struct Params {
    pub index_path: PathBuf,
    pub query_file: PathBuf,
    pub output_path: PathBuf,
    pub run_tag: String,
    pub model: RetrievalModel,
    /// Present when `fb=true`
    pub feedback: Option<FeedbackParams>,
}

impl Params {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let raw = RawParams::parse(content)?;

        let bm25 = Bm25Params {
            k1: raw.number("BM25:k_1", 1.2)?,
            b: raw.number("BM25:b", 0.75)?,
            k3: raw.number("BM25:k_3", 0.0)?,
        };
        let indri = IndriParams {
            lambda: raw.number("Indri:lambda", 0.4)?,
            mu: raw.number("Indri:mu", 2500.0)?,
        };
        let model = RetrievalModel::from_name(raw.required("retrievalAlgorithm")?, bm25, indri)?;

        let feedback = if raw.flag("fb")? {
            // Expansion queries are weighted #wand queries
            if !matches!(model, RetrievalModel::Indri(_)) {
                return Err(Error::config(format!(
                    "fb=true requires the Indri retrieval model, not {}",
                    model.name()
                )));
            }
            let params = FeedbackParams {
                docs: raw.required_number("fbDocs")?,
                terms: raw.required_number("fbTerms")?,
                mu: raw.required_number("fbMu")?,
                orig_weight: raw.required_number("fbOrigWeight")?,
                initial_ranking_file: raw.get("fbInitialRankingFile").map(PathBuf::from),
                expansion_query_file: raw.get("fbExpansionQueryFile").map(PathBuf::from),
            };
            params.validate()?;
            Some(params)
        } else {
            None
        };

        Ok(Self {
            index_path: PathBuf::from(raw.required("indexPath")?),
            query_file: PathBuf::from(raw.required("queryFilePath")?),
            output_path: PathBuf::from(raw.required("trecEvalOutputPath")?),
            run_tag: raw.get("runTag").unwrap_or(DEFAULT_RUN_TAG).to_string(),
            model,
            feedback,
        })
    }
}

/// Untyped `key -> value` view of a parameter file
struct RawParams {
    values: FxHashMap<String, String>,
}

impl RawParams {
    fn parse(content: &str) -> Result<Self> {
        let mut values = FxHashMap::default();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::config(format!(
                    "line {}: expected key=value, found '{}'",
                    line_no + 1,
                    line
                )));
            };
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { values })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::config(format!("required parameter {} is missing", key)))
    }

    fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .parse()
            .map_err(|_| Error::config(format!("invalid value '{}' for {}", value, key)))
    }

    fn number<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Some(value) => Self::parse_value(key, value),
            None => Ok(default),
        }
    }

    fn required_number<T: FromStr>(&self, key: &str) -> Result<T> {
        Self::parse_value(key, self.required(key)?)
    }

    fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key).map(str::to_ascii_lowercase).as_deref() {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(Error::config(format!(
                "invalid value '{}' for {}, expected true or false",
                other, key
            ))),
        }
    }
}
