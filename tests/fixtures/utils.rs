//! Temp-dir workspaces holding an index, a query file and a parameter file

#![allow(dead_code)]

use qeval::index::{Field, IndexFile, StoredDocument};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Stopwords recorded in every fixture index
pub const STOPWORDS: [&str; 2] = ["the", "of"];

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `index.json` from `(external id, [(field, text)])` documents
    pub fn write_index(&self, docs: &[(&str, &[(Field, &str)])]) -> PathBuf {
        let documents = docs
            .iter()
            .map(|(id, fields)| {
                fields.iter().fold(StoredDocument::new(*id), |doc, (field, text)| {
                    doc.with_field(*field, text.split_whitespace())
                })
            })
            .collect();
        let index = IndexFile {
            stopwords: STOPWORDS.iter().map(|s| s.to_string()).collect(),
            documents,
        };

        let path = self.path("index.json");
        fs::write(&path, serde_json::to_string(&index).expect("Failed to encode index"))
            .expect("Failed to write index");
        path
    }

    /// Index where every document only has a body
    pub fn write_body_index(&self, docs: &[(&str, &str)]) -> PathBuf {
        let docs: Vec<(&str, Vec<(Field, &str)>)> = docs
            .iter()
            .map(|(id, body)| (*id, vec![(Field::Body, *body)]))
            .collect();
        let borrowed: Vec<(&str, &[(Field, &str)])> =
            docs.iter().map(|(id, fields)| (*id, fields.as_slice())).collect();
        self.write_index(&borrowed)
    }

    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    /// Parameter file pointing at this workspace's index, `queries.txt` and
    /// `ranking.teIn`, plus `extra` key=value lines
    pub fn write_params(&self, algorithm: &str, extra: &str) -> PathBuf {
        let content = format!(
            "indexPath={}\nqueryFilePath={}\ntrecEvalOutputPath={}\nretrievalAlgorithm={}\n{}",
            self.path("index.json").display(),
            self.path("queries.txt").display(),
            self.path("ranking.teIn").display(),
            algorithm,
            extra
        );
        self.write_file("params.txt", &content)
    }

    /// Ranking file rows split on tabs
    pub fn ranking_rows(&self) -> Vec<Vec<String>> {
        fs::read_to_string(self.path("ranking.teIn"))
            .expect("Failed to read ranking file")
            .lines()
            .map(|line| line.split('\t').map(str::to_string).collect())
            .collect()
    }
}
