use crate::index::reader::{IndexAccess, IndexReader};
use crate::index::types::Field;
use anyhow::{Context, Result};
use std::path::Path;

/// Display index statistics
pub fn show_stats(index_path: &Path) -> Result<()> {
    let reader = IndexReader::open(index_path)
        .with_context(|| format!("Failed to open index {}", index_path.display()))?;

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index location:   {}", index_path.display());
    println!("Document count:   {}", reader.num_docs()?);
    println!("Stopwords:        {}", reader.analyzer().stopword_count());

    println!();
    println!(
        "  {:10} {:>10} {:>14} {:>12} {:>12}",
        "field", "docs", "tokens", "avg length", "vocabulary"
    );

    for field in Field::ALL {
        let docs = reader.doc_count(field)?;
        if docs == 0 {
            continue;
        }
        let tokens = reader.sum_of_field_lengths(field)?;
        println!(
            "  {:10} {:>10} {:>14} {:>12.2} {:>12}",
            field.as_str(),
            docs,
            tokens,
            average_length(tokens, docs),
            reader.vocabulary_size(field)
        );
    }

    Ok(())
}

/// Mean field length over documents that have the field
fn average_length(tokens: u64, docs: u32) -> f64 {
    if docs == 0 {
        0.0
    } else {
        tokens as f64 / docs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_length() {
        assert_eq!(average_length(0, 0), 0.0);
        assert_eq!(average_length(10, 4), 2.5);
    }
}
