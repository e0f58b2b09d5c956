// Vocabulary and allowed-name lists for the embedding probe

use crate::error::{GraphError, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

/// Column holding the vocabulary entries
pub const WORD_COLUMN: &str = "Word";

/// Read the `Word` column of a tab-separated vocabulary file
///
/// The row order is the embedding row order.
pub fn read_vocabulary(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| GraphError::io(path, e))?;
    parse_vocabulary(file, path)
}

fn parse_vocabulary<R: Read>(input: R, path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .from_reader(input);
    let column = reader
        .headers()?
        .iter()
        .position(|h| h == WORD_COLUMN)
        .ok_or_else(|| GraphError::MissingColumn {
            column: WORD_COLUMN.to_string(),
            path: path.to_path_buf(),
        })?;

    let mut words = Vec::new();
    for record in reader.records() {
        let record = record?;
        words.push(record.get(column).unwrap_or_default().to_string());
    }
    Ok(words)
}

/// Write a single-column vocabulary file readable by [`read_vocabulary`]
pub fn write_vocabulary(path: &Path, words: &[String]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| GraphError::io(path, e))?;
    let mut body = String::from(WORD_COLUMN);
    body.push('\n');
    for word in words {
        body.push_str(word);
        body.push('\n');
    }
    file.write_all(body.as_bytes())
        .map_err(|e| GraphError::io(path, e))
}

/// Read a newline-separated list of names, skipping blank lines
pub fn read_allowed_names(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Pair each allowed name found in the vocabulary with its row
///
/// Names missing from the vocabulary are dropped; the order of `allowed` is
/// kept.
pub fn allowed_name_ids(vocabulary: &[String], allowed: &[String]) -> Vec<(String, usize)> {
    let index: HashMap<&str, usize> = vocabulary
        .iter()
        .enumerate()
        .map(|(i, w)| (w.as_str(), i))
        .collect();
    allowed
        .iter()
        .filter_map(|name| index.get(name.as_str()).map(|&row| (name.clone(), row)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_vocabulary_word_column() {
        let tsv = "Count\tWord\n5\tpkg.a.run\n2\tpkg.b.stop\n";
        let words = parse_vocabulary(tsv.as_bytes(), Path::new("voc.tsv")).unwrap();
        assert_eq!(words, vec!["pkg.a.run", "pkg.b.stop"]);
    }

    #[test]
    fn test_missing_word_column() {
        let err = parse_vocabulary("Name\nx\n".as_bytes(), Path::new("voc.tsv")).unwrap_err();
        assert!(matches!(err, GraphError::MissingColumn { .. }));
    }

    #[test]
    fn test_allowed_name_ids_skips_unknown() {
        let vocab: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let allowed: Vec<String> = ["c", "zz", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            allowed_name_ids(&vocab, &allowed),
            vec![("c".to_string(), 2), ("a".to_string(), 0)]
        );
    }

    #[test]
    fn test_vocabulary_file_round_trip() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("voc.tsv");
        let words = vec!["run".to_string(), "stop".to_string()];
        write_vocabulary(&path, &words).expect("write");
        assert_eq!(read_vocabulary(&path).expect("read"), words);

        let allowed = dir.path().join("allowed.txt");
        fs::write(&allowed, "run\n\nstop\n").expect("write allowed");
        assert_eq!(read_allowed_names(&allowed).expect("read allowed"), words);
    }
}
