//! Corpus file loading
//!
//! Accepts a CSV file with a header row (by `.csv` extension), a JSON array,
//! or JSON Lines of `{"text": ..., "category": ...}`. The Spanish column names
//! `texto`/`categoria` are accepted in every format.

use super::NewEntry;
use crate::error::{Result, TextsimError};
use serde::Deserialize;
use std::path::Path;

/// One record as it appears on disk
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(alias = "texto")]
    pub text: String,
    #[serde(default, alias = "categoria")]
    pub category: Option<String>,
}

impl From<RawRecord> for NewEntry {
    fn from(record: RawRecord) -> Self {
        NewEntry {
            text: record.text,
            category: record.category.filter(|c| !c.trim().is_empty()),
        }
    }
}

/// Read every usable record from a corpus file
///
/// Records with blank text are skipped and counted in a warning.
pub fn load_file(path: &Path) -> Result<Vec<NewEntry>> {
    let records = if is_csv(path) {
        parse_csv(path)?
    } else {
        let content = std::fs::read_to_string(path).map_err(|e| TextsimError::Io {
            source: e,
            context: format!("Failed to read corpus file: {:?}", path),
        })?;
        parse_records(&content)?
    };
    let total = records.len();

    let entries: Vec<NewEntry> = records
        .into_iter()
        .filter(|r| !r.text.trim().is_empty())
        .map(NewEntry::from)
        .collect();

    if entries.len() < total {
        tracing::warn!(
            "Skipped {} records with empty text in {:?}",
            total - entries.len(),
            path
        );
    }

    tracing::info!("Loaded {} records from {:?}", entries.len(), path);

    Ok(entries)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn parse_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| TextsimError::Csv {
            source: e,
            context: format!("Failed to open corpus CSV: {:?}", path),
        })?;

    reader
        .deserialize::<RawRecord>()
        .enumerate()
        .map(|(n, record)| {
            record.map_err(|e| TextsimError::Csv {
                source: e,
                // Header is line 1
                context: format!("Failed to parse corpus CSV line {}", n + 2),
            })
        })
        .collect()
}

fn parse_records(content: &str) -> Result<Vec<RawRecord>> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).map_err(|e| TextsimError::Json {
            source: e,
            context: "Failed to parse corpus JSON array".to_string(),
        });
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| TextsimError::Json {
                source: e,
                context: format!("Failed to parse corpus line {}", n + 1),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_lines_with_aliases() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corpus.jsonl");
        std::fs::write(
            &path,
            "{\"texto\": \"Nunca te rindas\", \"categoria\": \"motivacional\"}\n\
             \n\
             {\"text\": \"Ríe y sonríe\"}\n",
        )
        .unwrap();

        let entries = load_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category.as_deref(), Some("motivacional"));
        assert_eq!(entries[1].category, None);
    }

    #[test]
    fn test_json_array_skips_blank() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"[{"text": "uno", "category": "a"}, {"text": "  ", "category": "b"}]"#,
        )
        .unwrap();

        let entries = load_file(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "uno");
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corpus.jsonl");
        std::fs::write(&path, "{\"text\": \"ok\"}\nnot json\n").unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_csv_with_spanish_headers() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("texto_extraido_categorizado.csv");
        std::fs::write(
            &path,
            "texto,categoria\n\
             Nunca te rindas,motivacional\n\
             \"El amor, todo lo puede\",amor\n\
             Ríe y sonríe,\n\
             \"   \",humor\n",
        )
        .unwrap();

        let entries = load_file(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], NewEntry::new("Nunca te rindas", "motivacional"));
        assert_eq!(entries[1].text, "El amor, todo lo puede");
        assert_eq!(entries[2].category, None);
    }

    #[test]
    fn test_csv_without_category_column() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("frases.CSV");
        std::fs::write(&path, "text\nSigue adelante\n").unwrap();

        let entries = load_file(&path).unwrap();
        assert_eq!(entries, vec![NewEntry::uncategorized("Sigue adelante")]);
    }

    #[test]
    fn test_csv_bad_record_reports_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corpus.csv");
        std::fs::write(&path, "categoria\nhumor\n").unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, TextsimError::Csv { .. }));
        assert!(err.to_string().contains("line 2"));
    }
}
