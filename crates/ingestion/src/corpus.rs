//! Corpus reader
//!
//! Reads already-parsed paper records, one JSON object per line. Field names
//! follow the CORD-19 metadata (`cord_uid`, `abstract`) with plain aliases.
//! Malformed records are excluded and counted; they never abort a build.

use crate::errors::IngestionError;
use chrono::NaiveDate;
use risotto_common::errors::AppError;
use risotto_common::metrics;
use risotto_common::models::{Document, DocumentId};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Authors as either "Last, First; Last, First" or a JSON list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Authors {
    Joined(String),
    List(Vec<String>),
}

impl Authors {
    fn into_vec(self) -> Vec<String> {
        let names: Vec<String> = match self {
            Authors::Joined(s) => s.split(';').map(str::to_string).collect(),
            Authors::List(list) => list,
        };
        names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// One input line before validation
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "cord_uid", default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Option<Authors>,
    #[serde(default)]
    publish_time: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(alias = "abstract", default)]
    body: Option<String>,
    #[serde(default)]
    references: Vec<String>,
}

impl RawRecord {
    fn into_document(self, record: usize) -> Result<Document, AppError> {
        let id = self
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::MalformedDocument {
                record,
                message: "record has no id".to_string(),
            })?;

        Ok(Document {
            id: DocumentId::new(id),
            title: self.title.unwrap_or_default().trim().to_string(),
            authors: self.authors.map(Authors::into_vec).unwrap_or_default(),
            publish_time: self.publish_time.as_deref().and_then(parse_publish_time),
            doi: self
                .doi
                .map(|d| d.trim().trim_start_matches("https://doi.org/").to_string())
                .filter(|d| !d.is_empty()),
            body: self.body.unwrap_or_default(),
            references: self
                .references
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .map(DocumentId::new)
                .collect::<BTreeSet<_>>(),
        })
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM` and `YYYY`; anything else is unknown
fn parse_publish_time(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01-01", raw), "%Y-%m-%d"))
        .ok()
}

/// Parsed corpus plus what was left out
#[derive(Debug, Default)]
pub struct CorpusLoad {
    pub documents: Vec<Document>,
    /// Lines that were not valid JSON or had no id
    pub rejected: Vec<AppError>,
    /// Records whose id was already seen; the first one is kept
    pub duplicates: usize,
}

impl CorpusLoad {
    pub fn excluded(&self) -> usize {
        self.rejected.len()
    }

    /// Parse JSON-lines text. Blank lines are ignored.
    pub fn parse(text: &str) -> Self {
        let mut load = CorpusLoad::default();
        let mut seen = HashSet::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record = line_no + 1;
            let document = serde_json::from_str::<RawRecord>(line)
                .map_err(|e| AppError::MalformedDocument {
                    record,
                    message: e.to_string(),
                })
                .and_then(|raw| raw.into_document(record));

            match document {
                Ok(doc) if seen.insert(doc.id.clone()) => load.documents.push(doc),
                Ok(doc) => {
                    warn!(record, id = %doc.id, "Duplicate id, keeping first record");
                    load.duplicates += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Excluding record");
                    load.rejected.push(e);
                }
            }
        }

        metrics::record_ingestion(load.documents.len(), load.excluded() + load.duplicates);
        load
    }

    /// Read and parse a JSON-lines file
    pub async fn read(path: &Path) -> Result<Self, IngestionError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| IngestionError::CorpusRead {
                path: path.display().to_string(),
                source,
            })?;

        let load = Self::parse(&text);
        info!(
            path = %path.display(),
            documents = load.documents.len(),
            excluded = load.excluded(),
            duplicates = load.duplicates,
            "Corpus loaded"
        );
        Ok(load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parses_cord_style_record() {
        let load = CorpusLoad::parse(
            r#"{"cord_uid":"ug7v899j","title":"Clinical features","authors":"Madani, Tariq A; Al-Ghamdi, Aisha A","publish_time":"2001-07-04","doi":"10.1186/1471-2334-1-6","abstract":"OBJECTIVE: This retrospective chart review...","references":["02tnwd4m"]}"#,
        );

        assert_eq!(load.documents.len(), 1);
        let doc = &load.documents[0];
        assert_eq!(doc.id.as_str(), "ug7v899j");
        assert_eq!(doc.authors, vec!["Madani, Tariq A", "Al-Ghamdi, Aisha A"]);
        assert_eq!(doc.publish_time, NaiveDate::from_ymd_opt(2001, 7, 4));
        assert!(doc.body.starts_with("OBJECTIVE"));
        assert!(doc.references.contains(&DocumentId::new("02tnwd4m")));
    }

    #[test]
    fn test_excludes_malformed_records() {
        let text = r#"
{"id":"a","title":"A","authors":["X","Y"]}
{"title":"no id"}
{"id":"   "}
not json at all
{"id":"b","publish_time":"2020"}
{"id":"a","title":"A again"}
"#;
        let load = CorpusLoad::parse(text);

        assert_eq!(load.documents.len(), 2);
        assert_eq!(load.excluded(), 3);
        assert_eq!(load.duplicates, 1);
        // records are numbered from the first line, blank lines included
        let records: Vec<usize> = load
            .rejected
            .iter()
            .map(|e| match e {
                AppError::MalformedDocument { record, .. } => *record,
                other => panic!("unexpected error {other}"),
            })
            .collect();
        assert_eq!(records, vec![3, 4, 5]);
        assert!(load.rejected.iter().all(AppError::is_caller_error));
        assert_eq!(load.documents[0].title, "A");
        assert_eq!(load.documents[1].publish_time, NaiveDate::from_ymd_opt(2020, 1, 1));
    }

    #[test]
    fn test_publish_time_formats() {
        assert_eq!(parse_publish_time("2020-03"), NaiveDate::from_ymd_opt(2020, 3, 1));
        assert_eq!(parse_publish_time("2019-12-31"), NaiveDate::from_ymd_opt(2019, 12, 31));
        assert_eq!(parse_publish_time("spring 2020"), None);
    }

    #[tokio::test]
    async fn test_read_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id":"a","abstract":"Body."}}"#).unwrap();
        writeln!(file, r#"{{"id":"b","references":["a"]}}"#).unwrap();

        let load = CorpusLoad::read(file.path()).await.unwrap();
        assert_eq!(load.documents.len(), 2);
        assert_eq!(load.documents[0].body, "Body.");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = CorpusLoad::read(Path::new("/nonexistent/corpus.jsonl")).await.unwrap_err();
        assert!(matches!(err, IngestionError::CorpusRead { .. }));
    }
}
