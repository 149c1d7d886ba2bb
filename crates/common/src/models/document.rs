//! Document entity

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// Unique document key (e.g. a CORD-19 `cord_uid`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A parsed paper. Immutable after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,

    pub title: String,

    pub authors: Vec<String>,

    pub publish_time: Option<NaiveDate>,

    /// External identifier, without the resolver prefix
    pub doi: Option<String>,

    /// Abstract or body text
    pub body: String,

    /// Outbound references; unknown ids are dropped when the graph is built
    pub references: BTreeSet<DocumentId>,
}

impl Document {
    /// Create a document with only an id
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            authors: Vec::new(),
            publish_time: None,
            doi: None,
            body: String::new(),
            references: BTreeSet::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add outbound references
    pub fn citing<I, T>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DocumentId>,
    {
        self.references.extend(references.into_iter().map(Into::into));
        self
    }

    /// Metadata shown next to a ranked result
    pub fn summary(&self) -> PaperSummary {
        PaperSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            authors: self.authors.clone(),
            publish_time: self.publish_time,
            doi: self.doi.clone(),
        }
    }
}

/// Display metadata for a paper, without the body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub id: DocumentId,
    pub title: String,
    pub authors: Vec<String>,
    pub publish_time: Option<NaiveDate>,
    pub doi: Option<String>,
}

impl PaperSummary {
    /// Resolver link for the DOI, if any
    pub fn doi_url(&self) -> Option<String> {
        self.doi.as_ref().map(|doi| format!("https://doi.org/{}", doi))
    }
}
