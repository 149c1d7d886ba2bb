//! Data model: documents and the tables derived from them

mod document;
mod tables;

pub use document::{Document, DocumentId, PaperSummary};
pub use tables::{
    fingerprint, EmbeddingTable, ImportanceTable, PaperTable, RelevanceMetric, RelevanceTable,
    TableMeta,
};
