//! RISOTTO batch builder
//!
//! Reads a parsed corpus and writes the tables the search side serves.

pub mod corpus;
pub mod errors;
pub mod processor;

pub use corpus::CorpusLoad;
pub use errors::IngestionError;
pub use processor::{ArtifactBuilder, BuildOptions, BuildReport, Stage};
