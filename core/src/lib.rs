//! Two-pass construction of a static tf-idf index: vocabulary, inverted and
//! direct postings, and document norms, persisted to a directory.

pub mod builder;
pub mod collection;
pub mod error;
pub mod index;
pub mod persist;
pub mod tokenizer;

pub use builder::{
    BuildSummary, DocumentOutcome, FirstPassReport, Indexer, IndexerConfig, SecondPassReport,
    SkippedDocument,
};
pub use error::{DocumentReadError, IndexError, InvariantViolation, PersistenceError, Result};
pub use index::*;
