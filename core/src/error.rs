//! Error types for index construction and persistence.

use crate::index::{DocId, IndexState, TermId};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Top-level error returned by index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The collection root could not be enumerated
    #[error("cannot read collection at {path:?}: {source}")]
    Collection {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// A single document could not be read. Never fatal to a build.
#[derive(Debug, Error)]
pub enum DocumentReadError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} is not valid UTF-8: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// A broken index invariant. Surfacing one is a programming error and aborts the build.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// An operation was invoked in the wrong build state
    #[error("{operation} requires state {expected:?}, index is {found:?}")]
    PhaseOrder {
        operation: &'static str,
        expected: IndexState,
        found: IndexState,
    },

    #[error("term id {term_id} out of range (vocabulary has {len} terms)")]
    TermOutOfRange { term_id: TermId, len: usize },

    #[error("document id {doc_id} out of range ({len} documents)")]
    DocumentOutOfRange { doc_id: DocId, len: usize },

    /// A posting would break the ascending doc id order of a posting list
    #[error("posting for document {doc_id} after document {last} in term {term_id}")]
    PostingOrder {
        term_id: TermId,
        doc_id: DocId,
        last: DocId,
    },

    #[error("term {term_id} has no postings")]
    EmptyPostingList { term_id: TermId },

    #[error("{what}: {left} != {right}")]
    CardinalityMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    /// Direct and inverted postings disagree
    #[error("direct and inverted index disagree on term {term_id}, document {doc_id}")]
    DirectMismatch { term_id: TermId, doc_id: DocId },

    #[error("term {term:?} registered twice")]
    DuplicateTerm { term: String },

    /// A stored norm is not the length of the document's weight vector
    #[error("norm of document {doc_id} is {stored}, its weights give {computed}")]
    NormMismatch { doc_id: DocId, stored: f64, computed: f64 },

    #[error("no {what} ids left: {len} already allocated")]
    IdSpaceExhausted { what: &'static str, len: usize },
}

/// Failure writing or reading the on-disk index.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bincode error on {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("json error on {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot format build timestamp: {source}")]
    Timestamp {
        #[source]
        source: time::error::Format,
    },

    #[error("corrupt index at {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}
