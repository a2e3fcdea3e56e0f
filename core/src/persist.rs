//! On-disk layout of a built index.
//!
//! ```text
//! index/
//! ├── meta.json        # MetaFile (format version, build state, counts)
//! ├── vocabulary.bin   # Vec<TermEntry>, in term id order
//! ├── inverted.bin     # Vec<Vec<Posting>>, indexed by term id
//! ├── direct.bin       # Vec<Vec<DirectPosting>>, indexed by doc id
//! └── documents.bin    # Vec<DocumentEntry>, indexed by doc id
//! ```
//!
//! Every file is written to a `.tmp` sibling and renamed into place. A save
//! removes `meta.json` before touching the data files and writes it back last,
//! so an interrupted save leaves a directory that does not load.

use crate::error::PersistenceError;
use crate::index::{DirectPosting, DocumentEntry, Index, IndexState, Posting, TermEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub state: IndexState,
    pub num_docs: u32,
    pub num_terms: u32,
    pub num_postings: u64,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn vocabulary(&self) -> PathBuf { self.root.join("vocabulary.bin") }
    pub fn inverted(&self) -> PathBuf { self.root.join("inverted.bin") }
    pub fn direct(&self) -> PathBuf { self.root.join("direct.bin") }
    pub fn documents(&self) -> PathBuf { self.root.join("documents.bin") }

    /// An index exists once its meta file has been written.
    pub fn exists(&self) -> bool {
        self.meta().is_file()
    }
}

/// Persist every structure of `index`. Meta is removed first and written last.
pub fn save_index(paths: &IndexPaths, index: &Index) -> Result<()> {
    create_dir_all(&paths.root)
        .map_err(|source| PersistenceError::Io { path: paths.root.clone(), source })?;
    remove_meta(paths)?;

    save_bincode(&paths.vocabulary(), &index.terms)?;
    save_bincode(&paths.inverted(), &index.inverted)?;
    save_bincode(&paths.direct(), &index.direct)?;
    save_bincode(&paths.documents(), &index.documents)?;

    let meta = MetaFile {
        version: FORMAT_VERSION,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|source| PersistenceError::Timestamp { source })?,
        state: index.state,
        num_docs: index.documents.len() as u32,
        num_terms: index.terms.len() as u32,
        num_postings: count_postings(&index.inverted),
    };
    save_meta(paths, &meta)?;

    tracing::info!(
        root = %paths.root.display(),
        num_docs = meta.num_docs,
        num_terms = meta.num_terms,
        "index saved"
    );
    Ok(())
}

/// Load an index saved by [`save_index`], validating it against its meta file.
pub fn load_index(paths: &IndexPaths) -> Result<Index> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        let reason = format!("unsupported format version {}", meta.version);
        return Err(corrupt(paths.meta(), reason));
    }

    let terms: Vec<TermEntry> = load_bincode(&paths.vocabulary())?;
    let inverted: Vec<Vec<Posting>> = load_bincode(&paths.inverted())?;
    let direct: Vec<Vec<DirectPosting>> = load_bincode(&paths.direct())?;
    let documents: Vec<DocumentEntry> = load_bincode(&paths.documents())?;

    if terms.len() != meta.num_terms as usize || documents.len() != meta.num_docs as usize {
        return Err(corrupt(
            paths.meta(),
            format!(
                "meta records {} terms / {} documents, found {} / {}",
                meta.num_terms,
                meta.num_docs,
                terms.len(),
                documents.len()
            ),
        ));
    }
    let num_postings = count_postings(&inverted);
    if num_postings != meta.num_postings {
        let reason =
            format!("meta records {} postings, found {}", meta.num_postings, num_postings);
        return Err(corrupt(paths.meta(), reason));
    }

    Index::from_parts(paths.root.clone(), meta.state, terms, inverted, direct, documents)
        .map_err(|violation| corrupt(paths.root.clone(), violation.to_string()))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    let json = serde_json::to_string_pretty(meta)
        .map_err(|source| PersistenceError::Json { path: path.clone(), source })?;
    write_atomic(&path, json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let buf = fs::read_to_string(&path)
        .map_err(|source| PersistenceError::Io { path: path.clone(), source })?;
    serde_json::from_str(&buf).map_err(|source| PersistenceError::Json { path, source })
}

fn remove_meta(paths: &IndexPaths) -> Result<()> {
    let path = paths.meta();
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PersistenceError::Io { path, source }),
    }
}

fn count_postings(inverted: &[Vec<Posting>]) -> u64 {
    inverted.iter().map(|l| l.len() as u64).sum()
}

fn save_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)
        .map_err(|source| PersistenceError::Encode { path: path.to_path_buf(), source })?;
    write_atomic(path, &bytes)
}

fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = fs::read(path)
        .map_err(|source| PersistenceError::Io { path: path.to_path_buf(), source })?;
    bincode::deserialize(&buf)
        .map_err(|source| PersistenceError::Encode { path: path.to_path_buf(), source })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|source| PersistenceError::Io { path: tmp.clone(), source })?;
    fs::rename(&tmp, path)
        .map_err(|source| PersistenceError::Io { path: path.to_path_buf(), source })
}

fn corrupt(path: PathBuf, reason: String) -> PersistenceError {
    PersistenceError::Corrupt { path, reason }
}
