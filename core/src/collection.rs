//! Enumerating and reading the documents of a collection.

use crate::error::{DocumentReadError, IndexError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A document that can be read from a [`DocumentSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Name recorded in the document table
    pub name: String,
    pub path: PathBuf,
}

/// Where the first pass gets its documents from.
pub trait DocumentSource {
    /// Candidate documents, in the order they will be indexed.
    fn documents(&self) -> Result<Vec<DocumentRef>>;

    fn read(&self, doc: &DocumentRef) -> std::result::Result<String, DocumentReadError>;
}

/// A directory of document files, one level of subdirectories deep:
/// `root/<group>/<name>.<extension>`.
///
/// Hidden top-level entries are skipped. Files directly under the root are ignored.
#[derive(Debug, Clone)]
pub struct FsCollection {
    root: PathBuf,
    extension: String,
}

impl FsCollection {
    pub const DEFAULT_EXTENSION: &'static str = "html";

    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_extension(root, Self::DEFAULT_EXTENSION)
    }

    pub fn with_extension<P: AsRef<Path>>(root: P, extension: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn accepts(&self, path: &Path) -> bool {
        path.extension().and_then(|s| s.to_str()) == Some(self.extension.as_str())
    }
}

fn is_hidden_group(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_name().to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

impl DocumentSource for FsCollection {
    fn documents(&self) -> Result<Vec<DocumentRef>> {
        // An unreadable root is fatal.
        fs::read_dir(&self.root)
            .map_err(|source| IndexError::Collection { path: self.root.clone(), source })?;

        let walker = WalkDir::new(&self.root)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden_group(e));

        let mut docs = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable collection entry");
                    continue;
                }
            };
            let path = entry.path();
            if entry.depth() != 2 || !entry.file_type().is_file() || !self.accepts(path) {
                continue;
            }
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            docs.push(DocumentRef { name, path: path.to_path_buf() });
        }
        Ok(docs)
    }

    fn read(&self, doc: &DocumentRef) -> std::result::Result<String, DocumentReadError> {
        let path = &doc.path;
        let bytes =
            fs::read(path).map_err(|source| DocumentReadError::Io { path: path.clone(), source })?;
        String::from_utf8(bytes)
            .map_err(|source| DocumentReadError::Decode { path: path.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(docs: &[DocumentRef]) -> Vec<&str> {
        docs.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn walks_visible_groups_in_name_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("b/2.html"), "x").unwrap();
        fs::write(root.join("b/1.html"), "x").unwrap();
        fs::write(root.join("a/9.html"), "x").unwrap();
        fs::write(root.join("a/notes.txt"), "x").unwrap();
        fs::write(root.join(".git/hidden.html"), "x").unwrap();
        fs::write(root.join("top.html"), "x").unwrap();

        let docs = FsCollection::new(root).documents().unwrap();
        assert_eq!(names(&docs), vec!["9", "1", "2"]);
    }

    #[test]
    fn extension_is_configurable() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("g")).unwrap();
        fs::write(dir.path().join("g/a.txt"), "x").unwrap();
        fs::write(dir.path().join("g/b.html"), "x").unwrap();
        let docs = FsCollection::with_extension(dir.path(), ".txt").documents().unwrap();
        assert_eq!(names(&docs), vec!["a"]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let err = FsCollection::new(dir.path().join("nope")).documents().unwrap_err();
        assert!(matches!(err, IndexError::Collection { .. }));
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("g")).unwrap();
        fs::write(dir.path().join("g/bad.html"), [0xff, 0xfe, 0x00]).unwrap();
        let coll = FsCollection::new(dir.path());
        let docs = coll.documents().unwrap();
        assert!(matches!(coll.read(&docs[0]), Err(DocumentReadError::Decode { .. })));
    }
}
