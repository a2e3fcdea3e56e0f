use crate::error::{InvariantViolation, PersistenceError, Result};
use crate::persist::{self, IndexPaths};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub type TermId = u32;
pub type DocId = u32;

/// Build state of an [`Index`]. Transitions only move forward:
/// `Empty -> RawFrequencies -> Weighted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    /// Created, first pass may run
    Empty,
    /// First pass done: posting weights hold raw term frequencies
    RawFrequencies,
    /// Second pass done: weights are tf-idf, direct index and norms are final
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub text: String,
    pub idf: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f64, // raw tf until the second pass, tf-idf after
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectPosting {
    pub term_id: TermId,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub name: String,
    /// Euclidean length of the document's weight vector once weighted
    pub norm: f64,
}

/// Counts reported after a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStatistics {
    pub state: IndexState,
    pub documents: usize,
    pub terms: usize,
    pub inverted_postings: usize,
    pub direct_postings: usize,
    /// Registered documents that contributed no postings
    pub empty_documents: usize,
}

impl fmt::Display for IndexStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  - State: {:?}", self.state)?;
        writeln!(f, "  - Documents: {} ({} without terms)", self.documents, self.empty_documents)?;
        writeln!(f, "  - Terms: {}", self.terms)?;
        writeln!(f, "  - Inverted postings: {}", self.inverted_postings)?;
        write!(f, "  - Direct postings: {}", self.direct_postings)
    }
}

/// The on-disk searchable index: vocabulary, inverted and direct postings, documents.
///
/// Term ids and document ids are positions in the owning vectors. The term map,
/// the term table and the inverted index always grow together.
#[derive(Debug)]
pub struct Index {
    pub(crate) path: PathBuf,
    pub(crate) state: IndexState,
    pub(crate) dictionary: HashMap<String, TermId>,
    pub(crate) terms: Vec<TermEntry>,
    pub(crate) inverted: Vec<Vec<Posting>>,
    pub(crate) direct: Vec<Vec<DirectPosting>>,
    pub(crate) documents: Vec<DocumentEntry>,
}

impl Index {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: IndexState::Empty,
            dictionary: HashMap::new(),
            terms: Vec::new(),
            inverted: Vec::new(),
            direct: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Reassemble an index from its persisted structures, rebuilding the term map.
    pub(crate) fn from_parts(
        path: PathBuf,
        state: IndexState,
        terms: Vec<TermEntry>,
        inverted: Vec<Vec<Posting>>,
        direct: Vec<Vec<DirectPosting>>,
        documents: Vec<DocumentEntry>,
    ) -> std::result::Result<Self, InvariantViolation> {
        let mut dictionary = HashMap::with_capacity(terms.len());
        for (term_id, entry) in terms.iter().enumerate() {
            if dictionary.insert(entry.text.clone(), term_id as TermId).is_some() {
                return Err(InvariantViolation::DuplicateTerm { term: entry.text.clone() });
            }
        }
        let index = Self { path, state, dictionary, terms, inverted, direct, documents };
        index.check_invariants()?;
        Ok(index)
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn state(&self) -> IndexState { self.state }
    pub fn num_documents(&self) -> usize { self.documents.len() }
    pub fn num_terms(&self) -> usize { self.terms.len() }
    pub fn terms(&self) -> &[TermEntry] { &self.terms }
    pub fn documents(&self) -> &[DocumentEntry] { &self.documents }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    pub fn term(&self, term_id: TermId) -> Option<&TermEntry> {
        self.terms.get(term_id as usize)
    }

    pub fn postings(&self, term_id: TermId) -> Option<&[Posting]> {
        self.inverted.get(term_id as usize).map(Vec::as_slice)
    }

    pub fn direct_postings(&self, doc_id: DocId) -> Option<&[DirectPosting]> {
        self.direct.get(doc_id as usize).map(Vec::as_slice)
    }

    pub fn document(&self, doc_id: DocId) -> Option<&DocumentEntry> {
        self.documents.get(doc_id as usize)
    }

    pub(crate) fn expect_state(
        &self,
        operation: &'static str,
        expected: IndexState,
    ) -> std::result::Result<(), InvariantViolation> {
        if self.state == expected {
            Ok(())
        } else {
            Err(InvariantViolation::PhaseOrder { operation, expected, found: self.state })
        }
    }

    pub(crate) fn advance(
        &mut self,
        operation: &'static str,
        from: IndexState,
        to: IndexState,
    ) -> std::result::Result<(), InvariantViolation> {
        self.expect_state(operation, from)?;
        self.state = to;
        Ok(())
    }

    /// Register a document and return its sequential id.
    pub fn add_document(&mut self, name: impl Into<String>) -> Result<DocId> {
        self.expect_state("add_document", IndexState::Empty)?;
        let doc_id = next_id("document", self.documents.len())?;
        self.documents.push(DocumentEntry { name: name.into(), norm: 0.0 });
        self.direct.push(Vec::new());
        Ok(doc_id)
    }

    /// Id of `term`, allocating the next one on first sight.
    pub fn term_id_for(&mut self, term: &str) -> Result<TermId> {
        if let Some(&term_id) = self.dictionary.get(term) {
            return Ok(term_id);
        }
        self.expect_state("term_id_for", IndexState::Empty)?;
        let term_id = next_id("term", self.terms.len())?;
        self.dictionary.insert(term.to_string(), term_id);
        self.terms.push(TermEntry { text: term.to_string(), idf: 0.0 });
        self.inverted.push(Vec::new());
        Ok(term_id)
    }

    /// Count one occurrence of `term_id` in `doc_id`.
    ///
    /// Documents must arrive in ascending id order per term; a new posting is
    /// opened only when the last one belongs to an earlier document.
    pub fn add_occurrence(&mut self, term_id: TermId, doc_id: DocId) -> Result<()> {
        self.expect_state("add_occurrence", IndexState::Empty)?;
        if doc_id as usize >= self.documents.len() {
            let len = self.documents.len();
            return Err(InvariantViolation::DocumentOutOfRange { doc_id, len }.into());
        }
        let len = self.inverted.len();
        let list = self
            .inverted
            .get_mut(term_id as usize)
            .ok_or(InvariantViolation::TermOutOfRange { term_id, len })?;
        match list.last().map(|p| p.doc_id) {
            Some(last) if last == doc_id => {}
            Some(last) if last > doc_id => {
                return Err(InvariantViolation::PostingOrder { term_id, doc_id, last }.into());
            }
            _ => list.push(Posting { doc_id, weight: 0.0 }),
        }
        if let Some(last) = list.last_mut() {
            last.weight += 1.0;
        }
        Ok(())
    }

    /// Freeze raw frequencies: no more documents, terms or occurrences.
    pub fn finish_first_pass(&mut self) -> Result<()> {
        self.advance("first_pass", IndexState::Empty, IndexState::RawFrequencies)?;
        Ok(())
    }

    /// Write all structures under the index path.
    pub fn save(&self) -> std::result::Result<(), PersistenceError> {
        persist::save_index(&IndexPaths::new(&self.path), self)
    }

    /// Read a previously saved index back from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, PersistenceError> {
        persist::load_index(&IndexPaths::new(path))
    }

    pub fn statistics(&self) -> IndexStatistics {
        let mut has_postings = vec![false; self.documents.len()];
        let mut inverted_postings = 0;
        for list in &self.inverted {
            inverted_postings += list.len();
            for p in list {
                if let Some(seen) = has_postings.get_mut(p.doc_id as usize) {
                    *seen = true;
                }
            }
        }
        IndexStatistics {
            state: self.state,
            documents: self.documents.len(),
            terms: self.terms.len(),
            inverted_postings,
            direct_postings: self.direct.iter().map(Vec::len).sum(),
            empty_documents: has_postings.iter().filter(|seen| !**seen).count(),
        }
    }

    /// Verify that all structures agree with each other.
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantViolation> {
        lockstep("term map vs term table", self.dictionary.len(), self.terms.len())?;
        lockstep("term table vs inverted index", self.terms.len(), self.inverted.len())?;
        lockstep("documents vs direct index", self.documents.len(), self.direct.len())?;

        for (term_id, entry) in self.terms.iter().enumerate() {
            let term_id = term_id as TermId;
            if self.dictionary.get(&entry.text) != Some(&term_id) {
                return Err(InvariantViolation::DuplicateTerm { term: entry.text.clone() });
            }
        }

        let num_docs = self.documents.len();
        for (term_id, list) in self.inverted.iter().enumerate() {
            let term_id = term_id as TermId;
            if list.is_empty() && self.state != IndexState::Empty {
                return Err(InvariantViolation::EmptyPostingList { term_id });
            }
            let mut last: Option<DocId> = None;
            for p in list {
                if p.doc_id as usize >= num_docs {
                    let doc_id = p.doc_id;
                    return Err(InvariantViolation::DocumentOutOfRange { doc_id, len: num_docs });
                }
                if let Some(last) = last.filter(|&l| l >= p.doc_id) {
                    let doc_id = p.doc_id;
                    return Err(InvariantViolation::PostingOrder { term_id, doc_id, last });
                }
                last = Some(p.doc_id);
            }
        }

        if self.state != IndexState::Weighted {
            let direct = self.direct.iter().map(Vec::len).sum();
            return lockstep("direct postings before weighting", direct, 0);
        }

        let inverted_total: usize = self.inverted.iter().map(Vec::len).sum();
        let direct_total: usize = self.direct.iter().map(Vec::len).sum();
        lockstep("direct vs inverted postings", direct_total, inverted_total)?;
        for (doc_id, list) in self.direct.iter().enumerate() {
            let doc_id = doc_id as DocId;
            let mut last: Option<TermId> = None;
            for dp in list {
                if last.is_some_and(|l| l >= dp.term_id) {
                    return Err(InvariantViolation::DirectMismatch { term_id: dp.term_id, doc_id });
                }
                last = Some(dp.term_id);
                let postings = self.inverted.get(dp.term_id as usize).ok_or(
                    InvariantViolation::TermOutOfRange {
                        term_id: dp.term_id,
                        len: self.inverted.len(),
                    },
                )?;
                let matched = postings
                    .binary_search_by_key(&doc_id, |p| p.doc_id)
                    .ok()
                    .map(|i| postings[i].weight == dp.weight)
                    .unwrap_or(false);
                if !matched {
                    return Err(InvariantViolation::DirectMismatch { term_id: dp.term_id, doc_id });
                }
            }

            let stored = self.documents[doc_id as usize].norm;
            let computed = list.iter().map(|dp| dp.weight * dp.weight).sum::<f64>().sqrt();
            if (stored - computed).abs() > 1e-9 * computed.max(1.0) {
                return Err(InvariantViolation::NormMismatch { doc_id, stored, computed });
            }
        }
        Ok(())
    }
}

/// Next sequential id for a table currently holding `len` entries.
fn next_id(what: &'static str, len: usize) -> std::result::Result<u32, InvariantViolation> {
    u32::try_from(len).map_err(|_| InvariantViolation::IdSpaceExhausted { what, len })
}

fn lockstep(
    what: &'static str,
    left: usize,
    right: usize,
) -> std::result::Result<(), InvariantViolation> {
    if left == right {
        Ok(())
    } else {
        Err(InvariantViolation::CardinalityMismatch { what, left, right })
    }
}
