//! Two-pass index construction.
//!
//! The first pass assigns document and term ids and accumulates raw term
//! frequencies. The second pass turns them into tf-idf weights
//! (`idf = ln(1 + N/df)`, `w = idf * (1 + ln tf)`), derives the direct index
//! and computes document norms.

use crate::collection::{DocumentRef, DocumentSource, FsCollection};
use crate::error::{DocumentReadError, Result};
use crate::index::{DirectPosting, DocId, Index, IndexState, IndexStatistics, TermId};
use crate::tokenizer::{DocumentFormat, DocumentProcessor};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Where to read documents from and where to write the index.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub collection: PathBuf,
    pub index: PathBuf,
    /// Extension of document files, without the dot
    pub extension: String,
    pub format: DocumentFormat,
}

impl IndexerConfig {
    pub fn new(collection: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        Self {
            collection: collection.into(),
            index: index.into(),
            extension: FsCollection::DEFAULT_EXTENSION.to_string(),
            format: DocumentFormat::Html,
        }
    }
}

/// What happened to one document during the first pass.
#[derive(Debug)]
pub enum DocumentOutcome {
    Indexed { doc_id: DocId, terms: usize, bytes: u64 },
    Skipped(SkippedDocument),
}

#[derive(Debug)]
pub struct SkippedDocument {
    pub name: String,
    pub error: DocumentReadError,
}

#[derive(Debug, Default)]
pub struct FirstPassReport {
    pub indexed: usize,
    /// Registered documents the processor found no terms in
    pub empty: usize,
    pub skipped: Vec<SkippedDocument>,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl FirstPassReport {
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / 1024.0 / 1024.0
    }

    pub fn throughput_mb_s(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.megabytes() / secs } else { 0.0 }
    }

    fn record(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Indexed { terms, bytes, .. } => {
                self.indexed += 1;
                self.bytes += bytes;
                if terms == 0 {
                    self.empty += 1;
                }
            }
            DocumentOutcome::Skipped(skipped) => self.skipped.push(skipped),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SecondPassReport {
    pub terms: usize,
    pub postings: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct BuildSummary {
    pub first_pass: FirstPassReport,
    pub second_pass: SecondPassReport,
    pub statistics: IndexStatistics,
}

/// Builds an [`Index`] from a document source.
pub struct Indexer<S, P> {
    index_path: PathBuf,
    source: S,
    processor: P,
}

impl Indexer<FsCollection, DocumentFormat> {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self::new(
            &config.index,
            FsCollection::with_extension(&config.collection, &config.extension),
            config.format,
        )
    }
}

impl<S: DocumentSource, P: DocumentProcessor> Indexer<S, P> {
    pub fn new(index_path: impl Into<PathBuf>, source: S, processor: P) -> Self {
        Self { index_path: index_path.into(), source, processor }
    }

    /// Run both passes and save the index.
    pub fn run(&self) -> Result<BuildSummary> {
        let mut ind = Index::new(&self.index_path);
        let first_pass = self.first_pass(&mut ind)?;
        let second_pass = self.second_pass(&mut ind)?;

        tracing::info!(path = %self.index_path.display(), "saving index");
        ind.save()?;

        let statistics = ind.statistics();
        tracing::info!(
            documents = statistics.documents,
            empty_documents = statistics.empty_documents,
            terms = statistics.terms,
            inverted_postings = statistics.inverted_postings,
            direct_postings = statistics.direct_postings,
            "index statistics"
        );
        Ok(BuildSummary { first_pass, second_pass, statistics })
    }

    /// Populate vocabulary, documents and raw-frequency postings.
    pub fn first_pass(&self, ind: &mut Index) -> Result<FirstPassReport> {
        ind.expect_state("first_pass", IndexState::Empty)?;
        let start = Instant::now();
        tracing::info!("running first pass");

        let mut report = FirstPassReport::default();
        for doc in self.source.documents()? {
            let outcome = self.process_document(&doc, ind)?;
            report.record(outcome);
        }
        report.elapsed = start.elapsed();
        ind.finish_first_pass()?;

        tracing::info!(
            documents = report.indexed,
            empty = report.empty,
            skipped = report.skipped.len(),
            megabytes = %format!("{:.2}", report.megabytes()),
            seconds = %format!("{:.2}", report.elapsed.as_secs_f64()),
            throughput_mb_s = %format!("{:.2}", report.throughput_mb_s()),
            "first pass done"
        );
        Ok(report)
    }

    /// Read, register and tokenize one document.
    ///
    /// A document that cannot be read is skipped without taking a doc id. A
    /// document without terms keeps its id and adds no postings.
    pub fn process_document(&self, doc: &DocumentRef, ind: &mut Index) -> Result<DocumentOutcome> {
        let content = match self.source.read(doc) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(name = %doc.name, %error, "skipping document");
                let skipped = SkippedDocument { name: doc.name.clone(), error };
                return Ok(DocumentOutcome::Skipped(skipped));
            }
        };
        let bytes = content.len() as u64;
        let doc_id = ind.add_document(&doc.name)?;

        let Some(terms) = self.processor.process_text(&content) else {
            tracing::debug!(name = %doc.name, doc_id, "document has no terms");
            return Ok(DocumentOutcome::Indexed { doc_id, terms: 0, bytes });
        };
        for term in &terms {
            let term_id = ind.term_id_for(term)?;
            ind.add_occurrence(term_id, doc_id)?;
        }
        tracing::debug!(name = %doc.name, doc_id, terms = terms.len(), "indexed document");
        Ok(DocumentOutcome::Indexed { doc_id, terms: terms.len(), bytes })
    }

    pub fn second_pass(&self, ind: &mut Index) -> Result<SecondPassReport> {
        second_pass(ind)
    }
}

/// Replace raw frequencies with tf-idf weights, build the direct index and the norms.
pub fn second_pass(ind: &mut Index) -> Result<SecondPassReport> {
    ind.expect_state("second_pass", IndexState::RawFrequencies)?;
    // Every list non-empty and every doc id in range from here on.
    ind.check_invariants()?;
    let start = Instant::now();
    tracing::info!("running second pass");

    let n = ind.documents.len() as f64;
    let mut postings = 0;
    for (entry, list) in ind.terms.iter_mut().zip(ind.inverted.iter_mut()) {
        let ct = list.len() as f64;
        let idf = (1.0 + n / ct).ln();
        entry.idf = idf;
        for p in list.iter_mut() {
            p.weight = idf * (1.0 + p.weight.ln());
            ind.documents[p.doc_id as usize].norm += p.weight * p.weight;
        }
        postings += list.len();
    }

    for (term_id, list) in ind.inverted.iter().enumerate() {
        for p in list {
            let term_id = term_id as TermId;
            ind.direct[p.doc_id as usize].push(DirectPosting { term_id, weight: p.weight });
        }
    }

    for doc in ind.documents.iter_mut() {
        doc.norm = doc.norm.sqrt();
    }

    ind.advance("second_pass", IndexState::RawFrequencies, IndexState::Weighted)?;
    let report = SecondPassReport { terms: ind.terms.len(), postings, elapsed: start.elapsed() };
    tracing::info!(
        terms = report.terms,
        postings = report.postings,
        seconds = %format!("{:.2}", report.elapsed.as_secs_f64()),
        "second pass done"
    );
    Ok(report)
}
