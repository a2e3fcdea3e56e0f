use docindex_core::persist::{load_meta, save_meta, IndexPaths};
use docindex_core::tokenizer::DocumentFormat;
use docindex_core::{
    DocId, Index, IndexError, IndexState, Indexer, IndexerConfig, PersistenceError, TermId,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_doc(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn html(body: &str) -> String {
    format!("<html><head><title></title></head><body>{body}</body></html>")
}

/// Raw term counts per document, straight from the tokenizer.
fn expected_counts(texts: &[&str]) -> Vec<HashMap<String, u32>> {
    texts
        .iter()
        .map(|t| {
            let mut counts = HashMap::new();
            for term in docindex_core::tokenizer::tokenize(t) {
                *counts.entry(term).or_insert(0) += 1;
            }
            counts
        })
        .collect()
}

fn build_sample(collection: &Path, index: &Path) -> Index {
    write_doc(collection, "a/01.html", &html("rust search engine rust"));
    write_doc(collection, "a/02.html", &html("search index postings"));
    write_doc(collection, "b/03.html", &html("rust postings postings postings"));
    write_doc(collection, "b/04.html", &html("   "));
    write_doc(collection, ".cache/05.html", &html("hidden hidden"));
    write_doc(collection, "b/readme.txt", "not a document");

    let summary = Indexer::from_config(&IndexerConfig::new(collection, index)).run().unwrap();
    assert_eq!(summary.first_pass.indexed, 4);
    assert_eq!(summary.first_pass.empty, 1);
    assert!(summary.first_pass.skipped.is_empty());
    Index::load(index).unwrap()
}

#[test]
fn built_index_satisfies_tf_idf_properties() {
    let dir = tempdir().unwrap();
    let ind = build_sample(&dir.path().join("coll"), &dir.path().join("idx"));
    let texts = [
        "rust search engine rust",
        "search index postings",
        "rust postings postings postings",
        "",
    ];
    let counts = expected_counts(&texts);
    let n = ind.num_documents() as f64;

    assert_eq!(ind.state(), IndexState::Weighted);
    assert_eq!(ind.num_documents(), 4);
    assert!(ind.term_id("hidden").is_none());
    ind.check_invariants().unwrap();

    let mut norms = vec![0.0f64; ind.num_documents()];
    for (term_id, entry) in ind.terms().iter().enumerate() {
        let postings = ind.postings(term_id as TermId).unwrap();
        let ct = postings.len() as f64;
        let idf = (1.0 + n / ct).ln();
        assert!((entry.idf - idf).abs() < 1e-9);
        assert!(entry.idf >= 0.0);

        let holders: Vec<DocId> = (0..counts.len() as DocId)
            .filter(|&d| counts[d as usize].contains_key(&entry.text))
            .collect();
        assert_eq!(postings.iter().map(|p| p.doc_id).collect::<Vec<_>>(), holders);

        for p in postings {
            let k = counts[p.doc_id as usize][&entry.text] as f64;
            assert!((p.weight - idf * (1.0 + k.ln())).abs() < 1e-9);
            norms[p.doc_id as usize] += p.weight * p.weight;

            let direct = ind.direct_postings(p.doc_id).unwrap();
            let term_id = term_id as TermId;
            assert!(direct.iter().any(|dp| dp.term_id == term_id && dp.weight == p.weight));
        }
    }

    for (doc_id, doc) in ind.documents().iter().enumerate() {
        assert!((doc.norm - norms[doc_id].sqrt()).abs() < 1e-9);
        let direct = ind.direct_postings(doc_id as DocId).unwrap();
        assert_eq!(direct.len(), counts[doc_id].len());
        assert!(direct.windows(2).all(|w| w[0].term_id < w[1].term_id));
    }

    let empty = ind.document(3).unwrap();
    assert_eq!(empty.name, "04");
    assert_eq!(empty.norm, 0.0);
    assert!(ind.direct_postings(3).unwrap().is_empty());
}

#[test]
fn saved_index_round_trips_exactly() {
    let dir = tempdir().unwrap();
    let collection = dir.path().join("coll");
    write_doc(&collection, "g/one.txt", "alpha beta alpha gamma");
    write_doc(&collection, "g/two.txt", "beta delta");

    let config = IndexerConfig {
        extension: "txt".into(),
        format: DocumentFormat::PlainText,
        ..IndexerConfig::new(&collection, dir.path().join("idx"))
    };
    let indexer = Indexer::from_config(&config);
    let mut built = Index::new(&config.index);
    indexer.first_pass(&mut built).unwrap();
    indexer.second_pass(&mut built).unwrap();
    built.save().unwrap();

    let loaded = Index::load(&config.index).unwrap();
    assert_eq!(loaded.state(), built.state());
    assert_eq!(loaded.terms(), built.terms());
    assert_eq!(loaded.documents(), built.documents());
    for term_id in 0..built.num_terms() as TermId {
        assert_eq!(loaded.postings(term_id), built.postings(term_id));
        assert_eq!(loaded.term_id(&built.term(term_id).unwrap().text), Some(term_id));
    }
    for doc_id in 0..built.num_documents() as DocId {
        assert_eq!(loaded.direct_postings(doc_id), built.direct_postings(doc_id));
    }
    assert_eq!(loaded.statistics(), built.statistics());
}

#[test]
fn unreadable_documents_do_not_abort_the_build() {
    let dir = tempdir().unwrap();
    let collection = dir.path().join("coll");
    write_doc(&collection, "g/a.html", &html("alpha"));
    let bad = collection.join("g/b.html");
    fs::write(&bad, [0xc3, 0x28, 0xff]).unwrap();
    write_doc(&collection, "g/c.html", &html("alpha omega"));

    let config = IndexerConfig::new(&collection, dir.path().join("idx"));
    let summary = Indexer::from_config(&config).run().unwrap();
    assert_eq!(summary.first_pass.indexed, 2);
    assert_eq!(summary.first_pass.skipped.len(), 1);
    assert_eq!(summary.first_pass.skipped[0].name, "b");
    assert_eq!(summary.statistics.documents, 2);

    let ind = Index::load(dir.path().join("idx")).unwrap();
    assert_eq!(ind.document(1).unwrap().name, "c");
}

#[test]
fn missing_collection_fails_the_build() {
    let dir = tempdir().unwrap();
    let config = IndexerConfig::new(dir.path().join("none"), dir.path().join("idx"));
    let err = Indexer::from_config(&config).run().unwrap_err();
    assert!(matches!(err, IndexError::Collection { .. }));
    assert!(!IndexPaths::new(dir.path().join("idx")).exists());
}

#[test]
fn tampered_index_is_rejected_on_load() {
    let dir = tempdir().unwrap();
    let idx = dir.path().join("idx");
    build_sample(&dir.path().join("coll"), &idx);
    let paths = IndexPaths::new(&idx);

    let mut meta = load_meta(&paths).unwrap();
    meta.num_terms += 1;
    save_meta(&paths, &meta).unwrap();
    assert!(matches!(Index::load(&idx), Err(PersistenceError::Corrupt { .. })));

    meta.num_terms -= 1;
    meta.num_postings += 1;
    save_meta(&paths, &meta).unwrap();
    assert!(matches!(Index::load(&idx), Err(PersistenceError::Corrupt { .. })));

    meta.num_postings -= 1;
    meta.version = 99;
    save_meta(&paths, &meta).unwrap();
    assert!(matches!(Index::load(&idx), Err(PersistenceError::Corrupt { .. })));

    meta.version = docindex_core::persist::FORMAT_VERSION;
    save_meta(&paths, &meta).unwrap();
    fs::write(paths.inverted(), b"garbage").unwrap();
    assert!(matches!(Index::load(&idx), Err(PersistenceError::Encode { .. })));
}

#[test]
fn save_into_unwritable_location_is_a_persistence_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("file");
    fs::write(&blocker, "x").unwrap();
    let ind = Index::new(blocker.join("idx"));
    assert!(matches!(ind.save(), Err(PersistenceError::Io { .. })));
}

#[test]
fn interrupted_resave_leaves_an_index_that_does_not_load() {
    let dir = tempdir().unwrap();
    let collection = dir.path().join("coll");
    let idx = dir.path().join("idx");
    build_sample(&collection, &idx);
    let paths = IndexPaths::new(&idx);
    let first_meta = load_meta(&paths).unwrap();

    // Same terms, documents and postings; only the weights of doc 0 change.
    write_doc(&collection, "a/01.html", &html("rust search engine rust rust"));
    let indexer = Indexer::from_config(&IndexerConfig::new(&collection, &idx));
    let mut second = Index::new(&idx);
    indexer.first_pass(&mut second).unwrap();
    indexer.second_pass(&mut second).unwrap();

    // documents.bin cannot be staged, so the save stops after the direct lists.
    fs::create_dir(idx.join("documents.tmp")).unwrap();
    assert!(matches!(second.save(), Err(PersistenceError::Io { .. })));
    assert!(!paths.exists());
    assert!(Index::load(&idx).is_err());

    // Even with the old meta put back, stale norms give the mix away.
    save_meta(&paths, &first_meta).unwrap();
    match Index::load(&idx) {
        Err(PersistenceError::Corrupt { reason, .. }) => assert!(reason.contains("norm")),
        other => panic!("mixed index loaded: {:?}", other.map(|ind| ind.statistics())),
    }
}
