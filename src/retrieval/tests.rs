use super::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

/// Maps a few known queries to fixed vectors; can be switched into failure
struct TableProvider {
    failing: AtomicBool,
}

impl TableProvider {
    fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
        }
    }
}

impl EmbeddingProvider for TableProvider {
    fn name(&self) -> &str {
        "table"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RagError::EmbeddingProvider("timed out".to_string()));
        }
        match text {
            "mostly x" => Ok(vec![0.9, 0.1]),
            "mostly y" => Ok(vec![0.1, 0.9]),
            "wrong size" => Ok(vec![1.0, 2.0, 3.0]),
            _ => Ok(vec![0.0, 0.0]),
        }
    }
}

fn sample_corpus() -> Corpus {
    let mut corpus = Corpus::new();
    corpus.push("x axis", &[1.0, 0.0]).expect("push");
    corpus.push("y axis", &[0.0, 1.0]).expect("push");
    corpus.push("diagonal", &[1.0, 1.0]).expect("push");
    corpus
}

fn service() -> RetrievalService<TableProvider> {
    RetrievalService::new(Arc::new(sample_corpus()), TableProvider::new())
}

#[test]
fn retrieve_joins_nearest_chunks() {
    let context = service().retrieve("mostly x", 2).expect("retrieve");
    assert_eq!(context, "x axis\n\ndiagonal");
}

#[test]
fn retrieve_chunks_reports_distances() {
    let chunks = service().retrieve_chunks("mostly x", 2).expect("retrieve");

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].row_id, 0);
    assert!((chunks[0].distance - 0.02).abs() < 1e-5);
    assert_eq!(chunks[1].row_id, 2);
    assert!((chunks[1].distance - 0.82).abs() < 1e-5);
    assert_eq!(chunks[1].text, "diagonal");
}

#[test]
fn k_larger_than_corpus_returns_everything() {
    let context = service().retrieve("mostly y", 10).expect("retrieve");
    assert_eq!(context, "y axis\n\ndiagonal\n\nx axis");
}

#[test]
fn custom_separator() {
    let service = service().with_separator("\n---\n");
    let context = service.retrieve("mostly x", 2).expect("retrieve");
    assert_eq!(context, "x axis\n---\ndiagonal");
}

#[test]
fn empty_corpus_yields_empty_context() {
    let service = RetrievalService::new(Arc::new(Corpus::new()), TableProvider::new());
    assert_eq!(service.retrieve("anything", DEFAULT_TOP_K).expect("retrieve"), "");
}

#[test]
fn zero_k_yields_empty_context() {
    assert_eq!(service().retrieve("mostly x", 0).expect("retrieve"), "");
}

#[test]
fn whitespace_query_is_served() {
    let context = service().retrieve("   ", 1).expect("retrieve");
    assert_eq!(context, "x axis");
}

#[test]
fn provider_failure_is_a_retrieval_error_and_corpus_survives() {
    let service = service();
    service.provider().failing.store(true, Ordering::SeqCst);

    let err = service.retrieve("mostly x", 1).expect_err("provider is down");
    assert!(err.is_retrieval_failure());
    assert!(matches!(
        err,
        RagError::Retrieval { ref source } if matches!(**source, RagError::EmbeddingProvider(_))
    ));

    service.provider().failing.store(false, Ordering::SeqCst);
    assert_eq!(service.retrieve("mostly x", 1).expect("recovered"), "x axis");
    assert_eq!(service.corpus().len(), 3);
}

#[test]
fn query_dimension_mismatch_is_a_retrieval_error() {
    let err = service().retrieve("wrong size", 1).expect_err("3-dim query");
    let RagError::Retrieval { source } = err else {
        panic!("expected a retrieval error");
    };
    assert!(matches!(
        *source,
        RagError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    ));
}

#[test]
fn concurrent_queries_share_one_service() {
    let service = Arc::new(service());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                let query = if i % 2 == 0 { "mostly x" } else { "mostly y" };
                service.retrieve(query, 1)
            })
        })
        .collect();

    let results: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread").expect("retrieve"))
        .collect();
    assert_eq!(results, vec!["x axis", "y axis", "x axis", "y axis"]);
}

#[test]
fn open_loads_saved_corpus() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let paths = CorpusPaths::new(
        temp_dir.path().join("index.bin"),
        temp_dir.path().join("texts.txt"),
    );
    persistence::save(&sample_corpus(), &paths).expect("save");

    let service = RetrievalService::open(&paths, TableProvider::new()).expect("open");
    assert_eq!(service.retrieve("mostly y", 1).expect("retrieve"), "y axis");
}

#[test]
fn open_without_files_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let paths = CorpusPaths::new(
        temp_dir.path().join("missing.bin"),
        temp_dir.path().join("missing.txt"),
    );

    let result = RetrievalService::open(&paths, TableProvider::new());
    assert!(matches!(result, Err(RagError::CorpusLoad(_))));
}
