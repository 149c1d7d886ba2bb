//! End-to-end ranking scenarios over in-memory artifacts

use async_trait::async_trait;
use risotto_common::config::{EmbeddingConfig, EntailmentConfig, Granularity, ImportanceConfig, RankingConfig};
use risotto_common::embeddings::Embedder;
use risotto_common::errors::{AppError, Result};
use risotto_common::models::{
    Document, DocumentId, EmbeddingTable, PaperTable, RelevanceMetric, TableMeta,
};
use risotto_common::nli::LexicalEntailmentClassifier;
use risotto_common::storage::{ArtifactStore, Artifacts, MemoryArtifactStore, TableKey};
use risotto_common::text::TextPreprocessor;
use risotto_search::citation::build_importance;
use risotto_search::ranking::{RankRequest, SortKey};
use risotto_search::retrieval::{EntailmentScorer, VectorSearch};
use risotto_search::service::QueryService;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

/// Always embeds onto the x axis
struct AxisEmbedder;

#[async_trait]
impl Embedder for AxisEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn model_name(&self) -> &str {
        "axis"
    }

    fn dimension(&self) -> usize {
        2
    }
}

/// Unit vector at cosine distance `d` from the x axis
fn at_distance(d: f64) -> Vec<f32> {
    let cos = 1.0 - d;
    vec![cos as f32, (1.0 - cos * cos).sqrt() as f32]
}

/// Five papers; d4 and d5 are cited by everyone else
fn corpus() -> Vec<Document> {
    vec![
        Document::new("d1").with_title("Vaccine efficacy").with_body("Vaccines prevent infection.").citing(["d4", "d5"]),
        Document::new("d2").with_title("Antiviral therapeutics").with_body("Therapeutics reduce symptoms.").citing(["d4", "d5"]),
        Document::new("d3").with_title("mRNA platforms").with_body("Vaccines based on mRNA.").citing(["d4", "d5"]),
        Document::new("d4").with_title("Hospital logistics").with_body("Beds and staffing.").citing(["d5"]),
        Document::new("d5").with_title("Climate and travel").with_body("Weather affects travel."),
    ]
}

async fn seeded_artifacts(docs: &[Document]) -> Artifacts {
    let artifacts = Artifacts::in_memory();
    seed(&artifacts, docs).await;
    artifacts
}

async fn seed(artifacts: &Artifacts, docs: &[Document]) {
    artifacts
        .save_papers(&PaperTable::from_summaries(docs.iter().map(Document::summary)))
        .await
        .unwrap();
    artifacts
        .save_importance(&build_importance(docs, &ImportanceConfig::default()).unwrap())
        .await
        .unwrap();

    let distances = [("d1", 0.1), ("d2", 0.2), ("d3", 0.3), ("d4", 0.5), ("d5", 0.9)];
    let vectors: BTreeMap<DocumentId, Vec<f32>> = distances
        .iter()
        .map(|(id, d)| (DocumentId::new(*id), at_distance(*d)))
        .collect();
    artifacts
        .save_embeddings(&EmbeddingTable {
            meta: TableMeta::fresh(),
            model: "axis".into(),
            dimension: 2,
            fingerprints: vectors.keys().map(|id| (id.clone(), String::new())).collect(),
            vectors,
        })
        .await
        .unwrap();
}

fn service(artifacts: Artifacts) -> QueryService {
    let preprocessor = Arc::new(TextPreprocessor::with_granularity(Granularity::Abstract, 2048));
    let search = VectorSearch::new(Arc::new(AxisEmbedder), preprocessor, &EmbeddingConfig::default());
    QueryService::new(artifacts, search, RankingConfig::default())
}

fn request(importance: f64, relevance: f64, sort_key: SortKey, top_k: usize) -> RankRequest {
    RankRequest {
        importance_threshold: importance,
        relevance_threshold: relevance,
        sort_key,
        top_k,
    }
}

fn ids(papers: &[risotto_search::ranking::RankedPaper]) -> Vec<&str> {
    papers.iter().map(|p| p.paper.id.as_str()).collect()
}

#[tokio::test]
async fn similarity_threshold_excludes_distant_papers_regardless_of_importance() {
    let service = service(seeded_artifacts(&corpus()).await);

    let result = assert_ok!(
        service
            .rank_similarity("vaccines", &request(0.0, 0.65, SortKey::Importance, 20))
            .await
    );

    // d4 and d5 carry the most importance but are too far from the query
    let mut got = ids(&result.papers);
    got.sort();
    assert_eq!(got, vec!["d1", "d2", "d3"]);
    assert_eq!(result.metric, RelevanceMetric::CosineDistance);
    assert_eq!(result.dropped, 0);
}

#[tokio::test]
async fn fewer_survivors_than_top_k_returns_all_sorted() {
    let service = service(seeded_artifacts(&corpus()).await);

    let by_importance = assert_ok!(
        service
            .rank_similarity("vaccines", &request(0.0, 0.0, SortKey::Importance, 20))
            .await
    );
    assert_eq!(by_importance.len(), 5);
    assert_eq!(by_importance.papers[0].paper.id.as_str(), "d5");
    assert!(by_importance
        .papers
        .windows(2)
        .all(|w| w[0].importance >= w[1].importance));

    let by_relevance = assert_ok!(
        service
            .rank_similarity("vaccines", &request(0.0, -1.0, SortKey::Relevance, 20))
            .await
    );
    assert_eq!(ids(&by_relevance.papers), vec!["d1", "d2", "d3", "d4", "d5"]);
}

#[tokio::test]
async fn raising_relevance_threshold_never_grows_result() {
    let service = service(seeded_artifacts(&corpus()).await);

    let mut previous = usize::MAX;
    for step in 0..=20 {
        let threshold = -1.0 + step as f64 * 0.1;
        let result = assert_ok!(
            service
                .rank_similarity("vaccines", &request(0.0, threshold, SortKey::Relevance, 20))
                .await
        );
        assert!(result.len() <= previous, "grew at threshold {}", threshold);
        previous = result.len();
    }
    assert_eq!(previous, 0);
}

#[tokio::test]
async fn entailment_ranking_uses_stored_backend_table() {
    let docs = corpus();
    let artifacts = seeded_artifacts(&docs).await;

    let scorer = EntailmentScorer::new(
        Arc::new(LexicalEntailmentClassifier),
        Arc::new(TextPreprocessor::with_granularity(Granularity::Sentences, 2048)),
        &EntailmentConfig::default(),
    );
    let table = scorer
        .score_all(&docs, "This paper is about vaccines and therapeutics.")
        .await
        .unwrap();
    artifacts.save_relevance(&table).await.unwrap();

    let service = service(artifacts);
    assert_eq!(service.entailment_backends().await.unwrap(), vec!["lexical"]);

    let result = assert_ok!(
        service
            .rank_entailment("LEXICAL", &request(0.0, 0.0, SortKey::Relevance, 20))
            .await
    );
    assert_eq!(result.len(), 5);
    assert!(result
        .papers
        .windows(2)
        .all(|w| w[0].relevance >= w[1].relevance));

    let err = assert_err!(
        service
            .rank_entailment("roberta", &request(0.0, 0.0, SortKey::Relevance, 20))
            .await
    );
    assert!(matches!(err, AppError::ArtifactNotFound { .. }));
}

#[tokio::test]
async fn empty_result_is_not_an_error() {
    let service = service(seeded_artifacts(&corpus()).await);

    let result = assert_ok!(
        service
            .rank_similarity("vaccines", &request(1.0, 0.99, SortKey::Importance, 20))
            .await
    );
    assert!(result.is_empty());
    assert_eq!(result.matched, 0);
}

#[tokio::test]
async fn reload_swaps_tables_without_disturbing_readers() {
    let docs = corpus();
    let artifacts = seeded_artifacts(&docs).await;
    let service = service(artifacts.clone());

    let before = service.corpus().await.unwrap();
    assert_eq!(before.papers.len(), 5);

    let mut grown = docs.clone();
    grown.push(Document::new("d6").with_title("Late addition").citing(["d1"]));
    artifacts
        .save_papers(&PaperTable::from_summaries(grown.iter().map(Document::summary)))
        .await
        .unwrap();
    artifacts
        .save_importance(&build_importance(&grown, &ImportanceConfig::default()).unwrap())
        .await
        .unwrap();

    assert_ok!(service.reload().await);
    let after = service.corpus().await.unwrap();

    assert_eq!(before.papers.len(), 5);
    assert_eq!(after.papers.len(), 6);
    assert_eq!(after.importance.len(), 6);
}

#[tokio::test]
async fn failed_reload_keeps_every_cached_table() {
    let docs = corpus();
    let store = Arc::new(MemoryArtifactStore::new());
    let artifacts = Artifacts::new(store.clone());
    seed(&artifacts, &docs).await;

    let scorer = EntailmentScorer::new(
        Arc::new(LexicalEntailmentClassifier),
        Arc::new(TextPreprocessor::with_granularity(Granularity::Abstract, 2048)),
        &EntailmentConfig::default(),
    );
    artifacts
        .save_relevance(&scorer.score_all(&docs, "vaccines").await.unwrap())
        .await
        .unwrap();

    let service = service(artifacts.clone());
    assert_ok!(
        service
            .rank_entailment("lexical", &request(0.0, 0.0, SortKey::Relevance, 20))
            .await
    );
    let before = service.corpus().await.unwrap();

    // A grown corpus lands, but the relevance table is unreadable
    let mut grown = docs.clone();
    grown.push(Document::new("d6").citing(["d1"]));
    artifacts
        .save_papers(&PaperTable::from_summaries(grown.iter().map(Document::summary)))
        .await
        .unwrap();
    store
        .put(&TableKey::relevance("lexical"), b"not json".to_vec())
        .await
        .unwrap();

    assert_err!(service.reload().await);

    let after = service.corpus().await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.papers.len(), 5);
    let result = assert_ok!(
        service
            .rank_entailment("lexical", &request(0.0, 0.0, SortKey::Relevance, 20))
            .await
    );
    assert_eq!(result.len(), 5);
}

#[tokio::test]
async fn default_request_uses_configured_thresholds() {
    let service = service(seeded_artifacts(&corpus()).await);

    let similarity = service.default_request(RelevanceMetric::CosineDistance).await.unwrap();
    assert_eq!(similarity.relevance_threshold, 0.65);
    assert_eq!(similarity.sort_key, SortKey::Importance);
    assert_eq!(similarity.top_k, 20);
    assert!((0.0..=1.0).contains(&similarity.importance_threshold));

    let entailment = service.default_request(RelevanceMetric::Entailment).await.unwrap();
    assert_eq!(entailment.relevance_threshold, 85.0);
    assert_eq!(entailment.sort_key, SortKey::Relevance);
}
