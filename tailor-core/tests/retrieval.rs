mod common;

use common::{config, travel_corpus, HashEmbedder};
use std::sync::Arc;
use tailor_core::rag::EmbedderError;
use tailor_core::{Document, KnowledgeBase, RagError, Retriever, Strategy};
use tempfile::TempDir;

#[tokio::test]
async fn test_misspelled_query_finds_paris() {
    let dir = TempDir::new().unwrap();
    let kb = KnowledgeBase::open(&config(dir.path()), Arc::new(HashEmbedder::new(32)))
        .await
        .unwrap();
    kb.ingest_documents(travel_corpus()).await.unwrap();

    assert_eq!(kb.correct("eifel tower").await, "eiffel tower");

    let results = kb.search("eifel tower", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.source, "paris.txt");
    assert_eq!(results[0].strategy, Strategy::Hybrid);
    assert!(results[0].score > 0.0 && results[0].score <= 1.0);
}

#[tokio::test]
async fn test_two_sentence_corpus_with_typo() {
    let dir = TempDir::new().unwrap();
    let kb = KnowledgeBase::open(&config(dir.path()), Arc::new(HashEmbedder::new(32)))
        .await
        .unwrap();
    kb.ingest_documents(vec![
        Document::new("paris.txt", "Paris has the Eiffel Tower."),
        Document::new("tokyo.txt", "Tokyo has Senso-ji Temple."),
    ])
    .await
    .unwrap();

    let results = kb.hybrid_retriever().retrieve("eifel tower", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.source, "paris.txt");
    assert_eq!(results[0].content().trim(), "Paris has the Eiffel Tower.");
    assert!(results[0].score > 0.0);
}

#[tokio::test]
async fn test_every_strategy_ranks_paris_first() {
    let dir = TempDir::new().unwrap();
    let kb = KnowledgeBase::open(&config(dir.path()), Arc::new(HashEmbedder::new(32)))
        .await
        .unwrap();
    kb.ingest_documents(travel_corpus()).await.unwrap();

    for strategy in [Strategy::Lexical, Strategy::Semantic, Strategy::Hybrid] {
        let retriever = kb.retriever(strategy);
        assert_eq!(retriever.strategy(), strategy);

        let results = retriever.retrieve("eiffel tower", 2).await.unwrap();
        assert!(!results.is_empty(), "{strategy} returned nothing");
        assert_eq!(results[0].chunk.source, "paris.txt", "{strategy}");
    }
}

#[tokio::test]
async fn test_unmatched_query_skips_embedding() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(HashEmbedder::new(32));
    let kb = KnowledgeBase::open(&config(dir.path()), provider.clone()).await.unwrap();
    kb.ingest_documents(travel_corpus()).await.unwrap();

    let calls = provider.calls();
    let results = kb.search("quantum chromodynamics", 1).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(provider.calls(), calls);
}

#[tokio::test]
async fn test_fuzzy_k_below_k_is_rejected() {
    let dir = TempDir::new().unwrap();
    let kb = KnowledgeBase::open(&config(dir.path()), Arc::new(HashEmbedder::new(32)))
        .await
        .unwrap();
    kb.ingest_documents(travel_corpus()).await.unwrap();

    let err = kb.search("paris", 6).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_embedding_outage() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path());
    config.rag.semantic_index = false;

    let provider = Arc::new(HashEmbedder::new(32));
    let strict = KnowledgeBase::open(&config, provider.clone()).await.unwrap();
    strict.ingest_documents(travel_corpus()).await.unwrap();
    provider.set_failing(true);

    let err = strict.search("eiffel tower", 1).await.unwrap_err();
    assert!(matches!(err, RagError::Embedder(EmbedderError::Provider(_))));
    drop(strict);

    config.rag.allow_degraded = true;
    let lenient = KnowledgeBase::open(&config, provider.clone()).await.unwrap();
    let results = lenient.search("eiffel tower", 1).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.source, "paris.txt");
    assert_eq!(results[0].strategy, Strategy::Lexical);
}

#[tokio::test]
async fn test_reopened_knowledge_base_keeps_ranking() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let provider = Arc::new(HashEmbedder::new(32));

    let before = {
        let kb = KnowledgeBase::open(&config, provider.clone()).await.unwrap();
        kb.ingest_documents(travel_corpus()).await.unwrap();
        kb.search("eifel tower", 2).await.unwrap()
    };

    let kb = KnowledgeBase::open(&config, provider).await.unwrap();
    assert_eq!(kb.count().await, 2);
    assert_eq!(kb.search("eifel tower", 2).await.unwrap(), before);
}

#[tokio::test]
async fn test_wrongly_sized_embeddings_are_not_degraded() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path());
    config.rag.semantic_index = false;
    config.rag.allow_degraded = true;

    let kb = KnowledgeBase::open(&config, Arc::new(HashEmbedder::new(16))).await.unwrap();
    kb.ingest_documents(travel_corpus()).await.unwrap();

    let err = kb.search("eiffel tower", 1).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 32, found: 16 }));
}
