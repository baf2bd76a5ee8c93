//! End-to-end behaviour of the chat pipeline with scripted providers.

use std::sync::Arc;

use futures::TryStreamExt;
use govbot_rag::config::{PipelineConfig, RetrievalConfig};
use govbot_rag::mock::{MockCompletionProvider, MockEmbeddingProvider, ScriptedIndex};
use govbot_rag::{ChatPipeline, FALLBACK_ANSWER, HistoryPolicy, Match, Message, PromptBuilder, RagError, Role};

const CHUNK: &str = "Renewals can be done online at mvd.newmexico.gov.";
const URL: &str = "https://mvd.newmexico.gov";

struct Harness {
    pipeline: ChatPipeline,
    embedder: Arc<MockEmbeddingProvider>,
    index: Arc<ScriptedIndex>,
    model: Arc<MockCompletionProvider>,
}

fn harness(matches: Vec<Match>, model: MockCompletionProvider, config: PipelineConfig) -> Harness {
    let embedder = Arc::new(MockEmbeddingProvider::new(vec![0.1, 0.2, 0.3]));
    let index = Arc::new(ScriptedIndex::new(matches));
    let model = Arc::new(model);
    let pipeline = ChatPipeline::builder()
        .config(config)
        .embedding_provider(embedder.clone())
        .vector_index(index.clone())
        .completion_provider(model.clone())
        .build()
        .expect("pipeline");
    Harness { pipeline, embedder, index, model }
}

fn license_question() -> Vec<Message> {
    vec![Message::user("How do I renew my driver's license?")]
}

#[tokio::test]
async fn grounded_answer_carries_its_source() {
    let h = harness(
        vec![Match::new("mvd-1", 0.9, CHUNK, Some(URL.to_string()))],
        MockCompletionProvider::grounded(["You can renew ", "online."]),
        PipelineConfig::default(),
    );

    let prepared = h.pipeline.prepare(&license_question()).await.unwrap();
    assert_eq!(prepared.context, CHUNK);

    let answer = h.pipeline.answer(&license_question()).await.unwrap();
    assert_eq!(answer.url, URL);
    assert!(!answer.data.is_empty());
    assert!(!answer.data.contains(FALLBACK_ANSWER));
}

#[tokio::test]
async fn empty_retrieval_falls_back_without_url() {
    let h = harness(
        vec![],
        MockCompletionProvider::grounded(["You can renew online."]),
        PipelineConfig::default(),
    );

    let answer = h.pipeline.answer(&license_question()).await.unwrap();

    assert_eq!(answer.data, FALLBACK_ANSWER);
    assert_eq!(answer.url, "");
    assert!(h.pipeline.source_urls(&license_question()).await.unwrap().is_empty());
}

#[tokio::test]
async fn buffered_answer_retrieves_twice_and_completes_once() {
    let h = harness(
        vec![Match::new("mvd-1", 0.9, CHUNK, Some(URL.to_string()))],
        MockCompletionProvider::new(["ok"]),
        PipelineConfig::default(),
    );

    h.pipeline.answer(&license_question()).await.unwrap();

    assert_eq!(h.index.query_count(), 2);
    assert_eq!(h.model.call_count(), 1);
    assert_eq!(h.embedder.call_count(), 1);
}

#[tokio::test]
async fn disabling_source_lookup_retrieves_once() {
    let config = PipelineConfig { source: None, ..PipelineConfig::default() };
    let h = harness(
        vec![Match::new("mvd-1", 0.9, CHUNK, Some(URL.to_string()))],
        MockCompletionProvider::new(["ok"]),
        config,
    );

    let answer = h.pipeline.answer(&license_question()).await.unwrap();

    assert_eq!(answer.url, "");
    assert_eq!(h.index.query_count(), 1);
}

#[tokio::test]
async fn relay_retrieves_once_and_matches_buffered_output() {
    let fragments = ["To renew, ", "visit ", "the MVD portal."];
    let matches = vec![Match::new("mvd-1", 0.9, CHUNK, Some(URL.to_string()))];

    let buffered = harness(matches.clone(), MockCompletionProvider::new(fragments), PipelineConfig::default());
    let relayed = harness(matches, MockCompletionProvider::new(fragments), PipelineConfig::default());

    let answer = buffered.pipeline.answer(&license_question()).await.unwrap();
    let chunks: Vec<String> = relayed
        .pipeline
        .answer_stream(&license_question())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(chunks, fragments);
    assert_eq!(chunks.concat(), answer.data);
    assert_eq!(relayed.index.query_count(), 1);
    assert_eq!(relayed.model.call_count(), 1);
}

#[tokio::test]
async fn url_listing_uses_its_own_threshold_and_skips_completion() {
    let h = harness(
        vec![
            Match::new("a", 0.85, "a", Some("https://a.nm.gov".to_string())),
            Match::new("b", 0.75, "b", Some("https://b.nm.gov".to_string())),
        ],
        MockCompletionProvider::new(["unused"]),
        PipelineConfig::default(),
    );

    let urls = h.pipeline.source_urls(&license_question()).await.unwrap();

    assert_eq!(urls, vec![Some("https://a.nm.gov".to_string())]);
    assert_eq!(h.index.last_query(), Some((RetrievalConfig::urls().top_k, String::new())));
    assert_eq!(h.model.call_count(), 0);
}

#[tokio::test]
async fn prompt_sent_to_model_reinforces_last_turn_only() {
    let h = harness(vec![], MockCompletionProvider::new(["ok"]), PipelineConfig::default());
    let conversation = vec![
        Message::user("Hi"),
        Message::assistant("Hello! What is your name?"),
        Message::user("Sam. Where do I pay property tax?"),
    ];

    h.pipeline.answer(&conversation).await.unwrap();

    let sent = h.model.last_messages().unwrap();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].role, Role::System);
    assert_eq!(sent[1].content, "Hi");
    assert!(sent[2].content.starts_with("Sam. Where do I pay property tax?"));
    assert!(sent[2].content.ends_with("mentioned in the provided CONTEXT."));
    assert_eq!(h.embedder.inputs(), vec!["Sam. Where do I pay property tax?".to_string()]);
}

#[tokio::test]
async fn full_history_policy_forwards_assistant_turns() {
    let embedder = Arc::new(MockEmbeddingProvider::new(vec![1.0]));
    let model = Arc::new(MockCompletionProvider::new(["ok"]));
    let pipeline = ChatPipeline::builder()
        .embedding_provider(embedder)
        .vector_index(Arc::new(ScriptedIndex::new(vec![])))
        .completion_provider(model.clone())
        .prompt(PromptBuilder::new().history(HistoryPolicy::FullHistory))
        .build()
        .unwrap();

    pipeline
        .answer(&[Message::user("Hi"), Message::assistant("Hello!"), Message::user("Fees?")])
        .await
        .unwrap();

    assert_eq!(model.last_messages().unwrap().len(), 4);
}

#[tokio::test]
async fn failures_propagate_with_their_kind() {
    let embedder_down = ChatPipeline::builder()
        .embedding_provider(Arc::new(MockEmbeddingProvider::failing("503")))
        .vector_index(Arc::new(ScriptedIndex::new(vec![])))
        .completion_provider(Arc::new(MockCompletionProvider::new(["x"])))
        .build()
        .unwrap();
    assert!(matches!(
        embedder_down.answer(&license_question()).await,
        Err(RagError::Embedding { .. })
    ));

    let index_down = ChatPipeline::builder()
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(vec![1.0])))
        .vector_index(Arc::new(ScriptedIndex::failing("unavailable")))
        .completion_provider(Arc::new(MockCompletionProvider::new(["x"])))
        .build()
        .unwrap();
    assert!(matches!(
        index_down.source_urls(&license_question()).await,
        Err(RagError::Retrieval { .. })
    ));

    let wrong_index = ChatPipeline::builder()
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(vec![1.0])))
        .vector_index(Arc::new(ScriptedIndex::new(vec![])))
        .index_name("missing")
        .completion_provider(Arc::new(MockCompletionProvider::new(["x"])))
        .build()
        .unwrap();
    assert!(matches!(
        wrong_index.answer(&license_question()).await,
        Err(RagError::IndexNotFound { .. })
    ));

    let model_down = ChatPipeline::builder()
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(vec![1.0])))
        .vector_index(Arc::new(ScriptedIndex::new(vec![])))
        .completion_provider(Arc::new(MockCompletionProvider::failing("429")))
        .build()
        .unwrap();
    assert!(matches!(
        model_down.answer(&license_question()).await,
        Err(RagError::Completion { .. })
    ));
}
