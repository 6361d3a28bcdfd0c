//! Retrieval and chat tests against an in-memory document store

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pagelens_core::{LlmClient, Metadata, MetadataValue, PageLensError, Result};
use pagelens_rag::{ChatOrchestrator, PromptBuilder, RetrievalService, NO_CONTEXT_REPLY};
use pagelens_vector::{EmbeddingProvider, SharedDocumentStore, StorePaths, VectorDocumentStore};

/// Embeds only the texts it was given vectors for
struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    fn new(entries: &[(&str, [f32; 2])]) -> Arc<Self> {
        Arc::new(Self {
            table: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| PageLensError::EmbeddingError(format!("no vector for {text:?}")))
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.encode(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_id(&self) -> &str {
        "table"
    }
}

/// Records prompts and replies with a fixed answer
#[derive(Default)]
struct RecordingLlm {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for RecordingLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Room 4 is on the second floor.".to_string())
    }

    fn model(&self) -> &str {
        "recording"
    }
}

fn temp_store(dir: &tempfile::TempDir) -> SharedDocumentStore {
    let paths = StorePaths {
        index_path: dir.path().join("store.index"),
        metadata_path: dir.path().join("store.json"),
    };
    SharedDocumentStore::new(VectorDocumentStore::new(), paths)
}

fn meta(pairs: &[(&str, MetadataValue)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn service(store: &SharedDocumentStore, embedder: Arc<TableEmbedder>) -> RetrievalService {
    RetrievalService::new(
        Arc::new(store.get_or_create_collection("pages")),
        embedder,
    )
}

#[tokio::test]
async fn test_empty_collection_skips_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let retrieval = service(&store, TableEmbedder::new(&[]));

    // The embedder has no vector for this query, so calling it would fail.
    let records = retrieval.retrieve("anything", 5).await.unwrap();
    assert!(records.is_empty());
    assert!(retrieval
        .find_relevant_documents("anything", 5)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_find_relevant_documents_dedups_in_similarity_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    store
        .add(
            vec!["alpha".into(), "beta".into(), "alpha".into()],
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.5, 0.0]],
            vec!["a".into(), "b".into(), "c".into()],
            None,
        )
        .await
        .unwrap();

    let retrieval = service(&store, TableEmbedder::new(&[("q", [0.0, 0.0])]));

    let records = retrieval.retrieve("q", 3).await.unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c", "b"]);
    assert_eq!(records[1].distance, 0.25);

    let docs = retrieval.find_relevant_documents("q", 3).await.unwrap();
    assert_eq!(docs, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn test_find_relevant_documents_by_ordinal() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    store
        .add(
            vec!["third".into(), "unnumbered".into(), "first".into()],
            vec![vec![0.0, 0.0], vec![0.1, 0.0], vec![0.2, 0.0]],
            vec!["r1".into(), "r2".into(), "r3".into()],
            Some(vec![
                meta(&[("step", "Step 3: sign".into())]),
                Metadata::new(),
                meta(&[("step", MetadataValue::Integer(1))]),
            ]),
        )
        .await
        .unwrap();

    let retrieval = service(&store, TableEmbedder::new(&[("q", [0.0, 0.0])]));

    let docs = retrieval
        .find_relevant_documents_by_ordinal("q", 3, "step")
        .await
        .unwrap();
    assert_eq!(docs, vec!["first", "third", "unnumbered"]);
}

#[tokio::test]
async fn test_retrieve_where_fills_from_whole_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    store
        .add(
            vec!["img".into(), "page".into()],
            vec![vec![0.0, 0.0], vec![3.0, 0.0]],
            vec!["i".into(), "p".into()],
            Some(vec![
                meta(&[("kind", "image".into())]),
                meta(&[("kind", "page".into())]),
            ]),
        )
        .await
        .unwrap();

    let retrieval = service(&store, TableEmbedder::new(&[("q", [0.0, 0.0])]));
    let pages = retrieval
        .retrieve_where("q", 1, |r| {
            r.metadata.get("kind").and_then(MetadataValue::as_str) == Some("page")
        })
        .await
        .unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].id, "p");
}

#[tokio::test]
async fn test_chat_without_context_does_not_call_llm() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let llm = Arc::new(RecordingLlm::default());
    let chat = ChatOrchestrator::new(
        service(&store, TableEmbedder::new(&[])),
        llm.clone(),
        store.clone(),
    );

    let answer = chat.answer("Where is room 4?").await.unwrap();
    assert_eq!(answer.answer, NO_CONTEXT_REPLY);
    assert!(answer.context_ids.is_empty());
    assert_eq!(answer.page, None);
    assert!(llm.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_answers_with_page_images() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    store
        .add(
            vec![
                "Room 4 is upstairs.".into(),
                "Parking is outside.".into(),
                "https://img.example.com/plan.png".into(),
                "https://img.example.com/other.png".into(),
            ],
            vec![
                vec![0.0, 0.0],
                vec![5.0, 0.0],
                vec![0.0, 0.0],
                vec![0.0, 0.1],
            ],
            vec![
                "guide.pdf_2".into(),
                "guide.pdf_7".into(),
                "guide.pdf_img_guide_page2_img1.png".into(),
                "guide.pdf_img_guide_page3_img1.png".into(),
            ],
            Some(vec![
                meta(&[("kind", "page".into()), ("page_number", 2u32.into())]),
                meta(&[("kind", "page".into()), ("page_number", 7u32.into())]),
                meta(&[
                    ("kind", "image".into()),
                    ("pdf_source", "guide.pdf".into()),
                    ("page_number", 2u32.into()),
                ]),
                meta(&[
                    ("kind", "image".into()),
                    ("pdf_source", "guide.pdf".into()),
                    ("page_number", 3u32.into()),
                ]),
            ]),
        )
        .await
        .unwrap();

    let llm = Arc::new(RecordingLlm::default());
    let chat = ChatOrchestrator::new(
        service(&store, TableEmbedder::new(&[("Where is room 4?", [0.0, 0.0])])),
        llm.clone(),
        store.clone(),
    )
    .with_top_k(1)
    .with_prompt(PromptBuilder::new().with_system_instruction("Be brief."));

    let answer = chat.answer("Where is room 4?").await.unwrap();
    assert_eq!(answer.answer, "Room 4 is on the second floor.");
    assert_eq!(answer.context_ids, vec!["guide.pdf_2"]);
    assert_eq!(answer.source_document.as_deref(), Some("guide.pdf"));
    assert_eq!(answer.page, Some(2));
    assert_eq!(answer.images, vec!["https://img.example.com/plan.png"]);

    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(
        prompts.as_slice(),
        ["Be brief.\n\nContext:\nRoom 4 is upstairs.\n\nQuestion: Where is room 4?"]
    );
}
