//! Chat orchestration
//!
//! Retrieves page context for a question, asks the LLM, and attaches the
//! images stored for the page the best match came from.
//!
//! Author: hephaex@gmail.com

use std::path::Path;
use std::sync::Arc;

use pagelens_core::{LlmClient, LlmConfig, MetadataValue, PageId, PageLensError, Result};
use pagelens_vector::SharedDocumentStore;
use serde::Serialize;

use crate::retrieval::{RetrievalService, RetrievedRecord};

/// Reply used when retrieval finds nothing; the LLM is not called
pub const NO_CONTEXT_REPLY: &str = "No relevant context found. Try rephrasing your question!";

/// Metadata `kind` of image records
const IMAGE_KIND: &str = "image";

// ============================================================================
// Prompt
// ============================================================================

/// Builds the grounded prompt sent to the LLM
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    system_instruction: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `instruction` to every prompt
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = (!instruction.trim().is_empty()).then_some(instruction);
        self
    }

    /// Load the system instruction configured for the LLM, if any
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match &config.system_prompt_file {
            Some(path) => Ok(Self::new().with_system_instruction(read_prompt(path)?)),
            None => Ok(Self::new()),
        }
    }

    pub fn build(&self, question: &str, context: &[&str]) -> String {
        let body = format!("Context:\n{}\n\nQuestion: {question}", context.join("\n"));
        match &self.system_instruction {
            Some(instruction) => format!("{}\n\n{body}", instruction.trim_end()),
            None => body,
        }
    }
}

fn read_prompt(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        PageLensError::ConfigError(format!(
            "failed to read system prompt {}: {e}",
            path.display()
        ))
    })
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Answer to one chat question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub answer: String,

    /// Ids of the records used as context, nearest first
    pub context_ids: Vec<String>,

    /// Document of the best matching page
    pub source_document: Option<String>,

    /// Page number of the best matching page
    pub page: Option<u32>,

    /// Image URLs stored for that page
    pub images: Vec<String>,
}

impl ChatAnswer {
    fn no_context() -> Self {
        Self {
            answer: NO_CONTEXT_REPLY.to_string(),
            context_ids: Vec::new(),
            source_document: None,
            page: None,
            images: Vec::new(),
        }
    }
}

/// Retrieval-grounded question answering
#[derive(Clone)]
pub struct ChatOrchestrator {
    retrieval: RetrievalService,
    llm: Arc<dyn LlmClient>,
    store: SharedDocumentStore,
    prompt: PromptBuilder,
    top_k: usize,
}

impl ChatOrchestrator {
    pub fn new(
        retrieval: RetrievalService,
        llm: Arc<dyn LlmClient>,
        store: SharedDocumentStore,
    ) -> Self {
        Self {
            retrieval,
            llm,
            store,
            prompt: PromptBuilder::new(),
            top_k: 3,
        }
    }

    /// Number of context records per question
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub async fn answer(&self, question: &str) -> Result<ChatAnswer> {
        let context = self
            .retrieval
            .retrieve_where(question, self.top_k, |record| !is_image(record))
            .await?;

        if context.is_empty() {
            tracing::info!("No context found for question");
            return Ok(ChatAnswer::no_context());
        }

        let documents: Vec<&str> = context.iter().map(|r| r.document.as_str()).collect();
        let prompt = self.prompt.build(question, &documents);

        tracing::debug!(model = self.llm.model(), context = context.len(), "Generating answer");
        let answer = self.llm.generate(&prompt).await?;

        let page = match context[0].id.parse::<PageId>() {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::debug!(error = %e, "Top context record is not a page");
                None
            }
        };
        let images = match &page {
            Some(page) => self.images_for_page(page).await,
            None => Vec::new(),
        };

        Ok(ChatAnswer {
            answer,
            context_ids: context.into_iter().map(|r| r.id).collect(),
            source_document: page.as_ref().map(|p| p.document.clone()),
            page: page.map(|p| p.page),
            images,
        })
    }

    /// URLs of image records extracted from `page`
    pub async fn images_for_page(&self, page: &PageId) -> Vec<String> {
        let page_number = MetadataValue::from(page.page);
        self.store
            .records_matching(|record| {
                let meta = record.metadata;
                meta.get("kind").and_then(MetadataValue::as_str) == Some(IMAGE_KIND)
                    && meta.get("pdf_source").and_then(MetadataValue::as_str)
                        == Some(page.document.as_str())
                    && meta.get("page_number") == Some(&page_number)
            })
            .await
            .into_iter()
            .map(|record| record.document)
            .collect()
    }
}

fn is_image(record: &RetrievedRecord) -> bool {
    record.metadata.get("kind").and_then(MetadataValue::as_str) == Some(IMAGE_KIND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_instruction() {
        let prompt = PromptBuilder::new().build("Where is room 4?", &["page one", "page two"]);
        assert_eq!(
            prompt,
            "Context:\npage one\npage two\n\nQuestion: Where is room 4?"
        );
    }

    #[test]
    fn test_prompt_with_instruction() {
        let prompt = PromptBuilder::new()
            .with_system_instruction("Answer briefly.\n")
            .build("Why?", &["ctx"]);
        assert_eq!(prompt, "Answer briefly.\n\nContext:\nctx\n\nQuestion: Why?");

        let blank = PromptBuilder::new().with_system_instruction("  ");
        assert_eq!(blank.build("q", &[]), "Context:\n\n\nQuestion: q");
    }

    #[test]
    fn test_prompt_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.txt");
        std::fs::write(&path, "You are a facilities assistant.").unwrap();

        let config = LlmConfig {
            system_prompt_file: Some(path),
            ..LlmConfig::default()
        };
        let prompt = PromptBuilder::from_config(&config).unwrap().build("q", &["c"]);
        assert!(prompt.starts_with("You are a facilities assistant.\n\nContext:"));

        let missing = LlmConfig {
            system_prompt_file: Some(dir.path().join("nope.txt")),
            ..LlmConfig::default()
        };
        assert!(matches!(
            PromptBuilder::from_config(&missing),
            Err(PageLensError::ConfigError(_))
        ));
    }
}
