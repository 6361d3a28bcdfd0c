//! Search and chat handlers
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Search request body
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,

    /// Number of records to retrieve, defaults to the configured value
    pub top_k: Option<usize>,

    /// Metadata key used to re-order results, defaults to the configured value
    pub ordinal_key: Option<String>,
}

/// Search response body
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Distinct documents, nearest first unless re-ordered by ordinal
    pub documents: Vec<String>,
}

/// Find the documents most relevant to a query
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("Query cannot be empty".to_string()));
    }

    let retrieval_config = &state.config.retrieval;
    let top_k = req.top_k.unwrap_or(retrieval_config.top_k);
    let ordinal_key = req
        .ordinal_key
        .as_deref()
        .or(retrieval_config.ordinal_key.as_deref());

    let documents = match ordinal_key {
        Some(key) => {
            state
                .retrieval
                .find_relevant_documents_by_ordinal(query, top_k, key)
                .await?
        }
        None => state.retrieval.find_relevant_documents(query, top_k).await?,
    };

    tracing::debug!(top_k, found = documents.len(), "Search completed");
    Ok(Json(SearchResponse { documents }))
}

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

/// Answer a question from stored pages
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(AppError::BadRequest("Question cannot be empty".to_string()));
    }

    let chat = state
        .chat
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("No LLM is configured".to_string()))?;

    Ok(Json(chat.answer(question).await?))
}
