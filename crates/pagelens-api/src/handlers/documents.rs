//! Document management handlers
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Delete document response
#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    /// Records removed
    pub removed: usize,
}

/// Delete every record of a document
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("Document name cannot be empty".to_string()));
    }

    tracing::info!(document = %name, "Deleting document");
    let removed = state.ingest.remove_document(&name).await?;
    Ok(Json(DeleteDocumentResponse { removed }))
}

/// Store statistics
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub records: usize,
    /// Vector dimension, absent while the store is empty
    pub dimension: Option<usize>,
    /// Documents with stored records
    pub documents: Vec<String>,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatsResponse {
        records: state.store.count().await,
        dimension: state.store.dimension().await,
        documents: state.ingest.documents().await,
    })
}
