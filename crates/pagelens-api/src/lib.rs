//! PageLens API - HTTP server
//!
//! Provides HTTP endpoints for document search, grounded chat and
//! document removal over the PageLens store.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, AppError};
pub use routes::create_router;
pub use state::AppState;
