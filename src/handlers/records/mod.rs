//! Record handlers, mounted under `/d/{domain_id}/records`

mod handler;

pub use handler::*;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Record routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/{rid}", get(handler::get_record))
}
