//! Live connections, mounted under `/d/{domain_id}/conn`

mod handler;

pub use handler::*;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Connection routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/pretest", get(handler::pretest_connection))
}
