//! Problem handlers, mounted under `/d/{domain_id}/problems`

mod handler;
pub mod request;
pub mod response;

pub use handler::*;
pub use request::*;
pub use response::*;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::{constants::MAX_IMPORT_BUNDLE_SIZE, state::AppState};

/// Problem routes
pub fn routes() -> Router<AppState> {
    // base64 inflates the bundle by a third, plus the JSON envelope
    let import_limit = MAX_IMPORT_BUNDLE_SIZE / 3 * 4 + 64 * 1024;

    Router::new()
        .route("/", get(handler::list_problems).post(handler::create_problem))
        .route("/random", get(handler::random_problem))
        .route("/category/{category}", get(handler::list_by_category))
        .route(
            "/import",
            post(handler::import_problem).layer(DefaultBodyLimit::max(import_limit)),
        )
        .route("/{pid}", get(handler::get_problem).put(handler::edit_problem))
        .route("/{pid}/submit", get(handler::submit_page).post(handler::submit))
        .route("/{pid}/pretest", post(handler::pretest))
        .route(
            "/{pid}/settings",
            get(handler::get_settings).post(handler::update_settings),
        )
        .route("/{pid}/rejudge", post(handler::rejudge))
        .route("/{pid}/export", get(handler::export_problem))
        .route("/{pid}/copy", post(handler::copy_problem))
        .route(
            "/{pid}/data",
            get(handler::download_data)
                .post(handler::upload_data)
                .layer(DefaultBodyLimit::max(import_limit)),
        )
        .route("/{pid}/statistics", get(handler::statistics))
}
