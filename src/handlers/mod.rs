//! HTTP Request Handlers
//!
//! This module contains all HTTP request handlers organized by domain.

pub mod connections;
pub mod health;
pub mod problems;
pub mod records;

use axum::{Router, middleware};

use crate::{
    middleware::{api_rate_limit_middleware, logging_middleware, optional_auth_middleware},
    state::AppState,
};

/// Create all API routes
///
/// Every domain-scoped route lives under `/d/{domain_id}`. The caller is
/// resolved once by the outermost layer; handlers decide what a guest may do.
pub fn routes(state: AppState) -> Router<AppState> {
    let domain = Router::new()
        .nest("/problems", problems::routes())
        .nest("/records", records::routes())
        .nest("/conn", connections::routes());

    Router::new()
        .merge(health::routes())
        .nest("/d/{domain_id}", domain)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_rate_limit_middleware,
        ))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}
