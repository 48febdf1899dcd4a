//! Record handler implementations

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    authorization::Viewer,
    error::AppResult,
    middleware::auth::OptionalAuth,
    models::Record,
    services::RecordService,
    state::AppState,
};

/// Full record, visible to its owner
pub async fn get_record(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, rid)): Path<(String, Uuid)>,
) -> AppResult<Json<Record>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let record = RecordService::detail(&state, &domain_id, rid, &viewer).await?;
    Ok(Json(record))
}
