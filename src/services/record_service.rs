//! Record detail and judge feedback

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    authorization::{Perm, PermissionCheck, Viewer},
    error::{AppError, AppResult},
    events::RecordChange,
    models::{Record, RecordReport},
    state::AppState,
};

pub struct RecordService;

impl RecordService {
    /// Full record for its owner or a viewer holding `ViewAnyRecord`
    pub async fn detail(
        state: &AppState,
        domain_id: &str,
        rid: Uuid,
        viewer: &Viewer,
    ) -> AppResult<Record> {
        let record = state
            .store()
            .get_record(domain_id, rid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", rid)))?;

        if !viewer.is(&record.user_id) && !viewer.has_perm(Perm::ViewAnyRecord) {
            return Err(AppError::Forbidden("Record belongs to another user".to_string()));
        }
        Ok(record)
    }

    /// Store a judge report and publish the updated record
    pub async fn apply_report(state: &AppState, report: &RecordReport) -> AppResult<Record> {
        let record = state.store().apply_report(report).await?;
        if record.status.is_final() {
            info!(rid = %record.id, status = %record.status, score = record.score, "Record judged");
        } else {
            debug!(rid = %record.id, status = %record.status, "Record progress");
        }

        state.bus().broadcast::<RecordChange>(&record);
        Ok(record)
    }
}
