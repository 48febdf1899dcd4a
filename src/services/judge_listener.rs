//! Consumer of judge reports
//!
//! Judges push [`RecordReport`] JSON onto a Redis list; each report is
//! stored and republished so live connections see progress.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{error, info, warn};

use crate::{
    models::{Record, RecordReport},
    services::record_service::RecordService,
    state::AppState,
};

/// Seconds a `BRPOP` blocks before polling again
pub const POLL_TIMEOUT_SECS: f64 = 5.0;

pub struct ReportListener {
    /// Dedicated connection; `BRPOP` would stall a shared one
    redis: ConnectionManager,
    queue: String,
    state: AppState,
}

impl ReportListener {
    pub fn new(redis: ConnectionManager, queue: impl Into<String>, state: AppState) -> Self {
        Self {
            redis,
            queue: queue.into(),
            state,
        }
    }

    /// Process reports until the task is aborted
    pub async fn run(mut self) {
        info!(queue = %self.queue, "Listening for judge reports");

        loop {
            let popped: Option<(String, String)> =
                match self.redis.brpop(&self.queue, POLL_TIMEOUT_SECS).await {
                    Ok(popped) => popped,
                    Err(e) => {
                        error!(error = %e, "Failed to read judge reports");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        continue;
                    }
                };

            if let Some((_, payload)) = popped {
                handle_report(&self.state, &payload).await;
            }
        }
    }
}

/// Parse one report payload and apply it; failures are logged
pub async fn handle_report(state: &AppState, payload: &str) -> Option<Record> {
    let report: RecordReport = match serde_json::from_str(payload) {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "Discarding malformed judge report");
            return None;
        }
    };

    match RecordService::apply_report(state, &report).await {
        Ok(record) => Some(record),
        Err(e) => {
            error!(rid = %report.rid, error = %e, "Failed to apply judge report");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::config::Config;
    use crate::events::RecordChange;
    use crate::models::{NewRecord, ProblemKey, Verdict};
    use crate::services::judge_queue::MockJudgeQueue;

    async fn pending_record(state: &AppState) -> Record {
        let problem = state
            .store()
            .create_problem(crate::models::NewProblem {
                domain_id: "system".to_string(),
                pid: None,
                owner_id: Uuid::new_v4(),
                title: "A + B".to_string(),
                content: "Add.".to_string(),
                html: false,
                hidden: false,
                category: vec![],
                tag: vec![],
            })
            .await
            .unwrap();
        state
            .store()
            .insert_submission(NewRecord {
                domain_id: "system".to_string(),
                problem_id: problem.id,
                user_id: Uuid::new_v4(),
                contest_id: None,
                language: "cpp".to_string(),
                source_code: "int main(){}".to_string(),
                pretest: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_report_updates_and_publishes() {
        let state = AppState::in_memory(Arc::new(MockJudgeQueue::new()), Config::default());
        let record = pending_record(&state).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = state
            .bus()
            .on::<RecordChange, _>(move |r| sink.lock().unwrap().push(r.status));

        let payload = json!({"rid": record.id, "status": "accepted", "score": 100}).to_string();
        let updated = handle_report(&state, &payload).await.unwrap();
        assert_eq!(updated.status, Verdict::Accepted);
        assert!(updated.judged_at.is_some());
        assert_eq!(*seen.lock().unwrap(), vec![Verdict::Accepted]);

        let problem = state
            .store()
            .get_problem("system", &ProblemKey::Id(record.problem_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(problem.n_accept, 1);
    }

    #[tokio::test]
    async fn test_bad_reports_are_skipped() {
        let state = AppState::in_memory(Arc::new(MockJudgeQueue::new()), Config::default());
        let seen = Arc::new(Mutex::new(0));
        let sink = seen.clone();
        let _sub = state
            .bus()
            .on::<RecordChange, _>(move |_| *sink.lock().unwrap() += 1);

        assert!(handle_report(&state, "not json").await.is_none());
        let unknown = json!({"rid": Uuid::new_v4(), "status": "accepted"}).to_string();
        assert!(handle_report(&state, &unknown).await.is_none());
        assert_eq!(*seen.lock().unwrap(), 0);
    }
}
