//! Judge dispatch
//!
//! Records are judged by an external worker pool that pops JSON tasks from
//! a Redis list.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{PretestInput, Record},
};

/// Task pushed to the judge queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeTask {
    pub rid: Uuid,
    pub domain_id: String,
    pub problem_id: Uuid,
    pub language: String,
    pub source_code: String,
    /// Run against this stdin only, ungraded
    pub pretest: Option<PretestInput>,
    pub rejudge: bool,
}

impl JudgeTask {
    pub fn for_record(record: &Record, rejudge: bool) -> Self {
        Self {
            rid: record.id,
            domain_id: record.domain_id.clone(),
            problem_id: record.problem_id,
            language: record.language.clone(),
            source_code: record.source_code.clone(),
            pretest: record.pretest.clone(),
            rejudge,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JudgeQueue: Send + Sync {
    async fn dispatch(&self, task: JudgeTask) -> AppResult<()>;
}

/// Dispatch a task for an already stored record
///
/// The record stays `pending` on failure and can be rejudged, so the error
/// is logged rather than returned.
pub async fn dispatch_or_log(queue: &dyn JudgeQueue, task: JudgeTask) {
    let rid = task.rid;
    match queue.dispatch(task).await {
        Ok(()) => tracing::debug!(rid = %rid, "Judge task queued"),
        Err(e) => tracing::error!(rid = %rid, error = %e, "Failed to queue judge task"),
    }
}

/// `LPUSH` onto a Redis list
#[derive(Clone)]
pub struct RedisJudgeQueue {
    redis: ConnectionManager,
    queue: String,
}

impl RedisJudgeQueue {
    pub fn new(redis: ConnectionManager, queue: impl Into<String>) -> Self {
        Self {
            redis,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl JudgeQueue for RedisJudgeQueue {
    async fn dispatch(&self, task: JudgeTask) -> AppResult<()> {
        let payload = serde_json::to_string(&task)?;
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(&self.queue, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::record::fixtures::judged_record;

    #[test]
    fn test_task_carries_pretest_input() {
        let mut record = judged_record("system", Uuid::new_v4(), Uuid::new_v4());
        record.pretest = Some(PretestInput {
            input: "1 2".to_string(),
            time_limit_ms: 1000,
            memory_limit_mb: 256,
        });

        let task = JudgeTask::for_record(&record, false);
        assert_eq!(task.rid, record.id);
        assert_eq!(task.pretest, record.pretest);

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["pretest"]["time_limit_ms"], 1000);
        assert_eq!(json["rejudge"], false);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_swallowed() {
        let mut queue = MockJudgeQueue::new();
        queue
            .expect_dispatch()
            .times(1)
            .returning(|_| Err(AppError::Redis("connection refused".to_string())));

        let record = judged_record("system", Uuid::new_v4(), Uuid::new_v4());
        dispatch_or_log(&queue, JudgeTask::for_record(&record, false)).await;
    }
}
