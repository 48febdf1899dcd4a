//! Submission and pretest intake
//!
//! Both paths create a `pending` record, publish it on `record/change` and
//! hand it to the judge queue. Only submissions are graded and counted.

use tracing::info;

use crate::{
    authorization::{Perm, Viewer, require},
    constants::{MAX_PRETEST_INPUT_SIZE, PRETEST_RATE_LIMIT_ACTION},
    error::{AppError, AppResult},
    events::RecordChange,
    models::{NewRecord, PretestInput, ProblemKey, Record},
    services::{
        judge_queue::{JudgeTask, dispatch_or_log},
        problem_service::ProblemService,
    },
    state::AppState,
    utils::{
        parse_memory_mb, parse_time_ms,
        validation::{validate_language, validate_source_code},
    },
};

/// Language and code of a submission or pretest
#[derive(Debug, Clone)]
pub struct SourceCode {
    pub language: String,
    pub code: String,
}

/// Submission service for business logic
pub struct SubmissionService;

impl SubmissionService {
    /// Create a graded record
    ///
    /// The record and both `n_submit` counters are written in one store
    /// transaction; nothing is written when a check fails.
    pub async fn submit(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
        source: SourceCode,
    ) -> AppResult<Record> {
        let (user_id, record) = Self::prepare(state, domain_id, key, viewer, source).await?;

        let record = state.store().insert_submission(record).await?;
        info!(
            domain_id,
            rid = %record.id,
            problem_id = %record.problem_id,
            user_id = %user_id,
            language = %record.language,
            "Submission created"
        );

        Self::publish(state, &record).await;
        Ok(record)
    }

    /// Create an ungraded trial run against `input`
    pub async fn pretest(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
        source: SourceCode,
        input: String,
    ) -> AppResult<Record> {
        if input.len() > MAX_PRETEST_INPUT_SIZE {
            return Err(AppError::Validation(
                "Pretest input exceeds maximum size of 1MB".to_string(),
            ));
        }
        let (user_id, mut record) = Self::prepare(state, domain_id, key, viewer, source).await?;

        let limits = &state.config().pretest;
        state
            .limiter()
            .hit(
                &user_id.to_string(),
                PRETEST_RATE_LIMIT_ACTION,
                limits.window_secs,
                limits.max_per_window,
            )
            .await?
            .check()?;

        record.pretest = Some(PretestInput {
            input,
            time_limit_ms: parse_time_ms(&limits.time)?,
            memory_limit_mb: parse_memory_mb(&limits.memory)?,
        });
        let record = state.store().insert_pretest(record).await?;
        info!(
            domain_id,
            rid = %record.id,
            problem_id = %record.problem_id,
            user_id = %user_id,
            "Pretest created"
        );

        Self::publish(state, &record).await;
        Ok(record)
    }

    /// All checks that must pass before anything is written
    async fn prepare(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
        source: SourceCode,
    ) -> AppResult<(uuid::Uuid, NewRecord)> {
        let user_id = viewer.require_user()?;
        require(viewer, Perm::SubmitProblem)?;
        let problem = ProblemService::load(state, domain_id, key, viewer).await?;

        validate_language(&source.language).map_err(|e| AppError::Validation(e.to_string()))?;
        validate_source_code(&source.code).map_err(|e| AppError::Validation(e.to_string()))?;

        Ok((
            user_id,
            NewRecord {
                domain_id: domain_id.to_string(),
                problem_id: problem.id,
                user_id,
                contest_id: None,
                language: source.language,
                source_code: source.code,
                pretest: None,
            },
        ))
    }

    async fn publish(state: &AppState, record: &Record) {
        state.bus().broadcast::<RecordChange>(record);
        dispatch_or_log(state.judge(), JudgeTask::for_record(record, false)).await;
    }
}
