//! Storage seam used by the services
//!
//! `PgStore` backs production; `MemoryStore` backs tests and local runs
//! without a database.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        DomainUser, NewProblem, NewRecord, Problem, ProblemEdit, ProblemFilter, ProblemKey,
        ProblemSettings, Record, RecordReport,
    },
};

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn get_problem(&self, domain_id: &str, key: &ProblemKey) -> AppResult<Option<Problem>>;

    /// One page of problems matching `filter`, newest first, plus the total match count
    async fn list_problems(
        &self,
        domain_id: &str,
        filter: &ProblemFilter,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Problem>, i64)>;

    async fn random_problem(
        &self,
        domain_id: &str,
        filter: &ProblemFilter,
    ) -> AppResult<Option<Problem>>;

    async fn create_problem(&self, problem: NewProblem) -> AppResult<Problem>;

    async fn edit_problem(&self, id: Uuid, edit: ProblemEdit) -> AppResult<Problem>;

    async fn update_problem_settings(
        &self,
        id: Uuid,
        settings: &ProblemSettings,
    ) -> AppResult<Problem>;

    /// Attach a test-data bundle
    async fn set_problem_data(&self, id: Uuid, data: Vec<u8>, digest: String) -> AppResult<()>;

    async fn get_problem_data(&self, id: Uuid) -> AppResult<Option<Vec<u8>>>;

    /// Insert a graded record and bump the problem and domain-user `n_submit`
    /// counters, all or nothing
    async fn insert_submission(&self, record: NewRecord) -> AppResult<Record>;

    /// Insert a pretest record; no counters change
    async fn insert_pretest(&self, record: NewRecord) -> AppResult<Record>;

    async fn get_record(&self, domain_id: &str, rid: Uuid) -> AppResult<Option<Record>>;

    /// Latest records of one user on one problem, newest first
    async fn recent_records(
        &self,
        domain_id: &str,
        problem_id: Uuid,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Record>>;

    /// Every non-pretest record of a problem
    async fn graded_records(&self, domain_id: &str, problem_id: Uuid) -> AppResult<Vec<Record>>;

    /// Return a record to `pending` with its judge output cleared
    async fn reset_record(&self, rid: Uuid) -> AppResult<Record>;

    /// Apply a judge report; a graded record entering or leaving `accepted`
    /// moves the `n_accept` counters by one
    async fn apply_report(&self, report: &RecordReport) -> AppResult<Record>;

    async fn domain_user(&self, domain_id: &str, user_id: Uuid) -> AppResult<DomainUser>;
}
