//! Postgres-backed store

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        DomainUser, NewProblem, NewRecord, Problem, ProblemEdit, ProblemFilter, ProblemKey,
        ProblemSettings, Record, RecordReport,
    },
    utils::now_utc,
};

use super::{
    repositories::{DomainUserRepository, ProblemRepository, RecordRepository},
    store::ProblemStore,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_record(&self, record: NewRecord, counted: bool) -> AppResult<Record> {
        let record = record.into_record(Uuid::new_v4(), now_utc());
        let mut tx = self.pool.begin().await?;

        if counted {
            ProblemRepository::increment_submit(&mut tx, record.problem_id).await?;
            DomainUserRepository::increment_submit(&mut tx, &record.domain_id, record.user_id)
                .await?;
        }
        RecordRepository::insert(&mut tx, &record).await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn bump_accept(
        conn: &mut sqlx::PgConnection,
        record: &Record,
        delta: i64,
    ) -> AppResult<()> {
        ProblemRepository::add_accept(conn, record.problem_id, delta).await?;
        DomainUserRepository::add_accept(conn, &record.domain_id, record.user_id, delta).await
    }
}

#[async_trait]
impl ProblemStore for PgStore {
    async fn get_problem(&self, domain_id: &str, key: &ProblemKey) -> AppResult<Option<Problem>> {
        ProblemRepository::find(&self.pool, domain_id, key).await
    }

    async fn list_problems(
        &self,
        domain_id: &str,
        filter: &ProblemFilter,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Problem>, i64)> {
        ProblemRepository::list(&self.pool, domain_id, filter, offset, limit).await
    }

    async fn random_problem(
        &self,
        domain_id: &str,
        filter: &ProblemFilter,
    ) -> AppResult<Option<Problem>> {
        ProblemRepository::random(&self.pool, domain_id, filter).await
    }

    async fn create_problem(&self, problem: NewProblem) -> AppResult<Problem> {
        ProblemRepository::create(&self.pool, &problem).await
    }

    async fn edit_problem(&self, id: Uuid, edit: ProblemEdit) -> AppResult<Problem> {
        ProblemRepository::update_statement(&self.pool, id, &edit).await
    }

    async fn update_problem_settings(
        &self,
        id: Uuid,
        settings: &ProblemSettings,
    ) -> AppResult<Problem> {
        ProblemRepository::update_settings(&self.pool, id, settings).await
    }

    async fn set_problem_data(&self, id: Uuid, data: Vec<u8>, digest: String) -> AppResult<()> {
        ProblemRepository::set_data(&self.pool, id, &data, &digest).await
    }

    async fn get_problem_data(&self, id: Uuid) -> AppResult<Option<Vec<u8>>> {
        ProblemRepository::get_data(&self.pool, id).await
    }

    async fn insert_submission(&self, record: NewRecord) -> AppResult<Record> {
        self.insert_record(record, true).await
    }

    async fn insert_pretest(&self, record: NewRecord) -> AppResult<Record> {
        self.insert_record(record, false).await
    }

    async fn get_record(&self, domain_id: &str, rid: Uuid) -> AppResult<Option<Record>> {
        RecordRepository::find(&self.pool, domain_id, rid).await
    }

    async fn recent_records(
        &self,
        domain_id: &str,
        problem_id: Uuid,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Record>> {
        RecordRepository::recent(&self.pool, domain_id, problem_id, user_id, limit).await
    }

    async fn graded_records(&self, domain_id: &str, problem_id: Uuid) -> AppResult<Vec<Record>> {
        RecordRepository::graded(&self.pool, domain_id, problem_id).await
    }

    async fn reset_record(&self, rid: Uuid) -> AppResult<Record> {
        let mut tx = self.pool.begin().await?;
        let mut record = RecordRepository::find_for_update(&mut tx, rid).await?;
        if record.counts_as_accepted() {
            Self::bump_accept(&mut tx, &record, -1).await?;
        }
        record.reset();
        RecordRepository::save_result(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn apply_report(&self, report: &RecordReport) -> AppResult<Record> {
        let mut tx = self.pool.begin().await?;
        let mut record = RecordRepository::find_for_update(&mut tx, report.rid).await?;
        let delta = record.apply(report);
        if delta != 0 {
            Self::bump_accept(&mut tx, &record, delta).await?;
        }
        RecordRepository::save_result(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn domain_user(&self, domain_id: &str, user_id: Uuid) -> AppResult<DomainUser> {
        Ok(DomainUserRepository::find(&self.pool, domain_id, user_id)
            .await?
            .unwrap_or_else(|| DomainUser {
                domain_id: domain_id.to_string(),
                user_id,
                ..Default::default()
            }))
    }
}
