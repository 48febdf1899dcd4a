//! Record repository

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, types::Json};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{PretestInput, Record, TestCaseResult},
};

/// Row shape of the `records` table
#[derive(Debug, FromRow)]
pub struct RecordRow {
    pub id: Uuid,
    pub domain_id: String,
    pub problem_id: Uuid,
    pub user_id: Uuid,
    pub contest_id: Option<Uuid>,
    pub language: String,
    pub source_code: String,
    pub status: String,
    pub score: i32,
    pub time_ms: i64,
    pub memory_kb: i64,
    pub compiler_texts: Vec<String>,
    pub judge_texts: Vec<String>,
    pub test_cases: Json<Vec<TestCaseResult>>,
    pub pretest: Option<Json<PretestInput>>,
    pub submitted_at: DateTime<Utc>,
    pub judged_at: Option<DateTime<Utc>>,
}

impl TryFrom<RecordRow> for Record {
    type Error = AppError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(Record {
            status: row.status.parse().map_err(AppError::Database)?,
            id: row.id,
            domain_id: row.domain_id,
            problem_id: row.problem_id,
            user_id: row.user_id,
            contest_id: row.contest_id,
            language: row.language,
            source_code: row.source_code,
            score: row.score,
            time_ms: row.time_ms,
            memory_kb: row.memory_kb,
            compiler_texts: row.compiler_texts,
            judge_texts: row.judge_texts,
            test_cases: row.test_cases.0,
            pretest: row.pretest.map(|p| p.0),
            submitted_at: row.submitted_at,
            judged_at: row.judged_at,
        })
    }
}

fn into_records(rows: Vec<RecordRow>) -> AppResult<Vec<Record>> {
    rows.into_iter().map(Record::try_from).collect()
}

/// Repository for record database operations
pub struct RecordRepository;

impl RecordRepository {
    pub async fn insert(conn: &mut PgConnection, record: &Record) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO records (
                id, domain_id, problem_id, user_id, contest_id, language, source_code,
                status, test_cases, pretest, submitted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(&record.domain_id)
        .bind(record.problem_id)
        .bind(record.user_id)
        .bind(record.contest_id)
        .bind(&record.language)
        .bind(&record.source_code)
        .bind(record.status.as_str())
        .bind(Json(&record.test_cases))
        .bind(record.pretest.as_ref().map(Json))
        .bind(record.submitted_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn find(pool: &PgPool, domain_id: &str, rid: Uuid) -> AppResult<Option<Record>> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"SELECT * FROM records WHERE domain_id = $1 AND id = $2"#,
        )
        .bind(domain_id)
        .bind(rid)
        .fetch_optional(pool)
        .await?;

        row.map(Record::try_from).transpose()
    }

    /// Lock a record row for the rest of the transaction
    pub async fn find_for_update(conn: &mut PgConnection, rid: Uuid) -> AppResult<Record> {
        let row = sqlx::query_as::<_, RecordRow>(r#"SELECT * FROM records WHERE id = $1 FOR UPDATE"#)
            .bind(rid)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", rid)))?;

        Record::try_from(row)
    }

    pub async fn recent(
        pool: &PgPool,
        domain_id: &str,
        problem_id: Uuid,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT * FROM records
            WHERE domain_id = $1 AND problem_id = $2 AND user_id = $3
            ORDER BY submitted_at DESC
            LIMIT $4
            "#,
        )
        .bind(domain_id)
        .bind(problem_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        into_records(rows)
    }

    /// Non-pretest records of a problem, oldest first
    pub async fn graded(pool: &PgPool, domain_id: &str, problem_id: Uuid) -> AppResult<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT * FROM records
            WHERE domain_id = $1 AND problem_id = $2 AND pretest IS NULL
            ORDER BY submitted_at
            "#,
        )
        .bind(domain_id)
        .bind(problem_id)
        .fetch_all(pool)
        .await?;

        into_records(rows)
    }

    /// Persist the judge-owned fields of a record
    pub async fn save_result(conn: &mut PgConnection, record: &Record) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE records
            SET
                status = $2,
                score = $3,
                time_ms = $4,
                memory_kb = $5,
                compiler_texts = $6,
                judge_texts = $7,
                test_cases = $8,
                judged_at = $9
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(record.score)
        .bind(record.time_ms)
        .bind(record.memory_kb)
        .bind(&record.compiler_texts)
        .bind(&record.judge_texts)
        .bind(Json(&record.test_cases))
        .bind(record.judged_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}
