//! Problem repository

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{NewProblem, Problem, ProblemEdit, ProblemFilter, ProblemKey, ProblemSettings},
};

/// Every column except the test-data blob
const PROBLEM_COLUMNS: &str = "id, domain_id, pid, owner_id, title, content, html, hidden, \
     category, tag, difficulty_setting, difficulty_admin, n_submit, n_accept, data_digest, \
     created_at, updated_at";

/// Shared listing predicate, binds `$1..=$6`
const FILTER_CLAUSE: &str = r#"
    domain_id = $1
    AND ($2 OR hidden = FALSE)
    AND ($3::uuid IS NULL OR owner_id = $3)
    AND NOT (id = ANY($4))
    AND $5::text[] <@ (category || tag)
    AND ($6::text IS NULL OR title ILIKE $6 OR content ILIKE $6 OR pid ILIKE $6)
"#;

fn search_pattern(filter: &ProblemFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

/// Repository for problem database operations
pub struct ProblemRepository;

impl ProblemRepository {
    /// Find a problem by UUID or alias
    pub async fn find(
        pool: &PgPool,
        domain_id: &str,
        key: &ProblemKey,
    ) -> AppResult<Option<Problem>> {
        let problem = match key {
            ProblemKey::Id(id) => {
                sqlx::query_as::<_, Problem>(&format!(
                    "SELECT {PROBLEM_COLUMNS} FROM problems WHERE domain_id = $1 AND id = $2"
                ))
                .bind(domain_id)
                .bind(id)
                .fetch_optional(pool)
                .await?
            }
            ProblemKey::Alias(alias) => {
                sqlx::query_as::<_, Problem>(&format!(
                    "SELECT {PROBLEM_COLUMNS} FROM problems WHERE domain_id = $1 AND pid = $2"
                ))
                .bind(domain_id)
                .bind(alias)
                .fetch_optional(pool)
                .await?
            }
        };

        Ok(problem)
    }

    /// List problems with pagination
    pub async fn list(
        pool: &PgPool,
        domain_id: &str,
        filter: &ProblemFilter,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Problem>, i64)> {
        let search = search_pattern(filter);

        let problems = sqlx::query_as::<_, Problem>(&format!(
            "SELECT {PROBLEM_COLUMNS} FROM problems WHERE {FILTER_CLAUSE} \
             ORDER BY created_at DESC OFFSET $7 LIMIT $8"
        ))
        .bind(domain_id)
        .bind(filter.include_hidden)
        .bind(filter.owner_id)
        .bind(&filter.exclude_ids)
        .bind(&filter.categories)
        .bind(&search)
        .bind(offset)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM problems WHERE {FILTER_CLAUSE}"))
                .bind(domain_id)
                .bind(filter.include_hidden)
                .bind(filter.owner_id)
                .bind(&filter.exclude_ids)
                .bind(&filter.categories)
                .bind(&search)
                .fetch_one(pool)
                .await?;

        Ok((problems, count))
    }

    /// Pick one matching problem uniformly at random
    pub async fn random(
        pool: &PgPool,
        domain_id: &str,
        filter: &ProblemFilter,
    ) -> AppResult<Option<Problem>> {
        let problem = sqlx::query_as::<_, Problem>(&format!(
            "SELECT {PROBLEM_COLUMNS} FROM problems WHERE {FILTER_CLAUSE} \
             ORDER BY random() LIMIT 1"
        ))
        .bind(domain_id)
        .bind(filter.include_hidden)
        .bind(filter.owner_id)
        .bind(&filter.exclude_ids)
        .bind(&filter.categories)
        .bind(search_pattern(filter))
        .fetch_optional(pool)
        .await?;

        Ok(problem)
    }

    /// Create a new problem
    pub async fn create(pool: &PgPool, problem: &NewProblem) -> AppResult<Problem> {
        let created = sqlx::query_as::<_, Problem>(&format!(
            r#"
            INSERT INTO problems (
                id, domain_id, pid, owner_id, title, content, html, hidden, category, tag
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROBLEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&problem.domain_id)
        .bind(&problem.pid)
        .bind(problem.owner_id)
        .bind(&problem.title)
        .bind(&problem.content)
        .bind(problem.html)
        .bind(problem.hidden)
        .bind(&problem.category)
        .bind(&problem.tag)
        .fetch_one(pool)
        .await?;

        Ok(created)
    }

    /// Update title, content and alias
    pub async fn update_statement(
        pool: &PgPool,
        id: Uuid,
        edit: &ProblemEdit,
    ) -> AppResult<Problem> {
        let problem = sqlx::query_as::<_, Problem>(&format!(
            r#"
            UPDATE problems
            SET
                title = $2,
                content = $3,
                pid = CASE
                    WHEN $4::text IS NULL THEN pid
                    WHEN $4 = '' THEN NULL
                    ELSE $4
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROBLEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&edit.title)
        .bind(&edit.content)
        .bind(&edit.pid)
        .fetch_optional(pool)
        .await?;

        problem.ok_or_else(|| AppError::NotFound(format!("Problem {} not found", id)))
    }

    pub async fn update_settings(
        pool: &PgPool,
        id: Uuid,
        settings: &ProblemSettings,
    ) -> AppResult<Problem> {
        let problem = sqlx::query_as::<_, Problem>(&format!(
            r#"
            UPDATE problems
            SET
                hidden = $2,
                category = $3,
                tag = $4,
                difficulty_setting = $5,
                difficulty_admin = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROBLEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(settings.hidden)
        .bind(&settings.category)
        .bind(&settings.tag)
        .bind(settings.difficulty_setting.as_str())
        .bind(settings.difficulty_admin)
        .fetch_optional(pool)
        .await?;

        problem.ok_or_else(|| AppError::NotFound(format!("Problem {} not found", id)))
    }

    pub async fn set_data(pool: &PgPool, id: Uuid, data: &[u8], digest: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"UPDATE problems SET data = $2, data_digest = $3, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(id)
        .bind(data)
        .bind(digest)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Problem {} not found", id)));
        }
        Ok(())
    }

    pub async fn get_data(pool: &PgPool, id: Uuid) -> AppResult<Option<Vec<u8>>> {
        let data: Option<Option<Vec<u8>>> =
            sqlx::query_scalar(r#"SELECT data FROM problems WHERE id = $1"#)
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(data.flatten())
    }

    /// Bump `n_submit`; fails with `NotFound` when the problem is gone
    pub async fn increment_submit(conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
        let result =
            sqlx::query(r#"UPDATE problems SET n_submit = n_submit + 1 WHERE id = $1"#)
                .bind(id)
                .execute(conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Problem {} not found", id)));
        }
        Ok(())
    }

    pub async fn add_accept(conn: &mut PgConnection, id: Uuid, delta: i64) -> AppResult<()> {
        sqlx::query(r#"UPDATE problems SET n_accept = n_accept + $2 WHERE id = $1"#)
            .bind(id)
            .bind(delta)
            .execute(conn)
            .await?;

        Ok(())
    }
}
