//! Per-domain user counters

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{error::AppResult, models::DomainUser};

/// Repository for domain-user counters
pub struct DomainUserRepository;

impl DomainUserRepository {
    pub async fn find(
        pool: &PgPool,
        domain_id: &str,
        user_id: Uuid,
    ) -> AppResult<Option<DomainUser>> {
        let user = sqlx::query_as::<_, DomainUser>(
            r#"SELECT * FROM domain_users WHERE domain_id = $1 AND user_id = $2"#,
        )
        .bind(domain_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Bump `n_submit`, creating the row on first submission
    pub async fn increment_submit(
        conn: &mut PgConnection,
        domain_id: &str,
        user_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO domain_users (domain_id, user_id, n_submit)
            VALUES ($1, $2, 1)
            ON CONFLICT (domain_id, user_id)
            DO UPDATE SET n_submit = domain_users.n_submit + 1
            "#,
        )
        .bind(domain_id)
        .bind(user_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn add_accept(
        conn: &mut PgConnection,
        domain_id: &str,
        user_id: Uuid,
        delta: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO domain_users (domain_id, user_id, n_accept)
            VALUES ($1, $2, GREATEST($3, 0))
            ON CONFLICT (domain_id, user_id)
            DO UPDATE SET n_accept = domain_users.n_accept + $3
            "#,
        )
        .bind(domain_id)
        .bind(user_id)
        .bind(delta)
        .execute(conn)
        .await?;

        Ok(())
    }
}
