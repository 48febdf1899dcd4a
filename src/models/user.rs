//! Per-domain user statistics

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Counters of one user inside one domain
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DomainUser {
    pub domain_id: String,
    pub user_id: Uuid,
    pub n_submit: i64,
    pub n_accept: i64,
}
