//! Problem response DTOs

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{DomainUser, Problem, ProblemSettings, Record},
    services::ProblemStatistics,
};

/// Problem detail
///
/// The statement is served as stored; `has_data` replaces the data digest.
#[derive(Debug, Serialize)]
pub struct ProblemResponse {
    pub id: Uuid,
    pub pid: Option<String>,
    pub display_id: String,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub html: bool,
    pub hidden: bool,
    pub category: Vec<String>,
    pub tag: Vec<String>,
    pub difficulty_setting: Option<String>,
    pub difficulty_admin: Option<i32>,
    pub n_submit: i64,
    pub n_accept: i64,
    pub has_data: bool,
}

impl From<Problem> for ProblemResponse {
    fn from(problem: Problem) -> Self {
        Self {
            display_id: problem.display_id(),
            has_data: problem.has_data(),
            id: problem.id,
            pid: problem.pid,
            owner_id: problem.owner_id,
            title: problem.title,
            content: problem.content,
            html: problem.html,
            hidden: problem.hidden,
            category: problem.category,
            tag: problem.tag,
            difficulty_setting: problem.difficulty_setting,
            difficulty_admin: problem.difficulty_admin,
            n_submit: problem.n_submit,
            n_accept: problem.n_accept,
        }
    }
}

/// Listing row, without the statement
#[derive(Debug, Serialize)]
pub struct ProblemSummary {
    pub id: Uuid,
    pub display_id: String,
    pub title: String,
    pub hidden: bool,
    pub category: Vec<String>,
    pub tag: Vec<String>,
    pub n_submit: i64,
    pub n_accept: i64,
}

impl From<Problem> for ProblemSummary {
    fn from(problem: Problem) -> Self {
        Self {
            display_id: problem.display_id(),
            id: problem.id,
            title: problem.title,
            hidden: problem.hidden,
            category: problem.category,
            tag: problem.tag,
            n_submit: problem.n_submit,
            n_accept: problem.n_accept,
        }
    }
}

/// Problem list response
#[derive(Debug, Serialize)]
pub struct ProblemsListResponse {
    pub problems: Vec<ProblemSummary>,
    pub page: u32,
    pub page_count: u32,
    pub total: i64,
}

/// Submit page: the problem and the caller's latest records
#[derive(Debug, Serialize)]
pub struct SubmitPageResponse {
    pub problem: ProblemResponse,
    pub records: Vec<Record>,
}

/// Created record, with the location of its detail view
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub rid: Uuid,
    pub redirect: String,
}

/// Created pretest record
#[derive(Debug, Serialize)]
pub struct PretestResponse {
    pub rid: Uuid,
}

/// Current settings of a problem
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    #[serde(flatten)]
    pub settings: ProblemSettings,
}

/// Rejudge outcome
#[derive(Debug, Serialize)]
pub struct RejudgeResponse {
    pub rejudged: usize,
}

/// Imported problem, with the location of its detail view
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub problem: ProblemResponse,
    pub redirect: String,
}

/// Copied problem, with the location of its settings in the target domain
#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub problem: ProblemResponse,
    pub redirect: String,
}

/// Verdict breakdown of a problem
#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub problem: ProblemSummary,
    pub owner: DomainUser,
    pub submitters: usize,
    pub solvers: usize,
    pub verdicts: BTreeMap<String, u64>,
}

impl From<ProblemStatistics> for StatisticsResponse {
    fn from(stats: ProblemStatistics) -> Self {
        Self {
            problem: stats.problem.into(),
            owner: stats.owner,
            submitters: stats.submitters,
            solvers: stats.solvers,
            verdicts: stats.verdicts,
        }
    }
}
