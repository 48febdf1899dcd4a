//! In-memory store
//!
//! One lock guards all tables, so every multi-row write is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        DomainUser, NewProblem, NewRecord, Problem, ProblemEdit, ProblemFilter, ProblemKey,
        ProblemSettings, Record, RecordReport,
    },
    utils::now_utc,
};

use super::store::ProblemStore;

#[derive(Default)]
struct Tables {
    problems: Vec<Problem>,
    data: HashMap<Uuid, Vec<u8>>,
    records: Vec<Record>,
    domain_users: HashMap<(String, Uuid), DomainUser>,
}

impl Tables {
    fn problem_mut(&mut self, id: Uuid) -> AppResult<&mut Problem> {
        self.problems
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Problem {} not found", id)))
    }

    fn record_mut(&mut self, rid: Uuid) -> AppResult<&mut Record> {
        self.records
            .iter_mut()
            .find(|r| r.id == rid)
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", rid)))
    }

    fn domain_user_mut(&mut self, domain_id: &str, user_id: Uuid) -> &mut DomainUser {
        self.domain_users
            .entry((domain_id.to_string(), user_id))
            .or_insert_with(|| DomainUser {
                domain_id: domain_id.to_string(),
                user_id,
                ..Default::default()
            })
    }

    fn alias_taken(&self, domain_id: &str, alias: &str, except: Option<Uuid>) -> bool {
        self.problems.iter().any(|p| {
            p.domain_id == domain_id
                && p.pid.as_deref() == Some(alias)
                && Some(p.id) != except
        })
    }

    /// Matching problems, newest first
    fn matching<'a>(
        &'a self,
        domain_id: &'a str,
        filter: &'a ProblemFilter,
    ) -> impl Iterator<Item = &'a Problem> + 'a {
        self.problems
            .iter()
            .rev()
            .filter(move |p| p.domain_id == domain_id && filter.matches(p))
    }

    fn bump_accept(&mut self, record: &Record, delta: i64) -> AppResult<()> {
        self.problem_mut(record.problem_id)?.n_accept += delta;
        self.domain_user_mut(&record.domain_id, record.user_id).n_accept += delta;
        Ok(())
    }
}

/// Store keeping every table in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProblemStore for MemoryStore {
    async fn get_problem(&self, domain_id: &str, key: &ProblemKey) -> AppResult<Option<Problem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .problems
            .iter()
            .find(|p| p.domain_id == domain_id && p.matches_key(key))
            .cloned())
    }

    async fn list_problems(
        &self,
        domain_id: &str,
        filter: &ProblemFilter,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Problem>, i64)> {
        let tables = self.tables.read().await;
        let total = tables.matching(domain_id, filter).count() as i64;
        let page = tables
            .matching(domain_id, filter)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn random_problem(
        &self,
        domain_id: &str,
        filter: &ProblemFilter,
    ) -> AppResult<Option<Problem>> {
        let tables = self.tables.read().await;
        let candidates: Vec<&Problem> = tables.matching(domain_id, filter).collect();
        if candidates.is_empty() {
            return Ok(None);
        }
        let index = rand::rng().random_range(0..candidates.len());
        Ok(Some(candidates[index].clone()))
    }

    async fn create_problem(&self, problem: NewProblem) -> AppResult<Problem> {
        let mut tables = self.tables.write().await;
        if let Some(alias) = problem.pid.as_deref() {
            if tables.alias_taken(&problem.domain_id, alias, None) {
                return Err(AppError::AlreadyExists(format!("Problem {} already exists", alias)));
            }
        }

        let now = now_utc();
        let created = Problem {
            id: Uuid::new_v4(),
            domain_id: problem.domain_id,
            pid: problem.pid,
            owner_id: problem.owner_id,
            title: problem.title,
            content: problem.content,
            html: problem.html,
            hidden: problem.hidden,
            category: problem.category,
            tag: problem.tag,
            difficulty_setting: None,
            difficulty_admin: None,
            n_submit: 0,
            n_accept: 0,
            data_digest: None,
            created_at: now,
            updated_at: now,
        };
        tables.problems.push(created.clone());
        Ok(created)
    }

    async fn edit_problem(&self, id: Uuid, edit: ProblemEdit) -> AppResult<Problem> {
        let mut tables = self.tables.write().await;
        let domain_id = tables.problem_mut(id)?.domain_id.clone();
        if let Some(alias) = edit.pid.as_deref().filter(|a| !a.is_empty()) {
            if tables.alias_taken(&domain_id, alias, Some(id)) {
                return Err(AppError::AlreadyExists(format!("Problem {} already exists", alias)));
            }
        }

        let problem = tables.problem_mut(id)?;
        problem.title = edit.title;
        problem.content = edit.content;
        if let Some(alias) = edit.pid {
            problem.pid = (!alias.is_empty()).then_some(alias);
        }
        problem.updated_at = now_utc();
        Ok(problem.clone())
    }

    async fn update_problem_settings(
        &self,
        id: Uuid,
        settings: &ProblemSettings,
    ) -> AppResult<Problem> {
        let mut tables = self.tables.write().await;
        let problem = tables.problem_mut(id)?;
        problem.hidden = settings.hidden;
        problem.category = settings.category.clone();
        problem.tag = settings.tag.clone();
        problem.difficulty_setting = Some(settings.difficulty_setting.as_str().to_string());
        problem.difficulty_admin = settings.difficulty_admin;
        problem.updated_at = now_utc();
        Ok(problem.clone())
    }

    async fn set_problem_data(&self, id: Uuid, data: Vec<u8>, digest: String) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.problem_mut(id)?.data_digest = Some(digest);
        tables.data.insert(id, data);
        Ok(())
    }

    async fn get_problem_data(&self, id: Uuid) -> AppResult<Option<Vec<u8>>> {
        Ok(self.tables.read().await.data.get(&id).cloned())
    }

    async fn insert_submission(&self, record: NewRecord) -> AppResult<Record> {
        let mut tables = self.tables.write().await;
        tables.problem_mut(record.problem_id)?.n_submit += 1;
        tables
            .domain_user_mut(&record.domain_id, record.user_id)
            .n_submit += 1;

        let record = record.into_record(Uuid::new_v4(), now_utc());
        tables.records.push(record.clone());
        Ok(record)
    }

    async fn insert_pretest(&self, record: NewRecord) -> AppResult<Record> {
        let mut tables = self.tables.write().await;
        tables.problem_mut(record.problem_id)?;

        let record = record.into_record(Uuid::new_v4(), now_utc());
        tables.records.push(record.clone());
        Ok(record)
    }

    async fn get_record(&self, domain_id: &str, rid: Uuid) -> AppResult<Option<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .iter()
            .find(|r| r.id == rid && r.domain_id == domain_id)
            .cloned())
    }

    async fn recent_records(
        &self,
        domain_id: &str,
        problem_id: Uuid,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .iter()
            .rev()
            .filter(|r| {
                r.domain_id == domain_id && r.problem_id == problem_id && r.user_id == user_id
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn graded_records(&self, domain_id: &str, problem_id: Uuid) -> AppResult<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .iter()
            .filter(|r| r.domain_id == domain_id && r.problem_id == problem_id && !r.is_pretest())
            .cloned()
            .collect())
    }

    async fn reset_record(&self, rid: Uuid) -> AppResult<Record> {
        let mut tables = self.tables.write().await;
        let record = tables.record_mut(rid)?.clone();
        if record.counts_as_accepted() {
            tables.bump_accept(&record, -1)?;
        }

        let stored = tables.record_mut(rid)?;
        stored.reset();
        Ok(stored.clone())
    }

    async fn apply_report(&self, report: &RecordReport) -> AppResult<Record> {
        let mut tables = self.tables.write().await;
        let stored = tables.record_mut(report.rid)?;
        let delta = stored.apply(report);
        let record = stored.clone();
        if delta != 0 {
            tables.bump_accept(&record, delta)?;
        }
        Ok(record)
    }

    async fn domain_user(&self, domain_id: &str, user_id: Uuid) -> AppResult<DomainUser> {
        let tables = self.tables.read().await;
        Ok(tables
            .domain_users
            .get(&(domain_id.to_string(), user_id))
            .cloned()
            .unwrap_or_else(|| DomainUser {
                domain_id: domain_id.to_string(),
                user_id,
                ..Default::default()
            }))
    }
}
