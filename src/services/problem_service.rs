//! Problem service
//!
//! Listing, detail, authoring, settings, rejudge and bundle import/export.
//! Every operation takes the caller as a [`Viewer`] and checks its own
//! permissions before touching the store.

use std::{
    collections::{BTreeMap, HashSet},
    io::{Cursor, Read, Write},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zip::{CompressionMethod, ZipArchive, ZipWriter, result::ZipError, write::SimpleFileOptions};

use crate::{
    authorization::{Perm, PermissionCheck, Viewer, require},
    constants::{
        BUNDLE_MANIFEST, MAX_ADMIN_DIFFICULTY, MAX_BUNDLE_MANIFEST_SIZE, MAX_IMPORT_BUNDLE_SIZE,
        MIN_ADMIN_DIFFICULTY, RECENT_RECORDS_LIMIT,
    },
    error::{AppError, AppResult},
    events::{
        ProblemGetEvent, ProblemGetTopic, ProblemListEvent, ProblemListTopic, ProblemSettingEvent,
        ProblemSettingTopic, RecordChange,
    },
    models::{
        DifficultySetting, DomainUser, NewProblem, Problem, ProblemEdit, ProblemFilter,
        ProblemKey, ProblemSettings, Record,
    },
    services::judge_queue::{JudgeTask, dispatch_or_log},
    state::AppState,
    utils::{
        ContentFormat, ProblemSource, build_content, hash_bytes, is_diff,
        validation::{validate_problem_alias, validate_problem_content, validate_problem_title},
    },
};

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct ProblemPage {
    pub problems: Vec<Problem>,
    pub page: u32,
    pub page_count: u32,
    pub total: i64,
}

/// Author-supplied fields of a new problem
#[derive(Debug, Clone, Default)]
pub struct ProblemDraft {
    pub pid: Option<String>,
    pub title: String,
    pub content: String,
    pub html: bool,
    pub hidden: bool,
    pub category: Vec<String>,
    pub tag: Vec<String>,
}

/// `problem.json` inside an import/export bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleManifest {
    #[serde(default)]
    pub pid: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Structured statement, used when `content` is absent
    #[serde(default)]
    pub source: Option<ProblemSource>,
    #[serde(default)]
    pub html: bool,
    #[serde(default)]
    pub tag: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
}

/// Judging statistics of one problem
#[derive(Debug, Clone, Serialize)]
pub struct ProblemStatistics {
    pub problem: Problem,
    /// Domain counters of the problem owner
    pub owner: DomainUser,
    /// Distinct users with a graded record
    pub submitters: usize,
    /// Distinct users with an accepted graded record
    pub solvers: usize,
    /// Graded records per current verdict
    pub verdicts: BTreeMap<String, u64>,
}

/// Problem service for business logic
pub struct ProblemService;

impl ProblemService {
    /// Resolve a problem the viewer may see, after `problem/get` hooks
    pub async fn load(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<Problem> {
        require(viewer, Perm::ViewProblem)?;
        let problem = Self::find_visible(state, domain_id, key, viewer).await?;

        let mut event = ProblemGetEvent {
            domain_id: domain_id.to_string(),
            viewer_id: viewer.user_id,
            problem,
        };
        state.bus().serial::<ProblemGetTopic>(&mut event).await?;
        Ok(event.problem)
    }

    /// Lookup plus the hidden check, no hooks
    ///
    /// Owners always see their own hidden problems.
    pub async fn find_visible(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<Problem> {
        let problem = state
            .store()
            .get_problem(domain_id, key)
            .await?
            .ok_or_else(|| AppError::problem_not_found(domain_id, key))?;

        if problem.hidden && !viewer.is(&problem.owner_id) {
            require(viewer, Perm::ViewProblemHidden)?;
        }
        Ok(problem)
    }

    /// Paged listing, narrowed by `problem/list` hooks
    pub async fn list(
        state: &AppState,
        domain_id: &str,
        viewer: &Viewer,
        page: u32,
        search: Option<String>,
        categories: Vec<String>,
    ) -> AppResult<ProblemPage> {
        let filter = Self::listing_filter(state, domain_id, viewer, search, categories).await?;

        let per_page = state.config().problems.per_page.max(1);
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(per_page);
        let (problems, total) = state
            .store()
            .list_problems(domain_id, &filter, offset, i64::from(per_page))
            .await?;

        let page_count = u32::try_from((total + i64::from(per_page) - 1) / i64::from(per_page))
            .unwrap_or(u32::MAX);
        Ok(ProblemPage {
            problems,
            page,
            page_count,
            total,
        })
    }

    /// A random visible problem matching `categories`
    pub async fn random(
        state: &AppState,
        domain_id: &str,
        viewer: &Viewer,
        categories: Vec<String>,
    ) -> AppResult<Problem> {
        let filter = Self::listing_filter(state, domain_id, viewer, None, categories).await?;
        state
            .store()
            .random_problem(domain_id, &filter)
            .await?
            .ok_or_else(|| AppError::NotFound("No problem matches the filter".to_string()))
    }

    async fn listing_filter(
        state: &AppState,
        domain_id: &str,
        viewer: &Viewer,
        search: Option<String>,
        categories: Vec<String>,
    ) -> AppResult<ProblemFilter> {
        require(viewer, Perm::ViewProblem)?;
        let mut event = ProblemListEvent {
            domain_id: domain_id.to_string(),
            viewer_id: viewer.user_id,
            filter: ProblemFilter {
                search: search.filter(|s| !s.trim().is_empty()),
                categories,
                include_hidden: viewer.has_perm(Perm::ViewProblemHidden),
                ..Default::default()
            },
        };
        state.bus().serial::<ProblemListTopic>(&mut event).await?;
        Ok(event.filter)
    }

    /// The problem plus the viewer's latest records on it
    pub async fn submit_page(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<(Problem, Vec<Record>)> {
        let problem = Self::load(state, domain_id, key, viewer).await?;
        let records = match viewer.user_id {
            Some(uid) => {
                state
                    .store()
                    .recent_records(domain_id, problem.id, uid, RECENT_RECORDS_LIMIT)
                    .await?
            }
            None => Vec::new(),
        };
        Ok((problem, records))
    }

    pub async fn create(
        state: &AppState,
        domain_id: &str,
        viewer: &Viewer,
        draft: ProblemDraft,
    ) -> AppResult<Problem> {
        let owner_id = viewer.require_user()?;
        require(viewer, Perm::CreateProblem)?;
        let draft = Self::validate_draft(draft)?;

        let problem = state
            .store()
            .create_problem(NewProblem {
                domain_id: domain_id.to_string(),
                pid: draft.pid,
                owner_id,
                title: draft.title,
                content: draft.content,
                html: draft.html,
                hidden: draft.hidden,
                category: draft.category,
                tag: draft.tag,
            })
            .await?;

        info!(domain_id, problem_id = %problem.id, owner_id = %owner_id, "Problem created");
        Ok(problem)
    }

    fn validate_draft(mut draft: ProblemDraft) -> AppResult<ProblemDraft> {
        draft.title = validate_problem_title(&draft.title)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validate_problem_content(&draft.content)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        draft.pid = draft.pid.filter(|pid| !pid.is_empty());
        if let Some(pid) = draft.pid.as_deref() {
            validate_problem_alias(pid).map_err(|e| AppError::Validation(e.to_string()))?;
        }
        Ok(draft)
    }

    /// Edit title, content and alias
    pub async fn edit(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
        mut edit: ProblemEdit,
    ) -> AppResult<Problem> {
        let problem = Self::load(state, domain_id, key, viewer).await?;
        Self::require_manage(viewer, &problem)?;

        edit.title =
            validate_problem_title(&edit.title).map_err(|e| AppError::Validation(e.to_string()))?;
        validate_problem_content(&edit.content)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if let Some(pid) = edit.pid.as_deref().filter(|pid| !pid.is_empty()) {
            validate_problem_alias(pid).map_err(|e| AppError::Validation(e.to_string()))?;
        }

        let problem = state.store().edit_problem(problem.id, edit).await?;
        info!(domain_id, problem_id = %problem.id, "Problem statement edited");
        Ok(problem)
    }

    /// Current settings, for managers only
    pub async fn settings(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<ProblemSettings> {
        let problem = Self::load(state, domain_id, key, viewer).await?;
        Self::require_manage(viewer, &problem)?;
        Ok(Self::current_settings(&problem))
    }

    fn current_settings(problem: &Problem) -> ProblemSettings {
        ProblemSettings {
            hidden: problem.hidden,
            category: problem.category.clone(),
            tag: problem.tag.clone(),
            difficulty_setting: problem
                .difficulty_setting
                .as_deref()
                .and_then(DifficultySetting::parse)
                .unwrap_or(DifficultySetting::Algorithm),
            difficulty_admin: problem.difficulty_admin,
        }
    }

    /// Write settings after `problem/setting` hooks had their say
    pub async fn update_settings(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
        settings: ProblemSettings,
    ) -> AppResult<Problem> {
        let problem = Self::load(state, domain_id, key, viewer).await?;
        Self::require_manage(viewer, &problem)?;

        if let Some(level) = settings.difficulty_admin {
            if !(MIN_ADMIN_DIFFICULTY..=MAX_ADMIN_DIFFICULTY).contains(&level) {
                return Err(AppError::Validation(format!(
                    "difficulty_admin must be between {} and {}",
                    MIN_ADMIN_DIFFICULTY, MAX_ADMIN_DIFFICULTY
                )));
            }
        }

        let mut event = ProblemSettingEvent {
            domain_id: domain_id.to_string(),
            problem_id: problem.id,
            settings,
        };
        state.bus().serial::<ProblemSettingTopic>(&mut event).await?;
        let settings = event.settings;

        let current = Self::current_settings(&problem);
        let unchanged = current.hidden == settings.hidden
            && !is_diff(&current.category, &settings.category)
            && !is_diff(&current.tag, &settings.tag)
            && current.difficulty_setting == settings.difficulty_setting
            && current.difficulty_admin == settings.difficulty_admin
            && problem.difficulty_setting.is_some();
        if unchanged {
            return Ok(problem);
        }

        state
            .store()
            .update_problem_settings(problem.id, &settings)
            .await
    }

    /// Reset every graded record of the problem and queue it again
    pub async fn rejudge(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<usize> {
        require(viewer, Perm::RejudgeProblem)?;
        let problem = Self::load(state, domain_id, key, viewer).await?;

        let records = state.store().graded_records(domain_id, problem.id).await?;
        for record in &records {
            let record = state.store().reset_record(record.id).await?;
            state.bus().broadcast::<RecordChange>(&record);
            dispatch_or_log(state.judge(), JudgeTask::for_record(&record, true)).await;
        }

        info!(domain_id, problem_id = %problem.id, count = records.len(), "Problem rejudged");
        Ok(records.len())
    }

    /// Zip bundle with `problem.json` and, when readable, the test data
    pub async fn export(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<Vec<u8>> {
        let problem = Self::load(state, domain_id, key, viewer).await?;
        let data = if Self::can_read_data(viewer, &problem) {
            state.store().get_problem_data(problem.id).await?
        } else {
            None
        };

        let manifest = BundleManifest {
            pid: problem.pid.clone(),
            title: problem.title.clone(),
            content: Some(problem.content.clone()),
            source: None,
            html: problem.html,
            tag: problem.tag.clone(),
            category: problem.category.clone(),
        };
        write_bundle(&manifest, data.as_deref()).map_err(|e| {
            warn!(problem_id = %problem.id, error = %e, "Failed to build problem bundle");
            AppError::Internal(e.into())
        })
    }

    /// Create a problem from a zip bundle and keep the bundle as its test data
    pub async fn import(
        state: &AppState,
        domain_id: &str,
        viewer: &Viewer,
        bundle: Vec<u8>,
        hidden: bool,
    ) -> AppResult<Problem> {
        viewer.require_user()?;
        require(viewer, Perm::CreateProblem)?;
        if bundle.len() > MAX_IMPORT_BUNDLE_SIZE {
            return Err(AppError::InvalidBundle(
                "Bundle exceeds the 128 MiB limit".to_string(),
            ));
        }

        let manifest = read_manifest(&bundle)?;
        let (content, html) = match (manifest.content, manifest.source) {
            (Some(content), _) => (content, manifest.html),
            (None, Some(source)) => {
                let format = if manifest.html {
                    ContentFormat::Html
                } else {
                    ContentFormat::Markdown
                };
                (build_content(&source, format), manifest.html)
            }
            (None, None) => {
                return Err(AppError::InvalidBundle(
                    "problem.json has neither content nor source".to_string(),
                ));
            }
        };

        let draft = ProblemDraft {
            pid: manifest.pid,
            title: manifest.title,
            content,
            html,
            hidden,
            category: manifest.category,
            tag: manifest.tag,
        };
        let problem = Self::create(state, domain_id, viewer, draft).await?;

        let digest = hash_bytes(&bundle);
        state
            .store()
            .set_problem_data(problem.id, bundle, digest.clone())
            .await?;

        info!(domain_id, problem_id = %problem.id, digest = %digest, "Problem imported");
        Ok(Problem {
            data_digest: Some(digest),
            ..problem
        })
    }

    /// Copy a problem, with its test data, into `target_domain`
    ///
    /// The caller owns the copy. The alias is kept unless the target domain
    /// already uses it.
    pub async fn copy(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
        target_domain: &str,
        hidden: bool,
    ) -> AppResult<Problem> {
        let owner_id = viewer.require_user()?;
        require(viewer, Perm::CreateProblem)?;
        let source = Self::load(state, domain_id, key, viewer).await?;

        let pid = match source.pid.as_deref() {
            Some(alias) => {
                let taken = state
                    .store()
                    .get_problem(target_domain, &ProblemKey::Alias(alias.to_string()))
                    .await?
                    .is_some();
                (!taken).then(|| alias.to_string())
            }
            None => None,
        };

        let copy = state
            .store()
            .create_problem(NewProblem {
                domain_id: target_domain.to_string(),
                pid,
                owner_id,
                title: source.title.clone(),
                content: source.content.clone(),
                html: source.html,
                hidden,
                category: source.category.clone(),
                tag: source.tag.clone(),
            })
            .await?;

        let data = match source.data_digest.clone() {
            Some(digest) => state
                .store()
                .get_problem_data(source.id)
                .await?
                .map(|data| (data, digest)),
            None => None,
        };
        let data_digest = match data {
            Some((data, digest)) => {
                state
                    .store()
                    .set_problem_data(copy.id, data, digest.clone())
                    .await?;
                Some(digest)
            }
            None => None,
        };

        info!(
            domain_id,
            target_domain,
            problem_id = %source.id,
            copy_id = %copy.id,
            "Problem copied"
        );
        Ok(Problem {
            data_digest,
            ..copy
        })
    }

    /// Replace the test data with a zip bundle
    pub async fn upload_data(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
        bundle: Vec<u8>,
    ) -> AppResult<Problem> {
        let problem = Self::load(state, domain_id, key, viewer).await?;
        Self::require_manage(viewer, &problem)?;
        if bundle.len() > MAX_IMPORT_BUNDLE_SIZE {
            return Err(AppError::InvalidBundle(
                "Bundle exceeds the 128 MiB limit".to_string(),
            ));
        }
        ZipArchive::new(Cursor::new(bundle.as_slice()))?;

        let digest = hash_bytes(&bundle);
        state
            .store()
            .set_problem_data(problem.id, bundle, digest.clone())
            .await?;

        info!(domain_id, problem_id = %problem.id, digest = %digest, "Problem data uploaded");
        Ok(Problem {
            data_digest: Some(digest),
            ..problem
        })
    }

    /// The stored test-data bundle
    pub async fn download_data(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<Vec<u8>> {
        let problem = Self::load(state, domain_id, key, viewer).await?;
        if !Self::can_read_data(viewer, &problem) {
            return Err(AppError::Forbidden(format!(
                "Missing permission {}",
                Perm::ReadProblemData.as_str()
            )));
        }

        state
            .store()
            .get_problem_data(problem.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Problem {} has no test data", problem.display_id()))
            })
    }

    /// Verdict breakdown over the graded records of a problem
    pub async fn statistics(
        state: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<ProblemStatistics> {
        let problem = Self::load(state, domain_id, key, viewer).await?;
        let records = state.store().graded_records(domain_id, problem.id).await?;
        let owner = state.store().domain_user(domain_id, problem.owner_id).await?;

        let mut verdicts = BTreeMap::new();
        let mut submitters = HashSet::new();
        let mut solvers = HashSet::new();
        for record in &records {
            *verdicts.entry(record.status.as_str().to_string()).or_insert(0) += 1;
            submitters.insert(record.user_id);
            if record.counts_as_accepted() {
                solvers.insert(record.user_id);
            }
        }

        Ok(ProblemStatistics {
            problem,
            owner,
            submitters: submitters.len(),
            solvers: solvers.len(),
            verdicts,
        })
    }

    /// Owners need the self variant, everyone else the general one
    fn require_manage(viewer: &Viewer, problem: &Problem) -> AppResult<()> {
        if viewer.is(&problem.owner_id) {
            require(viewer, Perm::EditProblemSelf)
        } else {
            require(viewer, Perm::EditProblem)
        }
    }

    fn can_read_data(viewer: &Viewer, problem: &Problem) -> bool {
        viewer.has_perm(Perm::ReadProblemData)
            || (viewer.is(&problem.owner_id) && viewer.has_perm(Perm::ReadProblemDataSelf))
    }
}

fn read_manifest(bundle: &[u8]) -> AppResult<BundleManifest> {
    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    let mut entry = archive.by_name(BUNDLE_MANIFEST).map_err(|e| match e {
        ZipError::FileNotFound => {
            AppError::InvalidBundle(format!("Bundle has no {}", BUNDLE_MANIFEST))
        }
        other => other.into(),
    })?;

    let mut raw = String::new();
    entry
        .by_ref()
        .take(MAX_BUNDLE_MANIFEST_SIZE + 1)
        .read_to_string(&mut raw)
        .map_err(|e| AppError::InvalidBundle(format!("Unreadable {}: {}", BUNDLE_MANIFEST, e)))?;
    if raw.len() as u64 > MAX_BUNDLE_MANIFEST_SIZE {
        return Err(AppError::InvalidBundle(format!(
            "{} exceeds the 1 MiB limit",
            BUNDLE_MANIFEST
        )));
    }
    serde_json::from_str(&raw)
        .map_err(|e| AppError::InvalidBundle(format!("Malformed {}: {}", BUNDLE_MANIFEST, e)))
}

fn write_bundle(manifest: &BundleManifest, data: Option<&[u8]>) -> anyhow::Result<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    writer.start_file(BUNDLE_MANIFEST, options)?;
    writer.write_all(&serde_json::to_vec_pretty(manifest)?)?;

    if let Some(data) = data {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            if entry.name() == BUNDLE_MANIFEST {
                continue;
            }
            writer.raw_copy_file(entry)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::config::Config;
    use crate::constants::roles;
    use crate::models::{NewRecord, PretestInput, RecordReport, Verdict};
    use crate::services::judge_queue::MockJudgeQueue;

    fn state_with(judge: MockJudgeQueue) -> AppState {
        AppState::in_memory(Arc::new(judge), Config::default())
    }

    fn state() -> AppState {
        state_with(MockJudgeQueue::new())
    }

    fn viewer(role: &str) -> Viewer {
        Viewer {
            user_id: Some(Uuid::new_v4()),
            role: Some(role.to_string()),
        }
    }

    fn draft(title: &str) -> ProblemDraft {
        ProblemDraft {
            title: title.to_string(),
            content: "Add two integers.".to_string(),
            ..Default::default()
        }
    }

    fn bundle(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn entry_names(bundle: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bundle)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_hidden_problem_needs_permission_unless_owner() {
        let state = state();
        let owner = viewer(roles::PARTICIPANT);
        let draft = ProblemDraft {
            hidden: true,
            ..draft("Secret")
        };
        let problem = ProblemService::create(&state, "system", &owner, draft)
            .await
            .unwrap();
        let key = ProblemKey::Id(problem.id);

        assert!(ProblemService::load(&state, "system", &key, &owner).await.is_ok());

        let stranger = viewer(roles::PARTICIPANT);
        let result = ProblemService::load(&state, "system", &key, &stranger).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let organizer = viewer(roles::ORGANIZER);
        assert!(ProblemService::load(&state, "system", &key, &organizer).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_problem_is_not_found() {
        let state = state();
        let key = ProblemKey::Alias("Z9".to_string());
        let result = ProblemService::load(&state, "system", &key, &Viewer::guest()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_hook_can_reject() {
        let state = state();
        let author = viewer(roles::PARTICIPANT);
        let problem = ProblemService::create(&state, "system", &author, draft("A + B"))
            .await
            .unwrap();

        let _hook = state.bus().hook::<ProblemGetTopic, _>(|event| {
            if event.viewer_id.is_none() {
                return Err(AppError::Forbidden("Sign in to read problems".to_string()));
            }
            Ok(())
        });

        let key = ProblemKey::Id(problem.id);
        let guest = ProblemService::load(&state, "system", &key, &Viewer::guest()).await;
        assert!(matches!(guest, Err(AppError::Forbidden(_))));
        assert!(ProblemService::load(&state, "system", &key, &author).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_hides_hidden_and_applies_hooks() {
        let state = state();
        let author = viewer(roles::ORGANIZER);
        let visible = ProblemService::create(&state, "system", &author, draft("Visible"))
            .await
            .unwrap();
        let excluded = ProblemService::create(&state, "system", &author, draft("Excluded"))
            .await
            .unwrap();
        let hidden = ProblemDraft {
            hidden: true,
            ..draft("Hidden")
        };
        ProblemService::create(&state, "system", &author, hidden)
            .await
            .unwrap();

        let excluded_id = excluded.id;
        let _hook = state.bus().hook::<ProblemListTopic, _>(move |event| {
            event.filter.exclude_ids.push(excluded_id);
            Ok(())
        });

        let page = ProblemService::list(&state, "system", &Viewer::guest(), 1, None, vec![])
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.page_count, 1);
        assert_eq!(page.problems[0].id, visible.id);

        let page = ProblemService::list(&state, "system", &author, 1, None, vec![])
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_random_with_no_match() {
        let state = state();
        let result =
            ProblemService::random(&state, "system", &Viewer::guest(), vec!["dp".to_string()])
                .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_validates_and_checks_permission() {
        let state = state();
        let spectator = viewer(roles::SPECTATOR);
        let result = ProblemService::create(&state, "system", &spectator, draft("A + B")).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let author = viewer(roles::PARTICIPANT);
        let result = ProblemService::create(&state, "system", &author, draft("   ")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let bad_alias = ProblemDraft {
            pid: Some("1abc".to_string()),
            ..draft("A + B")
        };
        let result = ProblemService::create(&state, "system", &author, bad_alias).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = ProblemService::create(&state, "system", &Viewer::guest(), draft("A")).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_only_managers_edit() {
        let state = state();
        let owner = viewer(roles::PARTICIPANT);
        let problem = ProblemService::create(&state, "system", &owner, draft("A + B"))
            .await
            .unwrap();
        let key = ProblemKey::Id(problem.id);
        let edit = ProblemEdit {
            title: "A plus B".to_string(),
            content: "Sum them.".to_string(),
            pid: Some("AB".to_string()),
        };

        let other = viewer(roles::PARTICIPANT);
        let result = ProblemService::edit(&state, "system", &key, &other, edit.clone()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let edited = ProblemService::edit(&state, "system", &key, &owner, edit)
            .await
            .unwrap();
        assert_eq!(edited.pid.as_deref(), Some("AB"));
        assert_eq!(edited.title, "A plus B");
    }

    #[tokio::test]
    async fn test_settings_hook_rewrites_update() {
        let state = state();
        let organizer = viewer(roles::ORGANIZER);
        let problem = ProblemService::create(&state, "system", &organizer, draft("A + B"))
            .await
            .unwrap();
        let key = ProblemKey::Id(problem.id);

        let _hook = state.bus().hook::<ProblemSettingTopic, _>(|event| {
            event.settings.tag.push("reviewed".to_string());
            Ok(())
        });

        let settings = ProblemSettings {
            hidden: true,
            category: vec!["math".to_string()],
            tag: vec![],
            difficulty_setting: DifficultySetting::Admin,
            difficulty_admin: Some(3),
        };
        let updated = ProblemService::update_settings(&state, "system", &key, &organizer, settings)
            .await
            .unwrap();
        assert!(updated.hidden);
        assert_eq!(updated.tag, vec!["reviewed".to_string()]);
        assert_eq!(updated.difficulty_admin, Some(3));

        let read = ProblemService::settings(&state, "system", &key, &organizer)
            .await
            .unwrap();
        assert_eq!(read.difficulty_setting, DifficultySetting::Admin);
    }

    #[tokio::test]
    async fn test_settings_reject_out_of_range_difficulty() {
        let state = state();
        let organizer = viewer(roles::ORGANIZER);
        let problem = ProblemService::create(&state, "system", &organizer, draft("A + B"))
            .await
            .unwrap();
        let key = ProblemKey::Id(problem.id);

        for (setting, level) in [
            (DifficultySetting::Admin, Some(10)),
            (DifficultySetting::Admin, Some(0)),
        ] {
            let settings = ProblemSettings {
                hidden: false,
                category: vec![],
                tag: vec![],
                difficulty_setting: setting,
                difficulty_admin: level,
            };
            let result =
                ProblemService::update_settings(&state, "system", &key, &organizer, settings)
                    .await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_settings_allow_no_admin_difficulty() {
        let state = state();
        let organizer = viewer(roles::ORGANIZER);
        let problem = ProblemService::create(&state, "system", &organizer, draft("A + B"))
            .await
            .unwrap();
        let key = ProblemKey::Id(problem.id);

        let settings = ProblemSettings {
            hidden: false,
            category: vec![],
            tag: vec![],
            difficulty_setting: DifficultySetting::Average,
            difficulty_admin: None,
        };
        let updated = ProblemService::update_settings(&state, "system", &key, &organizer, settings)
            .await
            .unwrap();
        assert_eq!(updated.difficulty_setting.as_deref(), Some("average"));
        assert_eq!(updated.difficulty_admin, None);
    }

    #[tokio::test]
    async fn test_rejudge_resets_and_requeues_graded_records() {
        let mut judge = MockJudgeQueue::new();
        judge
            .expect_dispatch()
            .withf(|task| task.rejudge && task.pretest.is_none())
            .times(1)
            .returning(|_| Ok(()));
        let state = state_with(judge);

        let organizer = viewer(roles::ORGANIZER);
        let problem = ProblemService::create(&state, "system", &organizer, draft("A + B"))
            .await
            .unwrap();
        let user = Uuid::new_v4();
        let record = state
            .store()
            .insert_submission(NewRecord {
                domain_id: "system".to_string(),
                problem_id: problem.id,
                user_id: user,
                contest_id: None,
                language: "cpp".to_string(),
                source_code: "int main(){}".to_string(),
                pretest: None,
            })
            .await
            .unwrap();
        state
            .store()
            .apply_report(&RecordReport {
                rid: record.id,
                status: Verdict::WrongAnswer,
                score: 0,
                time_ms: 1,
                memory_kb: 1,
                compiler_texts: vec![],
                judge_texts: vec!["diff".to_string()],
                test_cases: vec![],
            })
            .await
            .unwrap();

        let key = ProblemKey::Id(problem.id);
        let count = ProblemService::rejudge(&state, "system", &key, &organizer)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let stored = state.store().get_record("system", record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Verdict::Pending);
        assert!(stored.judge_texts.is_empty());

        let participant = viewer(roles::PARTICIPANT);
        let result = ProblemService::rejudge(&state, "system", &key, &participant).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_import_then_export_round() {
        let state = state();
        let owner = viewer(roles::PARTICIPANT);
        let manifest = serde_json::json!({
            "pid": "P1",
            "title": "Imported",
            "source": { "description": "Read two numbers.", "samples": [["1 2", "3"]] },
            "tag": ["easy"],
        });
        let manifest = manifest.to_string();
        let upload = bundle(&[
            (BUNDLE_MANIFEST, manifest.as_str()),
            ("testdata/1.in", "1 2\n"),
            ("testdata/1.out", "3\n"),
        ]);

        let problem = ProblemService::import(&state, "system", &owner, upload, false)
            .await
            .unwrap();
        assert_eq!(problem.pid.as_deref(), Some("P1"));
        assert!(problem.content.contains("Read two numbers."));
        assert!(problem.has_data());

        let key = ProblemKey::Alias("P1".to_string());
        let exported = ProblemService::export(&state, "system", &key, &owner)
            .await
            .unwrap();
        assert_eq!(
            entry_names(&exported),
            vec!["problem.json", "testdata/1.in", "testdata/1.out"]
        );

        let stranger = viewer(roles::PARTICIPANT);
        let exported = ProblemService::export(&state, "system", &key, &stranger)
            .await
            .unwrap();
        assert_eq!(entry_names(&exported), vec!["problem.json"]);
        let manifest = read_manifest(&exported).unwrap();
        assert_eq!(manifest.title, "Imported");
        assert_eq!(manifest.tag, vec!["easy".to_string()]);
    }

    #[tokio::test]
    async fn test_import_rejects_bad_bundles() {
        let state = state();
        let owner = viewer(roles::PARTICIPANT);

        let result =
            ProblemService::import(&state, "system", &owner, b"not a zip".to_vec(), false).await;
        assert!(matches!(result, Err(AppError::InvalidBundle(_))));

        let no_manifest = bundle(&[("testdata/1.in", "1")]);
        let result = ProblemService::import(&state, "system", &owner, no_manifest, false).await;
        assert!(matches!(result, Err(AppError::InvalidBundle(_))));

        let no_content = bundle(&[(BUNDLE_MANIFEST, r#"{"title": "Empty"}"#)]);
        let result = ProblemService::import(&state, "system", &owner, no_content, false).await;
        assert!(matches!(result, Err(AppError::InvalidBundle(_))));
    }

    #[tokio::test]
    async fn test_import_caps_manifest_size() {
        let state = state();
        let owner = viewer(roles::PARTICIPANT);
        let padding = " ".repeat(MAX_BUNDLE_MANIFEST_SIZE as usize);
        let manifest = format!(r#"{{"title": "Big", "content": "x"}}{}"#, padding);
        let oversized = bundle(&[(BUNDLE_MANIFEST, manifest.as_str())]);

        let result = ProblemService::import(&state, "system", &owner, oversized, false).await;
        match result {
            Err(AppError::InvalidBundle(message)) => assert!(message.contains("1 MiB")),
            other => panic!("expected an invalid bundle, got {:?}", other.map(|p| p.id)),
        }
        let page = ProblemService::list(&state, "system", &owner, 1, None, vec![])
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    fn graded(problem: &Problem, user_id: Uuid) -> NewRecord {
        NewRecord {
            domain_id: problem.domain_id.clone(),
            problem_id: problem.id,
            user_id,
            contest_id: None,
            language: "cpp".to_string(),
            source_code: "int main(){}".to_string(),
            pretest: None,
        }
    }

    fn verdict(rid: Uuid, status: Verdict) -> RecordReport {
        RecordReport {
            rid,
            status,
            score: 0,
            time_ms: 1,
            memory_kb: 1,
            compiler_texts: vec![],
            judge_texts: vec![],
            test_cases: vec![],
        }
    }

    #[tokio::test]
    async fn test_copy_carries_data_and_frees_alias() {
        let state = state();
        let organizer = viewer(roles::ORGANIZER);
        let draft = ProblemDraft {
            pid: Some("P1".to_string()),
            category: vec!["math".to_string()],
            ..draft("A + B")
        };
        let source = ProblemService::create(&state, "system", &organizer, draft)
            .await
            .unwrap();
        let data = bundle(&[("testdata/1.in", "1 2\n")]);
        let key = ProblemKey::Id(source.id);
        ProblemService::upload_data(&state, "system", &key, &organizer, data.clone())
            .await
            .unwrap();

        let copier = viewer(roles::PARTICIPANT);
        let copy = ProblemService::copy(&state, "system", &key, &copier, "contest", true)
            .await
            .unwrap();
        assert_eq!(copy.domain_id, "contest");
        assert_eq!(copy.pid.as_deref(), Some("P1"));
        assert_eq!(Some(copy.owner_id), copier.user_id);
        assert_eq!(copy.category, vec!["math".to_string()]);
        assert!(copy.hidden);
        assert!(copy.has_data());
        assert_eq!(
            state.store().get_problem_data(copy.id).await.unwrap(),
            Some(data)
        );

        // the alias is already used in the target now
        let second = ProblemService::copy(&state, "system", &key, &copier, "contest", false)
            .await
            .unwrap();
        assert_eq!(second.pid, None);
        assert_eq!(second.title, "A + B");

        let spectator = viewer(roles::SPECTATOR);
        let result =
            ProblemService::copy(&state, "system", &key, &spectator, "contest", false).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_copy_of_hidden_problem_needs_visibility() {
        let state = state();
        let owner = viewer(roles::PARTICIPANT);
        let draft = ProblemDraft {
            hidden: true,
            ..draft("Secret")
        };
        let problem = ProblemService::create(&state, "system", &owner, draft)
            .await
            .unwrap();
        let key = ProblemKey::Id(problem.id);

        let stranger = viewer(roles::PARTICIPANT);
        let result = ProblemService::copy(&state, "system", &key, &stranger, "mine", false).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let copy = ProblemService::copy(&state, "system", &key, &owner, "mine", false)
            .await
            .unwrap();
        assert!(!copy.has_data());
    }

    #[tokio::test]
    async fn test_data_upload_and_download_permissions() {
        let state = state();
        let owner = viewer(roles::PARTICIPANT);
        let problem = ProblemService::create(&state, "system", &owner, draft("A + B"))
            .await
            .unwrap();
        let key = ProblemKey::Id(problem.id);

        let result = ProblemService::download_data(&state, "system", &key, &owner).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result =
            ProblemService::upload_data(&state, "system", &key, &owner, b"plain".to_vec()).await;
        assert!(matches!(result, Err(AppError::InvalidBundle(_))));

        let data = bundle(&[("testdata/1.in", "1 2\n"), ("testdata/1.out", "3\n")]);
        let stranger = viewer(roles::PARTICIPANT);
        let result =
            ProblemService::upload_data(&state, "system", &key, &stranger, data.clone()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let updated = ProblemService::upload_data(&state, "system", &key, &owner, data.clone())
            .await
            .unwrap();
        assert_eq!(updated.data_digest, Some(hash_bytes(&data)));

        let downloaded = ProblemService::download_data(&state, "system", &key, &owner)
            .await
            .unwrap();
        assert_eq!(downloaded, data);

        let result = ProblemService::download_data(&state, "system", &key, &stranger).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let organizer = viewer(roles::ORGANIZER);
        assert!(
            ProblemService::download_data(&state, "system", &key, &organizer)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_statistics_count_graded_verdicts() {
        let state = state();
        let organizer = viewer(roles::ORGANIZER);
        let problem = ProblemService::create(&state, "system", &organizer, draft("A + B"))
            .await
            .unwrap();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        for (user, status) in [
            (alice, Verdict::WrongAnswer),
            (alice, Verdict::Accepted),
            (bob, Verdict::WrongAnswer),
        ] {
            let record = state
                .store()
                .insert_submission(graded(&problem, user))
                .await
                .unwrap();
            state
                .store()
                .apply_report(&verdict(record.id, status))
                .await
                .unwrap();
        }
        let pretest = NewRecord {
            pretest: Some(PretestInput {
                input: "1 2".to_string(),
                time_limit_ms: 1000,
                memory_limit_mb: 256,
            }),
            ..graded(&problem, bob)
        };
        state.store().insert_pretest(pretest).await.unwrap();

        let key = ProblemKey::Id(problem.id);
        let stats = ProblemService::statistics(&state, "system", &key, &Viewer::guest())
            .await
            .unwrap();
        assert_eq!(stats.problem.n_submit, 3);
        assert_eq!(stats.problem.n_accept, 1);
        assert_eq!(stats.submitters, 2);
        assert_eq!(stats.solvers, 1);
        assert_eq!(stats.verdicts.get("wrong_answer"), Some(&2));
        assert_eq!(stats.verdicts.get("accepted"), Some(&1));
        assert_eq!(stats.owner.user_id, problem.owner_id);
    }
}
