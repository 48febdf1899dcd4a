//! Problem handler implementations

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use validator::Validate;

use crate::{
    authorization::Viewer,
    constants::{API_BASE_PATH, MAX_IMPORT_BUNDLE_SIZE},
    error::{AppError, AppResult},
    middleware::auth::OptionalAuth,
    services::{ProblemPage, ProblemService, SourceCode, SubmissionService},
    state::AppState,
    utils::{parse_category, parse_pid},
};

use super::{
    request::{
        CopyProblemRequest, CreateProblemRequest, EditProblemRequest, ImportProblemRequest,
        ListProblemsQuery, PretestRequest, RandomProblemQuery, SubmitRequest,
        UpdateSettingsRequest, UploadDataRequest,
    },
    response::{
        CopyResponse, ImportResponse, PretestResponse, ProblemResponse, ProblemsListResponse,
        RejudgeResponse, SettingsResponse, StatisticsResponse, SubmitPageResponse,
        SubmitResponse,
    },
};

fn problem_location(domain_id: &str, display_id: &str) -> String {
    format!("{}/d/{}/problems/{}", API_BASE_PATH, domain_id, display_id)
}

fn record_location(domain_id: &str, rid: &uuid::Uuid) -> String {
    format!("{}/d/{}/records/{}", API_BASE_PATH, domain_id, rid)
}

/// Decode a base64 zip bundle, refusing anything over the import limit
fn decode_bundle(encoded: &str) -> AppResult<Vec<u8>> {
    let encoded = encoded.trim();
    if encoded.len() / 4 * 3 > MAX_IMPORT_BUNDLE_SIZE + 3 {
        return Err(AppError::InvalidBundle(
            "Bundle exceeds the 128 MiB limit".to_string(),
        ));
    }
    BASE64
        .decode(encoded)
        .map_err(|e| AppError::InvalidBundle(format!("Bundle is not valid base64: {}", e)))
}

fn zip_download(pid: &str, suffix: &str, bundle: Vec<u8>) -> Response {
    let file_name: String = pid
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    let disposition = format!("attachment; filename=\"{}{}.zip\"", file_name, suffix);
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bundle,
    )
        .into_response()
}

impl From<ProblemPage> for ProblemsListResponse {
    fn from(page: ProblemPage) -> Self {
        Self {
            problems: page.problems.into_iter().map(Into::into).collect(),
            page: page.page,
            page_count: page.page_count,
            total: page.total,
        }
    }
}

/// List problems (paginated, optional search)
pub async fn list_problems(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path(domain_id): Path<String>,
    Query(query): Query<ListProblemsQuery>,
) -> AppResult<Json<ProblemsListResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let page = ProblemService::list(
        &state,
        &domain_id,
        &viewer,
        query.page.unwrap_or(1),
        query.q,
        Vec::new(),
    )
    .await?;

    Ok(Json(page.into()))
}

/// List problems carrying every category of a `a+b,c` expression
pub async fn list_by_category(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, category)): Path<(String, String)>,
    Query(query): Query<ListProblemsQuery>,
) -> AppResult<Json<ProblemsListResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let page = ProblemService::list(
        &state,
        &domain_id,
        &viewer,
        query.page.unwrap_or(1),
        query.q,
        parse_category(&category),
    )
    .await?;

    Ok(Json(page.into()))
}

/// Pick a random visible problem
pub async fn random_problem(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path(domain_id): Path<String>,
    Query(query): Query<RandomProblemQuery>,
) -> AppResult<Json<ProblemResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let problem = ProblemService::random(&state, &domain_id, &viewer, query.categories()).await?;
    Ok(Json(problem.into()))
}

/// Get a specific problem by id or alias
pub async fn get_problem(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
) -> AppResult<Json<ProblemResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let problem = ProblemService::load(&state, &domain_id, &parse_pid(&pid), &viewer).await?;
    Ok(Json(problem.into()))
}

/// Create a new problem
pub async fn create_problem(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path(domain_id): Path<String>,
    Json(payload): Json<CreateProblemRequest>,
) -> AppResult<(StatusCode, Json<ProblemResponse>)> {
    payload.validate()?;

    let viewer = Viewer::from(auth_user.as_ref());
    let problem = ProblemService::create(&state, &domain_id, &viewer, payload.into()).await?;

    Ok((StatusCode::CREATED, Json(problem.into())))
}

/// Edit the statement of a problem
pub async fn edit_problem(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
    Json(payload): Json<EditProblemRequest>,
) -> AppResult<Json<ProblemResponse>> {
    payload.validate()?;

    let viewer = Viewer::from(auth_user.as_ref());
    let problem =
        ProblemService::edit(&state, &domain_id, &parse_pid(&pid), &viewer, payload.into())
            .await?;
    Ok(Json(problem.into()))
}

/// Problem plus the caller's recent records
pub async fn submit_page(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
) -> AppResult<Json<SubmitPageResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let (problem, records) =
        ProblemService::submit_page(&state, &domain_id, &parse_pid(&pid), &viewer).await?;

    Ok(Json(SubmitPageResponse {
        problem: problem.into(),
        records,
    }))
}

/// Submit a solution for judging
pub async fn submit(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
    Json(payload): Json<SubmitRequest>,
) -> AppResult<Response> {
    payload.validate()?;

    let viewer = Viewer::from(auth_user.as_ref());
    let record = SubmissionService::submit(
        &state,
        &domain_id,
        &parse_pid(&pid),
        &viewer,
        payload.into(),
    )
    .await?;

    let redirect = record_location(&domain_id, &record.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, redirect.clone())],
        Json(SubmitResponse {
            rid: record.id,
            redirect,
        }),
    )
        .into_response())
}

/// Run a solution against custom input
pub async fn pretest(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
    Json(payload): Json<PretestRequest>,
) -> AppResult<(StatusCode, Json<PretestResponse>)> {
    payload.validate()?;

    let viewer = Viewer::from(auth_user.as_ref());
    let source = SourceCode {
        language: payload.lang,
        code: payload.code,
    };
    let record = SubmissionService::pretest(
        &state,
        &domain_id,
        &parse_pid(&pid),
        &viewer,
        source,
        payload.input,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(PretestResponse { rid: record.id })))
}

/// Current settings of a problem
pub async fn get_settings(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
) -> AppResult<Json<SettingsResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let settings = ProblemService::settings(&state, &domain_id, &parse_pid(&pid), &viewer).await?;
    Ok(Json(SettingsResponse { settings }))
}

/// Update visibility, categories, tags and difficulty
pub async fn update_settings(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> AppResult<Json<ProblemResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let problem = ProblemService::update_settings(
        &state,
        &domain_id,
        &parse_pid(&pid),
        &viewer,
        payload.into(),
    )
    .await?;
    Ok(Json(problem.into()))
}

/// Reset and re-dispatch every graded record of a problem
pub async fn rejudge(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
) -> AppResult<Json<RejudgeResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let rejudged = ProblemService::rejudge(&state, &domain_id, &parse_pid(&pid), &viewer).await?;
    Ok(Json(RejudgeResponse { rejudged }))
}

/// Download the problem as a zip bundle
pub async fn export_problem(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
) -> AppResult<Response> {
    let viewer = Viewer::from(auth_user.as_ref());
    let bundle = ProblemService::export(&state, &domain_id, &parse_pid(&pid), &viewer).await?;
    Ok(zip_download(&pid, "", bundle))
}

/// Create a problem from a base64 zip bundle
pub async fn import_problem(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path(domain_id): Path<String>,
    Json(payload): Json<ImportProblemRequest>,
) -> AppResult<(StatusCode, Json<ImportResponse>)> {
    payload.validate()?;
    let bundle = decode_bundle(&payload.bundle)?;

    let viewer = Viewer::from(auth_user.as_ref());
    let problem =
        ProblemService::import(&state, &domain_id, &viewer, bundle, payload.hidden).await?;

    let redirect = problem_location(&domain_id, &problem.display_id());
    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            problem: problem.into(),
            redirect,
        }),
    ))
}

/// Copy a problem into another domain
pub async fn copy_problem(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
    Json(payload): Json<CopyProblemRequest>,
) -> AppResult<(StatusCode, Json<CopyResponse>)> {
    payload.validate()?;

    let viewer = Viewer::from(auth_user.as_ref());
    let problem = ProblemService::copy(
        &state,
        &domain_id,
        &parse_pid(&pid),
        &viewer,
        &payload.target_domain,
        payload.hidden,
    )
    .await?;

    let redirect = format!(
        "{}/settings",
        problem_location(&payload.target_domain, &problem.display_id())
    );
    Ok((
        StatusCode::CREATED,
        Json(CopyResponse {
            problem: problem.into(),
            redirect,
        }),
    ))
}

/// Replace the test data of a problem
pub async fn upload_data(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
    Json(payload): Json<UploadDataRequest>,
) -> AppResult<Json<ProblemResponse>> {
    payload.validate()?;
    let bundle = decode_bundle(&payload.bundle)?;

    let viewer = Viewer::from(auth_user.as_ref());
    let problem =
        ProblemService::upload_data(&state, &domain_id, &parse_pid(&pid), &viewer, bundle).await?;
    Ok(Json(problem.into()))
}

/// Download the stored test data
pub async fn download_data(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
) -> AppResult<Response> {
    let viewer = Viewer::from(auth_user.as_ref());
    let bundle =
        ProblemService::download_data(&state, &domain_id, &parse_pid(&pid), &viewer).await?;
    Ok(zip_download(&pid, "-data", bundle))
}

/// Verdict breakdown over the graded records
pub async fn statistics(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path((domain_id, pid)): Path<(String, String)>,
) -> AppResult<Json<StatisticsResponse>> {
    let viewer = Viewer::from(auth_user.as_ref());
    let stats = ProblemService::statistics(&state, &domain_id, &parse_pid(&pid), &viewer).await?;
    Ok(Json(stats.into()))
}
