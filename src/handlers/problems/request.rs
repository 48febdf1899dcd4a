//! Problem request DTOs

use serde::Deserialize;
use validator::Validate;

use crate::{
    constants::{MAX_PROBLEM_CONTENT_LENGTH, MAX_PROBLEM_TITLE_LENGTH},
    models::{DifficultySetting, ProblemEdit, ProblemSettings},
    services::{ProblemDraft, SourceCode},
    utils::parse_category,
};

/// Query parameters for the problem listing
#[derive(Debug, Deserialize)]
pub struct ListProblemsQuery {
    pub page: Option<u32>,
    /// Free-text search over alias, title and content
    pub q: Option<String>,
}

/// Query parameters for a random pick
#[derive(Debug, Deserialize)]
pub struct RandomProblemQuery {
    /// Category expression, e.g. `dp+graph`
    pub category: Option<String>,
}

impl RandomProblemQuery {
    pub fn categories(&self) -> Vec<String> {
        self.category.as_deref().map(parse_category).unwrap_or_default()
    }
}

/// Create problem request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProblemRequest {
    pub pid: Option<String>,

    #[validate(length(min = 1, max = MAX_PROBLEM_TITLE_LENGTH))]
    pub title: String,

    #[validate(length(min = 1, max = MAX_PROBLEM_CONTENT_LENGTH))]
    pub content: String,

    #[serde(default)]
    pub html: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub category: Vec<String>,

    #[serde(default)]
    pub tag: Vec<String>,
}

impl From<CreateProblemRequest> for ProblemDraft {
    fn from(req: CreateProblemRequest) -> Self {
        Self {
            pid: req.pid,
            title: req.title,
            content: req.content,
            html: req.html,
            hidden: req.hidden,
            category: req.category,
            tag: req.tag,
        }
    }
}

/// Statement edit request
#[derive(Debug, Deserialize, Validate)]
pub struct EditProblemRequest {
    #[validate(length(min = 1, max = MAX_PROBLEM_TITLE_LENGTH))]
    pub title: String,

    #[validate(length(min = 1, max = MAX_PROBLEM_CONTENT_LENGTH))]
    pub content: String,

    /// Omit to keep the alias, send `""` to clear it
    pub pid: Option<String>,
}

impl From<EditProblemRequest> for ProblemEdit {
    fn from(req: EditProblemRequest) -> Self {
        Self {
            title: req.title,
            content: req.content,
            pid: req.pid,
        }
    }
}

/// Submission request
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    #[validate(length(min = 1))]
    pub lang: String,

    pub code: String,
}

impl From<SubmitRequest> for SourceCode {
    fn from(req: SubmitRequest) -> Self {
        Self {
            language: req.lang,
            code: req.code,
        }
    }
}

/// Pretest request
#[derive(Debug, Deserialize, Validate)]
pub struct PretestRequest {
    #[validate(length(min = 1))]
    pub lang: String,

    pub code: String,

    /// Standard input for the run
    #[serde(default)]
    pub input: String,
}

/// Settings update request
///
/// `category` and `tag` accept the same `a+b,c` expressions as the
/// category listing.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub tag: String,

    pub difficulty_setting: DifficultySetting,

    pub difficulty_admin: Option<i32>,
}

impl From<UpdateSettingsRequest> for ProblemSettings {
    fn from(req: UpdateSettingsRequest) -> Self {
        Self {
            hidden: req.hidden,
            category: parse_category(&req.category),
            tag: parse_category(&req.tag),
            difficulty_setting: req.difficulty_setting,
            difficulty_admin: req.difficulty_admin,
        }
    }
}

/// Bundle import request
#[derive(Debug, Deserialize, Validate)]
pub struct ImportProblemRequest {
    /// Base64 encoded zip archive
    #[validate(length(min = 1))]
    pub bundle: String,

    #[serde(default)]
    pub hidden: bool,
}

/// Copy a problem into another domain
#[derive(Debug, Deserialize, Validate)]
pub struct CopyProblemRequest {
    #[validate(length(min = 1, max = 64))]
    pub target_domain: String,

    #[serde(default)]
    pub hidden: bool,
}

/// Replace the test data of a problem
#[derive(Debug, Deserialize, Validate)]
pub struct UploadDataRequest {
    /// Base64 encoded zip archive
    #[validate(length(min = 1))]
    pub bundle: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_request_splits_lists() {
        let req: UpdateSettingsRequest = serde_json::from_str(
            r#"{"hidden":true,"category":"dp+graph","tag":" easy , math ","difficulty_setting":"admin","difficulty_admin":4}"#,
        )
        .unwrap();
        let settings = ProblemSettings::from(req);
        assert!(settings.hidden);
        assert_eq!(settings.category, vec!["dp", "graph"]);
        assert_eq!(settings.tag, vec!["easy", "math"]);
        assert_eq!(settings.difficulty_setting, DifficultySetting::Admin);
        assert_eq!(settings.difficulty_admin, Some(4));
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateProblemRequest =
            serde_json::from_str(r#"{"title":"","content":"body"}"#).unwrap();
        assert!(req.validate().is_err());

        let req: CreateProblemRequest =
            serde_json::from_str(r#"{"title":"A + B","content":"Add."}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(!req.hidden);
    }

    #[test]
    fn test_copy_request_needs_target() {
        let req: CopyProblemRequest = serde_json::from_str(r#"{"target_domain":""}"#).unwrap();
        assert!(req.validate().is_err());

        let req: CopyProblemRequest =
            serde_json::from_str(r#"{"target_domain":"contest"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(!req.hidden);
    }
}
