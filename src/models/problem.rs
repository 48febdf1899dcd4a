//! Problem model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Problem database model
///
/// The test-data bundle itself lives in a separate column and is only loaded
/// on export; `data_digest` tells whether one is attached.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Problem {
    pub id: Uuid,
    pub domain_id: String,
    /// Optional human readable alias, e.g. `A1000`
    pub pid: Option<String>,
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
    pub data_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    /// Alias if set, otherwise the UUID
    pub fn display_id(&self) -> String {
        self.pid.clone().unwrap_or_else(|| self.id.to_string())
    }

    pub fn has_data(&self) -> bool {
        self.data_digest.is_some()
    }

    /// Whether the problem is addressed by `key`
    pub fn matches_key(&self, key: &ProblemKey) -> bool {
        match key {
            ProblemKey::Id(id) => self.id == *id,
            ProblemKey::Alias(alias) => self.pid.as_deref() == Some(alias.as_str()),
        }
    }
}

/// How a request addresses a problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemKey {
    Id(Uuid),
    Alias(String),
}

impl fmt::Display for ProblemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Alias(alias) => write!(f, "{}", alias),
        }
    }
}

/// Which difficulty is displayed for a problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultySetting {
    /// Computed from submission statistics
    Algorithm,
    /// Fixed by an administrator
    Admin,
    /// Mean of the computed and the administrator value
    Average,
}

impl DifficultySetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Algorithm => "algorithm",
            Self::Admin => "admin",
            Self::Average => "average",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "algorithm" => Some(Self::Algorithm),
            "admin" => Some(Self::Admin),
            "average" => Some(Self::Average),
            _ => None,
        }
    }
}

impl fmt::Display for DifficultySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing filter, narrowed by `problem/list` hooks before the query runs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProblemFilter {
    /// Case-insensitive text search over alias, title and content
    pub search: Option<String>,
    /// Every entry must appear in the problem's categories or tags
    pub categories: Vec<String>,
    pub include_hidden: bool,
    pub owner_id: Option<Uuid>,
    pub exclude_ids: Vec<Uuid>,
}

impl ProblemFilter {
    pub fn matches(&self, problem: &Problem) -> bool {
        if !self.include_hidden && problem.hidden {
            return false;
        }
        if let Some(owner) = self.owner_id {
            if problem.owner_id != owner {
                return false;
            }
        }
        if self.exclude_ids.contains(&problem.id) {
            return false;
        }
        let categorized = self
            .categories
            .iter()
            .all(|name| problem.category.contains(name) || problem.tag.contains(name));
        if !categorized {
            return false;
        }
        match self.search.as_deref().map(str::to_lowercase) {
            Some(needle) if !needle.is_empty() => {
                problem.title.to_lowercase().contains(&needle)
                    || problem.content.to_lowercase().contains(&needle)
                    || problem
                        .pid
                        .as_deref()
                        .is_some_and(|pid| pid.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

/// Fields for a new problem
#[derive(Debug, Clone)]
pub struct NewProblem {
    pub domain_id: String,
    pub pid: Option<String>,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub html: bool,
    pub hidden: bool,
    pub category: Vec<String>,
    pub tag: Vec<String>,
}

/// Statement edit
#[derive(Debug, Clone)]
pub struct ProblemEdit {
    pub title: String,
    pub content: String,
    /// `None` keeps the current alias, `Some("")` clears it
    pub pid: Option<String>,
}

/// Settings update, rewritable by `problem/setting` hooks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSettings {
    pub hidden: bool,
    pub category: Vec<String>,
    pub tag: Vec<String>,
    pub difficulty_setting: DifficultySetting,
    pub difficulty_admin: Option<i32>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn problem(domain_id: &str, owner_id: Uuid) -> Problem {
        let now = Utc::now();
        Problem {
            id: Uuid::new_v4(),
            domain_id: domain_id.to_string(),
            pid: None,
            owner_id,
            title: "A + B".to_string(),
            content: "Add two integers.".to_string(),
            html: false,
            hidden: false,
            category: vec![],
            tag: vec![],
            difficulty_setting: None,
            difficulty_admin: None,
            n_submit: 0,
            n_accept: 0,
            data_digest: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_hides_hidden_problems() {
        let mut problem = fixtures::problem("system", Uuid::new_v4());
        problem.hidden = true;

        assert!(!ProblemFilter::default().matches(&problem));
        let filter = ProblemFilter {
            include_hidden: true,
            ..Default::default()
        };
        assert!(filter.matches(&problem));
    }

    #[test]
    fn test_filter_categories_match_category_or_tag() {
        let mut problem = fixtures::problem("system", Uuid::new_v4());
        problem.category = vec!["dp".to_string()];
        problem.tag = vec!["classic".to_string()];

        let filter = ProblemFilter {
            categories: vec!["dp".to_string(), "classic".to_string()],
            ..Default::default()
        };
        assert!(filter.matches(&problem));

        let filter = ProblemFilter {
            categories: vec!["dp".to_string(), "graph".to_string()],
            ..Default::default()
        };
        assert!(!filter.matches(&problem));
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let mut problem = fixtures::problem("system", Uuid::new_v4());
        problem.pid = Some("P1000".to_string());

        let by_title = ProblemFilter {
            search: Some("a + b".to_string()),
            ..Default::default()
        };
        let by_alias = ProblemFilter {
            search: Some("p1000".to_string()),
            ..Default::default()
        };
        let miss = ProblemFilter {
            search: Some("knapsack".to_string()),
            ..Default::default()
        };
        assert!(by_title.matches(&problem));
        assert!(by_alias.matches(&problem));
        assert!(!miss.matches(&problem));
    }

    #[test]
    fn test_matches_key() {
        let mut problem = fixtures::problem("system", Uuid::new_v4());
        problem.pid = Some("A1".to_string());

        assert!(problem.matches_key(&ProblemKey::Id(problem.id)));
        assert!(problem.matches_key(&ProblemKey::Alias("A1".to_string())));
        assert!(!problem.matches_key(&ProblemKey::Alias("A2".to_string())));
        assert_eq!(problem.display_id(), "A1");
    }
}
