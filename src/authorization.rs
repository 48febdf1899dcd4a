//! Authorization predicates
//!
//! Services never inspect roles directly. Each operation receives a
//! [`PermissionCheck`] capability and asks it for the permissions it needs.

use uuid::Uuid;

use crate::{
    constants::roles,
    error::{AppError, AppResult},
    middleware::auth::AuthenticatedUser,
};

/// Permissions consulted by the problem and record operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Perm {
    ViewProblem,
    ViewProblemHidden,
    SubmitProblem,
    CreateProblem,
    EditProblem,
    EditProblemSelf,
    RejudgeProblem,
    ReadProblemData,
    ReadProblemDataSelf,
    ViewAnyRecord,
}

impl Perm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewProblem => "view_problem",
            Self::ViewProblemHidden => "view_problem_hidden",
            Self::SubmitProblem => "submit_problem",
            Self::CreateProblem => "create_problem",
            Self::EditProblem => "edit_problem",
            Self::EditProblemSelf => "edit_problem_self",
            Self::RejudgeProblem => "rejudge_problem",
            Self::ReadProblemData => "read_problem_data",
            Self::ReadProblemDataSelf => "read_problem_data_self",
            Self::ViewAnyRecord => "view_any_record",
        }
    }
}

/// Capability check handed to every service operation
pub trait PermissionCheck: Send + Sync {
    fn has_perm(&self, perm: Perm) -> bool;
}

impl<F> PermissionCheck for F
where
    F: Fn(Perm) -> bool + Send + Sync,
{
    fn has_perm(&self, perm: Perm) -> bool {
        self(perm)
    }
}

/// Fail with `Forbidden` unless `perm` is held
pub fn require(check: &dyn PermissionCheck, perm: Perm) -> AppResult<()> {
    if check.has_perm(perm) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Missing permission {}", perm.as_str())))
    }
}

const GUEST_PERMS: &[Perm] = &[Perm::ViewProblem];

const SPECTATOR_PERMS: &[Perm] = &[Perm::ViewProblem];

const PARTICIPANT_PERMS: &[Perm] = &[
    Perm::ViewProblem,
    Perm::SubmitProblem,
    Perm::CreateProblem,
    Perm::EditProblemSelf,
    Perm::ReadProblemDataSelf,
];

const ORGANIZER_PERMS: &[Perm] = &[
    Perm::ViewProblem,
    Perm::ViewProblemHidden,
    Perm::SubmitProblem,
    Perm::CreateProblem,
    Perm::EditProblem,
    Perm::EditProblemSelf,
    Perm::RejudgeProblem,
    Perm::ReadProblemData,
    Perm::ReadProblemDataSelf,
];

/// Static permission set of a role
pub fn role_permissions(role: &str) -> &'static [Perm] {
    match role {
        roles::ADMIN | roles::ORGANIZER => ORGANIZER_PERMS,
        roles::PARTICIPANT => PARTICIPANT_PERMS,
        roles::SPECTATOR => SPECTATOR_PERMS,
        _ => GUEST_PERMS,
    }
}

/// The caller of an operation
#[derive(Debug, Clone)]
pub struct Viewer {
    /// `None` for anonymous requests
    pub user_id: Option<Uuid>,
    pub role: Option<String>,
}

impl Viewer {
    pub fn guest() -> Self {
        Self {
            user_id: None,
            role: None,
        }
    }

    /// Authenticated user id, or `Unauthorized`
    pub fn require_user(&self) -> AppResult<Uuid> {
        self.user_id.ok_or(AppError::Unauthorized)
    }

    pub fn is(&self, user_id: &Uuid) -> bool {
        self.user_id.as_ref() == Some(user_id)
    }
}

impl From<&AuthenticatedUser> for Viewer {
    fn from(user: &AuthenticatedUser) -> Self {
        Self {
            user_id: Some(user.id),
            role: Some(user.role.clone()),
        }
    }
}

impl From<Option<&AuthenticatedUser>> for Viewer {
    fn from(user: Option<&AuthenticatedUser>) -> Self {
        user.map(Viewer::from).unwrap_or_else(Viewer::guest)
    }
}

impl PermissionCheck for Viewer {
    fn has_perm(&self, perm: Perm) -> bool {
        if self.role.as_deref() == Some(roles::ADMIN) {
            return true;
        }
        role_permissions(self.role.as_deref().unwrap_or_default()).contains(&perm)
    }
}
