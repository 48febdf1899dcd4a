//! Database repositories
//!
//! Repositories handle all direct database interactions.

pub mod domain_repo;
pub mod problem_repo;
pub mod record_repo;

pub use domain_repo::DomainUserRepository;
pub use problem_repo::ProblemRepository;
pub use record_repo::{RecordRepository, RecordRow};
