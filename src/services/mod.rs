//! Business logic services

pub mod auth_service;
pub mod judge_listener;
pub mod judge_queue;
pub mod pretest_connection;
pub mod problem_service;
pub mod rate_limit_service;
pub mod record_service;
pub mod submission_service;

pub use auth_service::AuthService;
pub use judge_listener::ReportListener;
pub use judge_queue::{JudgeQueue, JudgeTask, RedisJudgeQueue};
pub use pretest_connection::{ConnectionState, PretestConnection, PretestMessage};
pub use problem_service::{ProblemDraft, ProblemPage, ProblemService, ProblemStatistics};
pub use rate_limit_service::{MemoryRateLimiter, RateLimitInfo, RateLimiter, RedisRateLimiter};
pub use record_service::RecordService;
pub use submission_service::{SourceCode, SubmissionService};
