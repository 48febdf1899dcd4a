//! Judgeline - problem, submission and pretest service for an online judge
//!
//! Problems live in domains. Users read statements, submit graded solutions
//! and run ungraded pretests; an external judge consumes the resulting
//! tasks from Redis and reports back. A pretest WebSocket pushes each
//! change of the caller's records as it happens.
//!
//! # Architecture
//!
//! - **Handlers**: HTTP and WebSocket endpoints (thin layer)
//! - **Services**: Business logic, permission checks first
//! - **Events**: In-process bus carrying record changes and problem hooks
//! - **Db**: The `ProblemStore` trait with Postgres and in-memory backends
//! - **Models**: Domain models

pub mod authorization;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
