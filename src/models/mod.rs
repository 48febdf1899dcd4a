//! Domain models
//!
//! This module contains all domain models used throughout the application.

pub mod problem;
pub mod record;
pub mod user;

pub use problem::*;
pub use record::*;
pub use user::*;
