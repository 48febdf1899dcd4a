//! Application-wide constants
//!
//! This module contains all constant values used throughout the application.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// SERVER DEFAULTS
// =============================================================================

/// Default server host address
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_SERVER_PORT: u16 = 8080;

// =============================================================================
// DATABASE DEFAULTS
// =============================================================================

/// Default maximum database connections in the pool
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;

// =============================================================================
// AUTHENTICATION DEFAULTS
// =============================================================================

/// Default JWT token expiry in hours
pub const DEFAULT_JWT_EXPIRY_HOURS: i64 = 24;

// =============================================================================
// JUDGE DISPATCH
// =============================================================================

/// Redis list the external judge consumes
pub const DEFAULT_JUDGE_QUEUE: &str = "judge_queue";

/// Redis list judges push reports onto
pub const DEFAULT_JUDGE_RESULTS_QUEUE: &str = "judge_results";

// =============================================================================
// PRETEST DEFAULTS
// =============================================================================

/// Action key used for pretest rate limiting
pub const PRETEST_RATE_LIMIT_ACTION: &str = "add_record";

/// Pretest window length in seconds
pub const DEFAULT_PRETEST_WINDOW_SECS: u64 = 3600;

/// Pretests allowed per window
pub const DEFAULT_PRETEST_MAX_PER_WINDOW: u64 = 100;

/// Pretest time limit, in the judge's duration notation
pub const DEFAULT_PRETEST_TIME: &str = "1s";

/// Pretest memory limit, in the judge's size notation
pub const DEFAULT_PRETEST_MEMORY: &str = "256m";

// =============================================================================
// SUPPORTED LANGUAGES
// =============================================================================

/// Language identifiers
pub mod languages {
    pub const C: &str = "c";
    pub const CPP: &str = "cpp";
    pub const RUST: &str = "rust";
    pub const GO: &str = "go";
    pub const ZIG: &str = "zig";
    pub const PYTHON: &str = "python";

    /// All supported language identifiers
    pub const ALL: &[&str] = &[C, CPP, RUST, GO, ZIG, PYTHON];
}

// =============================================================================
// USER ROLES
// =============================================================================

/// User role identifiers
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const ORGANIZER: &str = "organizer";
    pub const PARTICIPANT: &str = "participant";
    pub const SPECTATOR: &str = "spectator";
}

// =============================================================================
// EVENT TOPICS
// =============================================================================

/// Bus topic names
pub mod topics {
    pub const RECORD_CHANGE: &str = "record/change";
    pub const PROBLEM_LIST: &str = "problem/list";
    pub const PROBLEM_GET: &str = "problem/get";
    pub const PROBLEM_SETTING: &str = "problem/setting";
}

// =============================================================================
// API VERSIONING
// =============================================================================

/// API base path
pub const API_BASE_PATH: &str = "/api/v1";

// =============================================================================
// RATE LIMITING
// =============================================================================

/// General API rate limiting
pub mod rate_limits {
    /// General API - max requests
    pub const GENERAL_MAX_REQUESTS: u64 = 600;
    /// General API - window in seconds
    pub const GENERAL_WINDOW_SECS: u64 = 60;
}

// =============================================================================
// PAGINATION
// =============================================================================

/// Problems per list page
pub const PROBLEM_PER_PAGE: u32 = 100;

/// Records shown on the submit page
pub const RECENT_RECORDS_LIMIT: i64 = 10;

// =============================================================================
// VALIDATION
// =============================================================================

/// Maximum problem title length
pub const MAX_PROBLEM_TITLE_LENGTH: u64 = 64;

/// Maximum problem content length
pub const MAX_PROBLEM_CONTENT_LENGTH: u64 = 65535;

/// Maximum problem alias length
pub const MAX_PROBLEM_ALIAS_LENGTH: usize = 64;

/// Maximum source code size in bytes (64 KB)
pub const MAX_SOURCE_CODE_SIZE: usize = 64 * 1024;

/// Maximum pretest stdin size in bytes (1 MB)
pub const MAX_PRETEST_INPUT_SIZE: usize = 1024 * 1024;

/// Maximum imported bundle size in bytes (128 MB)
pub const MAX_IMPORT_BUNDLE_SIZE: usize = 128 * 1024 * 1024;

/// Admin difficulty bounds
pub const MIN_ADMIN_DIFFICULTY: i32 = 1;
pub const MAX_ADMIN_DIFFICULTY: i32 = 9;

/// Name of the manifest entry inside problem bundles
pub const BUNDLE_MANIFEST: &str = "problem.json";

/// Maximum decompressed size of the bundle manifest in bytes (1 MB)
pub const MAX_BUNDLE_MANIFEST_SIZE: u64 = 1024 * 1024;
