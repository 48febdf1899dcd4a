//! Record model
//!
//! A record is one judged attempt: a graded submission or an ungraded
//! pretest. The external judge fills in status, texts and test cases.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record as stored and published on `record/change`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub domain_id: String,
    pub problem_id: Uuid,
    pub user_id: Uuid,
    pub contest_id: Option<Uuid>,
    pub language: String,
    pub source_code: String,
    pub status: Verdict,
    pub score: i32,
    pub time_ms: i64,
    pub memory_kb: i64,
    pub compiler_texts: Vec<String>,
    pub judge_texts: Vec<String>,
    pub test_cases: Vec<TestCaseResult>,
    pub pretest: Option<PretestInput>,
    pub submitted_at: DateTime<Utc>,
    pub judged_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn is_pretest(&self) -> bool {
        self.pretest.is_some()
    }

    /// Copy safe to push to a live client: texts dropped, test cases reduced to status
    pub fn redact(&self) -> RedactedRecord {
        RedactedRecord {
            id: self.id,
            domain_id: self.domain_id.clone(),
            problem_id: self.problem_id,
            user_id: self.user_id,
            language: self.language.clone(),
            status: self.status,
            score: self.score,
            time_ms: self.time_ms,
            memory_kb: self.memory_kb,
            test_cases: self
                .test_cases
                .iter()
                .map(|case| CaseStatus {
                    status: case.status,
                })
                .collect(),
            pretest: self.is_pretest(),
            submitted_at: self.submitted_at,
            judged_at: self.judged_at,
        }
    }

    /// Clear judge output and return to `pending` for a rejudge
    pub fn reset(&mut self) {
        self.status = Verdict::Pending;
        self.score = 0;
        self.time_ms = 0;
        self.memory_kb = 0;
        self.compiler_texts.clear();
        self.judge_texts.clear();
        self.test_cases.clear();
        self.judged_at = None;
    }

    /// Overwrite the judge output with `report`
    ///
    /// Returns the change to the acceptance counters: `1` when a graded
    /// record enters `accepted`, `-1` when it leaves it, `0` otherwise.
    pub fn apply(&mut self, report: &RecordReport) -> i64 {
        let was_accepted = self.counts_as_accepted();
        self.status = report.status;
        self.score = report.score;
        self.time_ms = report.time_ms;
        self.memory_kb = report.memory_kb;
        self.compiler_texts = report.compiler_texts.clone();
        self.judge_texts = report.judge_texts.clone();
        self.test_cases = report.test_cases.clone();
        if report.status.is_final() {
            self.judged_at = Some(Utc::now());
        }
        match (was_accepted, self.counts_as_accepted()) {
            (false, true) => 1,
            (true, false) => -1,
            _ => 0,
        }
    }

    /// Whether resetting this record takes back an acceptance
    pub fn counts_as_accepted(&self) -> bool {
        self.status.is_accepted() && !self.is_pretest()
    }
}

/// Progress or final result pushed back by the judge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReport {
    pub rid: Uuid,
    pub status: Verdict,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub time_ms: i64,
    #[serde(default)]
    pub memory_kb: i64,
    #[serde(default)]
    pub compiler_texts: Vec<String>,
    #[serde(default)]
    pub judge_texts: Vec<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCaseResult>,
}

/// Result of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub status: Verdict,
    pub score: i32,
    pub time_ms: i64,
    pub memory_kb: i64,
    pub message: String,
}

/// Ephemeral execution parameters of a pretest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PretestInput {
    pub input: String,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
}

/// Fields for a new record; status always starts as `pending`
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub domain_id: String,
    pub problem_id: Uuid,
    pub user_id: Uuid,
    pub contest_id: Option<Uuid>,
    pub language: String,
    pub source_code: String,
    pub pretest: Option<PretestInput>,
}

impl NewRecord {
    pub fn into_record(self, id: Uuid, submitted_at: DateTime<Utc>) -> Record {
        Record {
            id,
            domain_id: self.domain_id,
            problem_id: self.problem_id,
            user_id: self.user_id,
            contest_id: self.contest_id,
            language: self.language,
            source_code: self.source_code,
            status: Verdict::Pending,
            score: 0,
            time_ms: 0,
            memory_kb: 0,
            compiler_texts: Vec::new(),
            judge_texts: Vec::new(),
            test_cases: Vec::new(),
            pretest: self.pretest,
            submitted_at,
            judged_at: None,
        }
    }
}

/// Record as delivered over a pretest connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactedRecord {
    pub id: Uuid,
    pub domain_id: String,
    pub problem_id: Uuid,
    pub user_id: Uuid,
    pub language: String,
    pub status: Verdict,
    pub score: i32,
    pub time_ms: i64,
    pub memory_kb: i64,
    pub test_cases: Vec<CaseStatus>,
    pub pretest: bool,
    pub submitted_at: DateTime<Utc>,
    pub judged_at: Option<DateTime<Utc>>,
}

/// A test case reduced to its status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaseStatus {
    pub status: Verdict,
}

/// Record verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pending,
    Compiling,
    Running,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompilationError,
    InternalError,
}

impl Verdict {
    /// Get verdict as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Compiling => "compiling",
            Self::Running => "running",
            Self::Accepted => "accepted",
            Self::WrongAnswer => "wrong_answer",
            Self::TimeLimitExceeded => "time_limit_exceeded",
            Self::MemoryLimitExceeded => "memory_limit_exceeded",
            Self::RuntimeError => "runtime_error",
            Self::CompilationError => "compilation_error",
            Self::InternalError => "internal_error",
        }
    }

    /// Check if this is a final verdict (judging complete)
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending | Self::Compiling | Self::Running)
    }

    /// Check if this verdict means the solution was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "compiling" => Ok(Self::Compiling),
            "running" => Ok(Self::Running),
            "accepted" => Ok(Self::Accepted),
            "wrong_answer" => Ok(Self::WrongAnswer),
            "time_limit_exceeded" => Ok(Self::TimeLimitExceeded),
            "memory_limit_exceeded" => Ok(Self::MemoryLimitExceeded),
            "runtime_error" => Ok(Self::RuntimeError),
            "compilation_error" => Ok(Self::CompilationError),
            "internal_error" => Ok(Self::InternalError),
            other => Err(format!("unknown verdict: {}", other)),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A judged record with texts and detailed test cases
    pub fn judged_record(domain_id: &str, problem_id: Uuid, user_id: Uuid) -> Record {
        let mut record = NewRecord {
            domain_id: domain_id.to_string(),
            problem_id,
            user_id,
            contest_id: None,
            language: "cpp".to_string(),
            source_code: "int main(){}".to_string(),
            pretest: None,
        }
        .into_record(Uuid::new_v4(), Utc::now());
        record.status = Verdict::WrongAnswer;
        record.compiler_texts = vec!["warning: unused variable".to_string()];
        record.judge_texts = vec!["expected 3, found 4".to_string()];
        record.test_cases = vec![
            TestCaseResult {
                status: Verdict::Accepted,
                score: 50,
                time_ms: 3,
                memory_kb: 1024,
                message: "ok".to_string(),
            },
            TestCaseResult {
                status: Verdict::WrongAnswer,
                score: 0,
                time_ms: 4,
                memory_kb: 1024,
                message: "line 1 differs".to_string(),
            },
        ];
        record
    }
}
