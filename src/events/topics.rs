//! Bus topics and their payloads

use uuid::Uuid;

use crate::constants::topics;
use crate::models::{Problem, ProblemFilter, ProblemSettings, Record};

/// A named channel with a fixed payload type
pub trait Topic: 'static {
    const NAME: &'static str;
    type Payload: Send + Sync + 'static;
}

/// A record was created, reset or updated by the judge
pub struct RecordChange;

impl Topic for RecordChange {
    const NAME: &'static str = topics::RECORD_CHANGE;
    type Payload = Record;
}

/// Problem listing is about to run; hooks may narrow the filter
pub struct ProblemListTopic;

#[derive(Debug, Clone)]
pub struct ProblemListEvent {
    pub domain_id: String,
    pub viewer_id: Option<Uuid>,
    pub filter: ProblemFilter,
}

impl Topic for ProblemListTopic {
    const NAME: &'static str = topics::PROBLEM_LIST;
    type Payload = ProblemListEvent;
}

/// A problem is about to be shown; hooks may reject
pub struct ProblemGetTopic;

#[derive(Debug, Clone)]
pub struct ProblemGetEvent {
    pub domain_id: String,
    pub viewer_id: Option<Uuid>,
    pub problem: Problem,
}

impl Topic for ProblemGetTopic {
    const NAME: &'static str = topics::PROBLEM_GET;
    type Payload = ProblemGetEvent;
}

/// Settings are about to be written; hooks may rewrite the update
pub struct ProblemSettingTopic;

#[derive(Debug, Clone)]
pub struct ProblemSettingEvent {
    pub domain_id: String,
    pub problem_id: Uuid,
    pub settings: ProblemSettings,
}

impl Topic for ProblemSettingTopic {
    const NAME: &'static str = topics::PROBLEM_SETTING;
    type Payload = ProblemSettingEvent;
}
