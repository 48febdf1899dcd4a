//! In-process event bus
//!
//! Services publish on typed topics; live connections and extension hooks
//! subscribe.

pub mod bus;
pub mod topics;

pub use bus::{EventBus, Subscription};
pub use topics::{
    ProblemGetEvent, ProblemGetTopic, ProblemListEvent, ProblemListTopic, ProblemSettingEvent,
    ProblemSettingTopic, RecordChange, Topic,
};
