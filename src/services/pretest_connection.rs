//! Live pretest channel
//!
//! A connection follows one user's records on one problem. Matching
//! `record/change` events are redacted and queued for the socket task.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    authorization::{Perm, Viewer, require},
    error::{AppError, AppResult},
    events::{RecordChange, Subscription},
    models::{ProblemKey, Record, RedactedRecord},
    state::AppState,
};

/// Lifecycle of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Subscribed {
        domain_id: String,
        problem_id: Uuid,
        user_id: Uuid,
    },
    Disposed,
}

/// Frame pushed to the client
#[derive(Debug, Clone, Serialize)]
pub struct PretestMessage {
    pub rdoc: RedactedRecord,
}

/// Whether a record may be shown on the (domain, problem, user) channel
fn is_deliverable(record: &Record, domain_id: &str, problem_id: Uuid, user_id: Uuid) -> bool {
    record.user_id == user_id
        && record.problem_id == problem_id
        && record.domain_id == domain_id
        && record.contest_id.is_none()
}

pub struct PretestConnection {
    state: ConnectionState,
    subscription: Option<Subscription>,
    inbox: Option<mpsc::UnboundedReceiver<PretestMessage>>,
}

impl Default for PretestConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl PretestConnection {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Unauthenticated,
            subscription: None,
            inbox: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Bind the connection to a problem and start listening
    pub async fn subscribe(
        &mut self,
        app: &AppState,
        domain_id: &str,
        key: &ProblemKey,
        viewer: &Viewer,
    ) -> AppResult<()> {
        if self.state != ConnectionState::Unauthenticated {
            return Err(AppError::Validation(
                "Connection is already subscribed or closed".to_string(),
            ));
        }
        let user_id = viewer.require_user()?;

        let problem = app
            .store()
            .get_problem(domain_id, key)
            .await?
            .ok_or_else(|| AppError::problem_not_found(domain_id, key))?;
        if problem.hidden {
            require(viewer, Perm::ViewProblemHidden)?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let domain = domain_id.to_string();
        let problem_id = problem.id;
        let subscription = app.bus().on::<RecordChange, _>(move |record| {
            if is_deliverable(record, &domain, problem_id, user_id) {
                // a closed inbox means the socket task is gone; dispose follows
                let _ = tx.send(PretestMessage {
                    rdoc: record.redact(),
                });
            }
        });

        debug!(domain_id, problem_id = %problem_id, user_id = %user_id, "Pretest connection subscribed");
        self.subscription = Some(subscription);
        self.inbox = Some(rx);
        self.state = ConnectionState::Subscribed {
            domain_id: domain_id.to_string(),
            problem_id,
            user_id,
        };
        Ok(())
    }

    /// Wait for the next frame; `None` once disposed
    pub async fn next_message(&mut self) -> Option<PretestMessage> {
        match self.inbox.as_mut() {
            Some(inbox) => inbox.recv().await,
            None => None,
        }
    }

    /// A queued frame, without waiting
    pub fn try_next(&mut self) -> Option<PretestMessage> {
        self.inbox.as_mut().and_then(|inbox| inbox.try_recv().ok())
    }

    /// Unregister from the bus and drop pending frames
    pub fn dispose(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.dispose();
        }
        self.inbox = None;
        if self.state != ConnectionState::Disposed {
            debug!(state = ?self.state, "Pretest connection disposed");
            self.state = ConnectionState::Disposed;
        }
    }
}

impl Drop for PretestConnection {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::constants::roles;
    use crate::models::record::fixtures::judged_record;
    use crate::services::judge_queue::MockJudgeQueue;
    use crate::services::problem_service::{ProblemDraft, ProblemService};

    struct Fixture {
        app: AppState,
        problem_id: Uuid,
        user: Viewer,
    }

    async fn fixture(hidden: bool) -> Fixture {
        let app = AppState::in_memory(Arc::new(MockJudgeQueue::new()), Config::default());
        let user = Viewer {
            user_id: Some(Uuid::new_v4()),
            role: Some(roles::PARTICIPANT.to_string()),
        };
        let draft = ProblemDraft {
            title: "A + B".to_string(),
            content: "Add two integers.".to_string(),
            hidden,
            ..Default::default()
        };
        let problem = ProblemService::create(&app, "A", &user, draft).await.unwrap();
        Fixture {
            app,
            problem_id: problem.id,
            user,
        }
    }

    async fn subscribed(fx: &Fixture) -> PretestConnection {
        let mut conn = PretestConnection::new();
        conn.subscribe(&fx.app, "A", &ProblemKey::Id(fx.problem_id), &fx.user)
            .await
            .unwrap();
        conn
    }

    #[tokio::test]
    async fn test_only_matching_records_are_delivered() {
        let fx = fixture(false).await;
        let mut conn = subscribed(&fx).await;
        let uid = fx.user.user_id.unwrap();

        let other_user = judged_record("A", fx.problem_id, Uuid::new_v4());
        let other_problem = judged_record("A", Uuid::new_v4(), uid);
        let other_domain = judged_record("B", fx.problem_id, uid);
        let mut in_contest = judged_record("A", fx.problem_id, uid);
        in_contest.contest_id = Some(Uuid::new_v4());
        for record in [&other_user, &other_problem, &other_domain, &in_contest] {
            fx.app.bus().broadcast::<RecordChange>(record);
        }
        assert!(conn.try_next().is_none());

        let mine = judged_record("A", fx.problem_id, uid);
        fx.app.bus().broadcast::<RecordChange>(&mine);
        let message = conn.try_next().unwrap();
        assert_eq!(message.rdoc.id, mine.id);
        assert!(conn.try_next().is_none());
    }

    #[tokio::test]
    async fn test_frames_are_redacted() {
        let fx = fixture(false).await;
        let mut conn = subscribed(&fx).await;

        let record = judged_record("A", fx.problem_id, fx.user.user_id.unwrap());
        fx.app.bus().broadcast::<RecordChange>(&record);

        let frame = serde_json::to_value(conn.next_message().await.unwrap()).unwrap();
        let rdoc = &frame["rdoc"];
        assert!(rdoc.get("compiler_texts").is_none());
        assert!(rdoc.get("judge_texts").is_none());
        assert!(rdoc.get("source_code").is_none());
        let cases = rdoc["test_cases"].as_array().unwrap();
        assert_eq!(cases.len(), 2);
        for case in cases {
            assert_eq!(case.as_object().unwrap().len(), 1);
            assert!(case.get("status").is_some());
        }
    }

    #[tokio::test]
    async fn test_frames_keep_publish_order() {
        let fx = fixture(false).await;
        let mut conn = subscribed(&fx).await;
        let uid = fx.user.user_id.unwrap();

        let records: Vec<Record> = (0..5)
            .map(|_| judged_record("A", fx.problem_id, uid))
            .collect();
        for record in &records {
            fx.app.bus().broadcast::<RecordChange>(record);
        }
        for record in &records {
            assert_eq!(conn.next_message().await.unwrap().rdoc.id, record.id);
        }
    }

    #[tokio::test]
    async fn test_dispose_stops_delivery() {
        let fx = fixture(false).await;
        let mut conn = subscribed(&fx).await;
        assert_eq!(fx.app.bus().listener_count::<RecordChange>(), 1);

        conn.dispose();
        assert_eq!(conn.state(), &ConnectionState::Disposed);
        assert_eq!(fx.app.bus().listener_count::<RecordChange>(), 0);

        let record = judged_record("A", fx.problem_id, fx.user.user_id.unwrap());
        fx.app.bus().broadcast::<RecordChange>(&record);
        assert!(conn.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let fx = fixture(false).await;
        for _ in 0..3 {
            let conn = subscribed(&fx).await;
            drop(conn);
        }
        assert_eq!(fx.app.bus().listener_count::<RecordChange>(), 0);
    }

    #[tokio::test]
    async fn test_hidden_problem_requires_permission() {
        let fx = fixture(true).await;
        let key = ProblemKey::Id(fx.problem_id);

        // owning the problem is not enough on this channel
        let mut conn = PretestConnection::new();
        let result = conn.subscribe(&fx.app, "A", &key, &fx.user).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(conn.state(), &ConnectionState::Unauthenticated);
        assert_eq!(fx.app.bus().listener_count::<RecordChange>(), 0);

        let organizer = Viewer {
            user_id: Some(Uuid::new_v4()),
            role: Some(roles::ORGANIZER.to_string()),
        };
        conn.subscribe(&fx.app, "A", &key, &organizer).await.unwrap();
        assert!(matches!(conn.state(), ConnectionState::Subscribed { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_failures() {
        let fx = fixture(false).await;

        let mut conn = PretestConnection::new();
        let missing = ProblemKey::Alias("nope".to_string());
        let result = conn.subscribe(&fx.app, "A", &missing, &fx.user).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let key = ProblemKey::Id(fx.problem_id);
        let result = conn.subscribe(&fx.app, "A", &key, &Viewer::guest()).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));

        conn.subscribe(&fx.app, "A", &key, &fx.user).await.unwrap();
        let again = conn.subscribe(&fx.app, "A", &key, &fx.user).await;
        assert!(matches!(again, Err(AppError::Validation(_))));
    }
}
