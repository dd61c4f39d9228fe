use crate::core::submission::{ScreenshotRef, Submission};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use teloxide::types::UserId;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    #[default]
    AwaitMembership,
    AwaitName,
    AwaitDeal,
    AwaitScreenshot,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub state: State,
    pub name: Option<String>,
    pub deal: Option<String>,
    pub screenshot: Option<ScreenshotRef>,
    pub touched_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            state: State::AwaitMembership,
            name: None,
            deal: None,
            screenshot: None,
            touched_at: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.touched_at = Utc::now();
    }

    pub fn is_idle(&self, idle_for: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(idle_for) {
            Ok(limit) => now - self.touched_at > limit,
            Err(_) => false,
        }
    }

    pub fn into_submission(self, user_id: UserId, username: Option<String>) -> Option<Submission> {
        if self.user_id != user_id || self.state != State::AwaitScreenshot {
            return None;
        }
        Some(Submission {
            user_id,
            username,
            name: self.name?,
            deal: self.deal?,
            screenshot: self.screenshot?,
            submitted_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, user: UserId) -> Option<Session>;
    async fn save(&self, session: Session);
    async fn remove(&self, user: UserId) -> Option<Session>;
    async fn idle_users(&self, idle_for: Duration) -> Vec<UserId>;
    async fn remove_if_idle(&self, user: UserId, idle_for: Duration) -> Option<Session>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, user: UserId) -> Option<Session> {
        self.sessions.read().await.get(&user).cloned()
    }

    async fn save(&self, session: Session) {
        self.sessions.write().await.insert(session.user_id, session);
    }

    async fn remove(&self, user: UserId) -> Option<Session> {
        self.sessions.write().await.remove(&user)
    }

    async fn idle_users(&self, idle_for: Duration) -> Vec<UserId> {
        let now = Utc::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_idle(idle_for, now))
            .map(|s| s.user_id)
            .collect()
    }

    async fn remove_if_idle(&self, user: UserId, idle_for: Duration) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.get(&user)?.is_idle(idle_for, Utc::now()) {
            sessions.remove(&user)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(user: UserId) -> Session {
        Session {
            state: State::AwaitScreenshot,
            name: Some("Rahul".into()),
            deal: Some("50% off on X".into()),
            screenshot: Some(ScreenshotRef {
                file_id: "f".into(),
                file_unique_id: "u".into(),
            }),
            ..Session::new(user)
        }
    }

    #[test]
    fn submission_requires_every_field() {
        let mut session = filled(UserId(1));
        session.deal = None;
        assert!(session.into_submission(UserId(1), None).is_none());

        let submission = filled(UserId(1))
            .into_submission(UserId(1), Some("rahul".into()))
            .unwrap();
        assert_eq!(submission.name, "Rahul");
        assert_eq!(submission.deal, "50% off on X");
        assert_eq!(submission.username.as_deref(), Some("rahul"));
    }

    #[test]
    fn submission_rejects_foreign_user() {
        assert!(filled(UserId(1)).into_submission(UserId(2), None).is_none());
    }

    #[tokio::test]
    async fn only_stale_sessions_are_idle() {
        let store = InMemorySessionStore::new();
        let mut stale = Session::new(UserId(1));
        stale.touched_at = Utc::now() - chrono::Duration::minutes(30);
        store.save(stale).await;
        store.save(Session::new(UserId(2))).await;

        let limit = Duration::from_secs(600);
        assert_eq!(store.idle_users(limit).await, vec![UserId(1)]);
        assert!(store.remove_if_idle(UserId(2), limit).await.is_none());
        assert!(store.remove_if_idle(UserId(1), limit).await.is_some());
        assert!(store.load(UserId(1)).await.is_none());
        assert!(store.load(UserId(2)).await.is_some());
    }

    #[tokio::test]
    async fn remove_if_idle_keeps_a_refreshed_session() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new(UserId(3));
        session.touched_at = Utc::now() - chrono::Duration::minutes(30);
        store.save(session.clone()).await;
        let limit = Duration::from_secs(600);
        assert_eq!(store.idle_users(limit).await, vec![UserId(3)]);

        session.touch();
        store.save(session).await;
        assert!(store.remove_if_idle(UserId(3), limit).await.is_none());
        assert!(store.load(UserId(3)).await.is_some());
    }

    #[tokio::test]
    async fn remove_returns_previous_session() {
        let store = InMemorySessionStore::new();
        store.save(Session::new(UserId(7))).await;
        assert!(store.remove(UserId(7)).await.is_some());
        assert!(store.remove(UserId(7)).await.is_none());
    }
}
