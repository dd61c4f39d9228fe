use crate::core::membership::{Channel, MembershipError, MembershipOracle, MembershipStatus};
use crate::core::session::{Session, SessionStore, State};
use crate::core::submission::{DeliveryError, ImageVariant, ScreenshotRef, Submission, SubmissionSink};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use teloxide::types::UserId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Start,
    Recheck,
    Cancel,
    Text(String),
    Image(Vec<ImageVariant>),
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    JoinChannel { first_name: String, join_url: Option<String> },
    AskName { first_name: String },
    AskDeal { name: String },
    AskScreenshot,
    TextRequired(State),
    ScreenshotRequired,
    Confirmed,
    Cancelled,
    NothingToCancel,
    UseStart,
    SessionExpired,
}

#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    async fn reply(&self, user: UserId, reply: Reply) -> Result<(), DeliveryError>;
    async fn forward_to_admin(&self, submission: &Submission) -> Result<(), DeliveryError>;
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Membership check failed: {0}")]
    MembershipCheckFailed(#[from] MembershipError),
    #[error("Invalid input while in {0:?}")]
    InvalidStepInput(State),
    #[error("Delivery failed: {0}")]
    DeliveryFailed(#[from] DeliveryError),
}

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub channel: Channel,
    pub join_url: Option<String>,
    pub request_timeout: Duration,
    pub session_timeout: Duration,
    pub notify_on_timeout: bool,
}

#[derive(Default)]
struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    fn for_user(&self, user: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(user).or_default().clone()
    }

    fn prune(&self) {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

pub struct FlowController {
    sessions: Arc<dyn SessionStore>,
    membership: Arc<dyn MembershipOracle>,
    messenger: Arc<dyn Messenger>,
    sink: Option<Arc<dyn SubmissionSink>>,
    settings: FlowSettings,
    locks: UserLocks,
}

impl FlowController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        membership: Arc<dyn MembershipOracle>,
        messenger: Arc<dyn Messenger>,
        sink: Option<Arc<dyn SubmissionSink>>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            sessions,
            membership,
            messenger,
            sink,
            settings,
            locks: UserLocks::default(),
        }
    }

    pub async fn handle(&self, sender: &Sender, event: Inbound) -> Result<Option<State>, FlowError> {
        let lock = self.locks.for_user(sender.id);
        let _guard = lock.lock().await;

        let session = self.sessions.load(sender.id).await;
        match (event, session) {
            (Inbound::Start, _) | (Inbound::Recheck, None) => {
                log::info!("User {} started a submission", sender.id);
                self.gate(sender, Session::new(sender.id)).await
            }
            (Inbound::Cancel, Some(session)) => {
                self.sessions.remove(sender.id).await;
                log::info!("User {} cancelled in {:?}", sender.id, session.state);
                self.send(sender.id, Reply::Cancelled).await?;
                Ok(Some(State::Cancelled))
            }
            (Inbound::Cancel, None) => {
                self.send(sender.id, Reply::NothingToCancel).await?;
                Ok(None)
            }
            (_, None) => {
                self.send(sender.id, Reply::UseStart).await?;
                Ok(None)
            }
            (event, Some(session)) => self.advance(sender, session, event).await,
        }
    }

    async fn advance(&self, sender: &Sender, mut session: Session, event: Inbound) -> Result<Option<State>, FlowError> {
        session.touch();
        match (session.state, event) {
            (State::AwaitMembership, Inbound::Recheck) => self.gate(sender, session).await,
            (State::AwaitName, Inbound::Text(name)) if !name.is_empty() => {
                log::info!("User {} provided name", sender.id);
                session.name = Some(name.clone());
                session.state = State::AwaitDeal;
                self.sessions.save(session).await;
                self.send(sender.id, Reply::AskDeal { name }).await?;
                Ok(Some(State::AwaitDeal))
            }
            (State::AwaitDeal, Inbound::Text(deal)) if !deal.is_empty() => {
                log::info!("User {} provided deal", sender.id);
                session.deal = Some(deal);
                session.state = State::AwaitScreenshot;
                self.sessions.save(session).await;
                self.send(sender.id, Reply::AskScreenshot).await?;
                Ok(Some(State::AwaitScreenshot))
            }
            (State::AwaitScreenshot, Inbound::Image(variants)) => match ScreenshotRef::best_of(&variants) {
                Some(screenshot) => {
                    session.screenshot = Some(screenshot);
                    self.complete(sender, session).await
                }
                None => self.reject(sender, session).await,
            },
            _ => self.reject(sender, session).await,
        }
    }

    async fn gate(&self, sender: &Sender, mut session: Session) -> Result<Option<State>, FlowError> {
        let (state, reply) = if self.is_member(sender.id).await {
            (State::AwaitName, Reply::AskName { first_name: sender.first_name.clone() })
        } else {
            (State::AwaitMembership, self.join_prompt(sender))
        };
        session.state = state;
        self.sessions.save(session).await;
        self.send(sender.id, reply).await?;
        Ok(Some(state))
    }

    async fn reject(&self, sender: &Sender, session: Session) -> Result<Option<State>, FlowError> {
        let state = session.state;
        log::warn!("User {}: {}", sender.id, FlowError::InvalidStepInput(state));
        self.sessions.save(session).await;
        let reply = match state {
            State::AwaitMembership => self.join_prompt(sender),
            State::AwaitScreenshot => Reply::ScreenshotRequired,
            other => Reply::TextRequired(other),
        };
        self.send(sender.id, reply).await?;
        Ok(Some(state))
    }

    async fn complete(&self, sender: &Sender, session: Session) -> Result<Option<State>, FlowError> {
        let Some(submission) = session.clone().into_submission(sender.id, sender.username.clone()) else {
            return self.reject(sender, session).await;
        };
        self.sessions.remove(sender.id).await;
        log::info!("User {} completed a submission", sender.id);

        if let Err(e) = self.send(sender.id, Reply::Confirmed).await {
            log::error!("Failed to confirm submission to {}: {}", sender.id, e);
        }
        if let Err(e) = self.bounded(self.messenger.forward_to_admin(&submission)).await {
            log::error!("Failed to forward submission from {} to admin: {}", sender.id, FlowError::from(e));
        }
        if let Some(sink) = &self.sink {
            if let Err(e) = self.bounded(sink.append(&submission)).await {
                log::error!("Failed to persist submission from {}: {}", sender.id, FlowError::from(e));
            }
        }
        Ok(Some(State::Complete))
    }

    pub async fn expire_idle(&self) -> Vec<UserId> {
        let timeout = self.settings.session_timeout;
        let mut users = Vec::new();
        for user in self.sessions.idle_users(timeout).await {
            let lock = self.locks.for_user(user);
            let _guard = lock.lock().await;
            let Some(session) = self.sessions.remove_if_idle(user, timeout).await else {
                continue;
            };
            log::info!("Session of {} expired in {:?}", user, session.state);
            if self.settings.notify_on_timeout {
                if let Err(e) = self.send(user, Reply::SessionExpired).await {
                    log::warn!("Failed to notify {} about expiry: {}", user, e);
                }
            }
            users.push(user);
        }
        self.locks.prune();
        users
    }

    async fn is_member(&self, user: UserId) -> bool {
        let timeout = self.settings.request_timeout;
        let result = match tokio::time::timeout(timeout, self.membership.status(&self.settings.channel, user)).await {
            Ok(result) => result,
            Err(_) => Err(MembershipError::Timeout(timeout)),
        };
        let status = result.unwrap_or_else(|e| {
            log::warn!("User {}: {}", user, FlowError::MembershipCheckFailed(e));
            MembershipStatus::Unknown
        });
        log::info!("Membership of {} in {:?}: {:?}", user, self.settings.channel, status);
        status.passes()
    }

    fn join_prompt(&self, sender: &Sender) -> Reply {
        Reply::JoinChannel {
            first_name: sender.first_name.clone(),
            join_url: self.settings.join_url.clone(),
        }
    }

    async fn send(&self, user: UserId, reply: Reply) -> Result<(), FlowError> {
        Ok(self.bounded(self.messenger.reply(user, reply)).await?)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, DeliveryError>>) -> Result<T, DeliveryError> {
        let timeout = self.settings.request_timeout;
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| DeliveryError::Timeout(timeout))?
    }
}
