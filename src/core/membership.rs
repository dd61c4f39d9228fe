use teloxide::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Username(String),
    Id(i64),
}

impl Channel {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return Some(Channel::Id(id));
        }
        let name = raw.trim_start_matches('@');
        let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then(|| Channel::Username(name.to_string()))
    }

    pub fn join_url(&self) -> Option<String> {
        match self {
            Channel::Username(name) => Some(format!("https://t.me/{}", name)),
            Channel::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Member,
    Admin,
    Owner,
    NotMember,
    Unknown,
}

impl MembershipStatus {
    pub fn passes(self) -> bool {
        matches!(
            self,
            MembershipStatus::Member | MembershipStatus::Admin | MembershipStatus::Owner
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("Membership lookup failed: {0}")]
    Request(#[from] teloxide::RequestError),
    #[error("Membership lookup timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait::async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn status(&self, channel: &Channel, user: UserId) -> Result<MembershipStatus, MembershipError>;
}
