use crate::core::membership::{Channel, MembershipError, MembershipOracle, MembershipStatus};
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, Recipient, UserId};

pub struct TelegramMembership {
    bot: Bot,
}

impl TelegramMembership {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait::async_trait]
impl MembershipOracle for TelegramMembership {
    async fn status(&self, channel: &Channel, user: UserId) -> Result<MembershipStatus, MembershipError> {
        let member = self.bot.get_chat_member(recipient(channel), user).await?;
        Ok(status_of(&member.kind))
    }
}

pub fn recipient(channel: &Channel) -> Recipient {
    match channel {
        Channel::Username(name) => Recipient::ChannelUsername(format!("@{}", name)),
        Channel::Id(id) => Recipient::Id(ChatId(*id)),
    }
}

pub fn status_of(kind: &ChatMemberKind) -> MembershipStatus {
    match kind {
        ChatMemberKind::Owner(_) => MembershipStatus::Owner,
        ChatMemberKind::Administrator(_) => MembershipStatus::Admin,
        ChatMemberKind::Member => MembershipStatus::Member,
        ChatMemberKind::Restricted(_) | ChatMemberKind::Left | ChatMemberKind::Banned(_) => {
            MembershipStatus::NotMember
        }
    }
}
