use crate::bot::ui;
use crate::core::flow::{Messenger, Reply};
use crate::core::submission::{DeliveryError, Submission};
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode, UserId};

pub struct TelegramMessenger {
    bot: Bot,
    admin_chat: ChatId,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, admin_chat: ChatId) -> Self {
        Self { bot, admin_chat }
    }
}

#[async_trait::async_trait]
impl Messenger for TelegramMessenger {
    async fn reply(&self, user: UserId, reply: Reply) -> Result<(), DeliveryError> {
        let rendered = ui::render(&reply);
        let mut request = self
            .bot
            .send_message(ChatId::from(user), rendered.text)
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true);
        if let Some(keyboard) = rendered.keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await?;
        Ok(())
    }

    async fn forward_to_admin(&self, submission: &Submission) -> Result<(), DeliveryError> {
        self.bot
            .send_message(self.admin_chat, ui::admin_summary(submission))
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await?;
        self.bot
            .send_photo(self.admin_chat, InputFile::file_id(submission.screenshot.file_id.clone()))
            .caption(ui::admin_photo_caption(submission))
            .await?;
        log::info!("Forwarded submission from {} to admin chat {}", submission.user_id, self.admin_chat);
        Ok(())
    }
}
