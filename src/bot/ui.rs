use crate::core::flow::Reply;
use crate::core::session::State;
use crate::core::submission::Submission;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html::escape;

pub const CHECK_JOIN: &str = "check_join";

pub struct Rendered {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Rendered {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }
}

pub fn join_menu(join_url: Option<&str>) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = vec![];

    if let Some(url) = join_url {
        match url.parse() {
            Ok(url) => keyboard.push(vec![InlineKeyboardButton::url("✅ Join Channel", url)]),
            Err(e) => log::warn!("Invalid channel link {}: {}", url, e),
        }
    }
    keyboard.push(vec![InlineKeyboardButton::callback(
        "🔄 Joined! Check Again",
        CHECK_JOIN,
    )]);
    InlineKeyboardMarkup::new(keyboard)
}

pub fn render(reply: &Reply) -> Rendered {
    match reply {
        Reply::JoinChannel { first_name, join_url } => Rendered {
            text: format!(
                "👋 Hello {}!\n\nI'm your <b>Loot Submit Bot</b> 💥\n\nPlease join our channel to continue, then tap <b>Check Again</b>.",
                escape(first_name)
            ),
            keyboard: Some(join_menu(join_url.as_deref())),
        },
        Reply::AskName { first_name } => Rendered::plain(format!(
            "👋 Hello {}! Let's get started.\n\nWhat is your name?",
            escape(first_name)
        )),
        Reply::AskDeal { name } => Rendered::plain(format!(
            "Okay, {}!\n\nWhich deal did you loot? Send me its name or the product link.",
            escape(name)
        )),
        Reply::AskScreenshot => Rendered::plain("Great! Now send a screenshot of that product 📸"),
        Reply::TextRequired(State::AwaitName) => {
            Rendered::plain("✏️ Please send your name as a text message.")
        }
        Reply::TextRequired(State::AwaitDeal) => {
            Rendered::plain("✏️ Please send the deal name or link as a text message.")
        }
        Reply::TextRequired(_) => Rendered::plain("✏️ Please answer with a text message."),
        Reply::ScreenshotRequired => {
            Rendered::plain("📸 That isn't a photo. Please send the screenshot as an image.")
        }
        Reply::Confirmed => Rendered::plain(
            "🎉 <b>Thank you so much!</b> 🎉\n\nYour entry has been submitted.\nWinners are announced every <b>Sunday at 9 PM</b> on our channel. Good luck! 🍀",
        ),
        Reply::Cancelled => Rendered::plain(
            "No problem, the submission was cancelled. Send /start whenever you're ready.",
        ),
        Reply::NothingToCancel => {
            Rendered::plain("There is nothing to cancel. Send /start to submit a loot deal.")
        }
        Reply::UseStart => Rendered::plain("ℹ️ Send /start to submit a loot deal."),
        Reply::SessionExpired => {
            Rendered::plain("⌛ Your submission timed out. Send /start to begin again.")
        }
    }
}

pub fn admin_summary(submission: &Submission) -> String {
    let username = submission
        .username
        .as_deref()
        .map(|u| format!("@{}", escape(u)))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "<b>🔥 New loot submission! 🔥</b>\n\n<b>Submitted by:</b> {} (ID: {})\n<b>Name (as given):</b> {}\n<b>Deal info/link:</b>\n{}\n<b>At:</b> {}",
        username,
        submission.user_id,
        escape(&submission.name),
        escape(&submission.deal),
        submission.submitted_at.format("%Y-%m-%d %H:%M UTC")
    )
}

pub fn admin_photo_caption(submission: &Submission) -> String {
    format!("📸 Screenshot from ID {}", submission.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::submission::ScreenshotRef;
    use chrono::Utc;
    use teloxide::types::{InlineKeyboardButtonKind, UserId};

    fn buttons(markup: &InlineKeyboardMarkup) -> Vec<&InlineKeyboardButtonKind> {
        markup.inline_keyboard.iter().flatten().map(|b| &b.kind).collect()
    }

    #[test]
    fn join_menu_has_link_and_recheck() {
        let markup = join_menu(Some("https://t.me/LootDeals"));
        let kinds = buttons(&markup);
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], InlineKeyboardButtonKind::Url(url) if url.as_str() == "https://t.me/LootDeals"));
        assert!(matches!(kinds[1], InlineKeyboardButtonKind::CallbackData(data) if data == CHECK_JOIN));
    }

    #[test]
    fn join_menu_without_link_keeps_recheck() {
        let markup = join_menu(None);
        let kinds = buttons(&markup);
        assert_eq!(kinds.len(), 1);
        assert!(matches!(kinds[0], InlineKeyboardButtonKind::CallbackData(_)));
    }

    #[test]
    fn user_text_is_escaped() {
        let rendered = render(&Reply::AskDeal {
            name: "<b>Rahul</b>".into(),
        });
        assert!(rendered.text.contains("&lt;b&gt;Rahul&lt;/b&gt;"));
        assert!(rendered.keyboard.is_none());
    }

    #[test]
    fn admin_summary_lists_every_field() {
        let submission = Submission {
            user_id: UserId(42),
            username: None,
            name: "Rahul".into(),
            deal: "50% off on X & Y".into(),
            screenshot: ScreenshotRef {
                file_id: "file".into(),
                file_unique_id: "uniq".into(),
            },
            submitted_at: Utc::now(),
        };
        let summary = admin_summary(&submission);
        assert!(summary.contains("N/A (ID: 42)"));
        assert!(summary.contains("Rahul"));
        assert!(summary.contains("50% off on X &amp; Y"));
    }
}
