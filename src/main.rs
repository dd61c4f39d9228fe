mod bot;
mod core;
mod infrastructure;

use crate::bot::inbound;
use crate::bot::membership::TelegramMembership;
use crate::bot::messenger::TelegramMessenger;
use crate::core::flow::{FlowController, FlowSettings, Inbound};
use crate::core::reaper;
use crate::core::session::InMemorySessionStore;
use crate::core::submission::SubmissionSink;
use crate::infrastructure::config::Config;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::store::JsonFileStore;
use anyhow::{anyhow, Context};
use dotenv::dotenv;
use std::sync::Arc;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "Submit a loot deal.")]
    Start,
    #[command(description = "Cancel the current submission.")]
    Cancel,
    #[command(description = "Show this help.")]
    Help,
}

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guard = init_logging("logs");
    log::info!("Starting loot submit bot...");

    let config = Config::from_env().map_err(|e| {
        log::error!("Refusing to start: {}", e);
        e
    })?;

    let bot = Bot::new(config.bot_token.clone());
    bot.set_my_commands(Command::bot_commands())
        .await
        .context("Failed to set commands")?;

    let sink: Option<Arc<dyn SubmissionSink>> = match &config.submissions_file {
        Some(path) => {
            let store = JsonFileStore::new(path);
            log::info!("Persisting submissions to {}", store.path().display());
            Some(Arc::new(store))
        }
        None => {
            log::warn!("Submission persistence is disabled.");
            None
        }
    };

    let settings = FlowSettings {
        channel: config.channel.clone(),
        join_url: config.join_url(),
        request_timeout: config.request_timeout,
        session_timeout: config.session_timeout,
        notify_on_timeout: config.notify_on_timeout,
    };
    if settings.join_url.is_none() {
        log::warn!("No join link for {:?}; set CHANNEL_INVITE_LINK to show a join button.", settings.channel);
    }

    let controller = Arc::new(FlowController::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(TelegramMembership::new(bot.clone())),
        Arc::new(TelegramMessenger::new(bot.clone(), config.admin_chat_id)),
        sink,
        settings,
    ));

    tokio::spawn(reaper::run_session_reaper(
        controller.clone(),
        reaper::sweep_period(config.session_timeout),
    ));

    let message_handler_chain = Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(dptree::entry().filter_command::<Command>().endpoint(command_handler))
        .branch(dptree::entry().endpoint(message_handler));

    let callback_handler_chain = Update::filter_callback_query().endpoint(callback_handler);

    let schema = dptree::entry()
        .branch(message_handler_chain)
        .branch(callback_handler_chain);

    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot stopped.");
    Ok(())
}

async fn command_handler(bot: Bot, msg: Message, cmd: Command, controller: Arc<FlowController>) -> HandlerResult {
    let user = msg.from().ok_or_else(|| anyhow!("Message has no sender"))?;
    let event = match cmd {
        Command::Start => Inbound::Start,
        Command::Cancel => Inbound::Cancel,
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
            return Ok(());
        }
    };
    controller.handle(&inbound::sender_of(user), event).await?;
    Ok(())
}

async fn message_handler(msg: Message, controller: Arc<FlowController>) -> HandlerResult {
    let user = msg.from().ok_or_else(|| anyhow!("Message has no sender"))?;
    controller
        .handle(&inbound::sender_of(user), inbound::from_message(&msg))
        .await?;
    Ok(())
}

async fn callback_handler(bot: Bot, q: CallbackQuery, controller: Arc<FlowController>) -> HandlerResult {
    let event = q.data.as_deref().map_or(Inbound::Unsupported, inbound::from_callback);
    let result = controller.handle(&inbound::sender_of(&q.from), event).await;
    bot.answer_callback_query(q.id).await?;
    result?;
    Ok(())
}
