//! Telegram bot transport and handlers.

use crate::message::{format_prompt_message, parse_query_callback};
use crate::notifier::Notifier;
use crate::transport::{ActionButton, DispatchError, NotificationTransport};
use async_trait::async_trait;
use chrono::Utc;
use movewatch_core::MessageHandle;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show the pair keyboard")]
    Start,
    #[command(description = "Show alert settings and tracked pairs")]
    Status,
    #[command(description = "Show help")]
    Help,
}

/// Build an inline keyboard with one button per row.
fn inline_keyboard(actions: &[ActionButton]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(actions.iter().map(|a| {
        vec![InlineKeyboardButton::callback(
            a.label.clone(),
            a.callback_data.clone(),
        )]
    }))
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    /// Get the underlying bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Run the command and button handler until the task is aborted.
    pub async fn run(self: Arc<Self>, notifier: Arc<Notifier>) {
        let bot = self.bot.clone();

        let command_bot = Arc::clone(&self);
        let command_notifier = Arc::clone(&notifier);
        let callback_bot = Arc::clone(&self);
        let callback_notifier = Arc::clone(&notifier);

        let handler = dptree::entry()
            .branch(Update::filter_message().filter_command::<Command>().endpoint(
                move |bot: Bot, msg: Message, cmd: Command| {
                    let this = Arc::clone(&command_bot);
                    let notifier = Arc::clone(&command_notifier);
                    async move { this.handle_command(&notifier, bot, msg, cmd).await }
                },
            ))
            .branch(Update::filter_callback_query().endpoint(
                move |bot: Bot, query: CallbackQuery| {
                    let this = Arc::clone(&callback_bot);
                    let notifier = Arc::clone(&callback_notifier);
                    async move { this.handle_callback(&notifier, bot, query).await }
                },
            ));

        info!("Telegram handler started");
        Dispatcher::builder(bot, handler)
            .build()
            .dispatch()
            .await;
    }

    async fn handle_command(
        &self,
        notifier: &Notifier,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        match cmd {
            Command::Start => {
                bot.send_message(msg.chat.id, format_prompt_message(notifier.threshold()))
                    .reply_markup(inline_keyboard(notifier.keyboard()))
                    .await?;
            }

            Command::Status => {
                let config = notifier.config();
                let dedup = notifier.engine().config();
                let pairs: Vec<String> = config
                    .symbols
                    .iter()
                    .map(|s| format!("{} ({})", s.name, s.pair_label()))
                    .collect();
                let text = format!(
                    "<b>Alert Settings</b>\n\n\
                     Threshold: {}%\n\
                     Cooldown: {}s\n\
                     Pairs: {}\n\
                     Symbols alerted so far: {}",
                    notifier.threshold(),
                    dedup.min_message_interval.num_seconds(),
                    pairs.join(", "),
                    notifier.engine().store().len()
                );
                bot.send_message(msg.chat.id, text)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }

            Command::Help => {
                bot.send_message(msg.chat.id, Command::descriptions().to_string())
                    .await?;
            }
        }

        Ok(())
    }

    async fn handle_callback(
        &self,
        notifier: &Notifier,
        bot: Bot,
        query: CallbackQuery,
    ) -> Result<(), TelegramError> {
        bot.answer_callback_query(query.id.clone()).await?;

        let Some(name) = query.data.as_deref().and_then(parse_query_callback) else {
            debug!(data = ?query.data, "Ignoring unknown callback");
            return Ok(());
        };

        let (chat_id, origin) = match query.message.as_ref() {
            Some(message) => {
                let chat_id = message.chat().id.0;
                (chat_id, Some(MessageHandle::new(chat_id, message.id().0)))
            }
            None => (ChatId::from(query.from.id).0, None),
        };

        info!(symbol = name, chat_id = chat_id, "On-demand query");
        notifier.query(name, chat_id, origin, Utc::now()).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationTransport for TelegramBot {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        actions: &[ActionButton],
    ) -> Result<MessageHandle, DispatchError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if !actions.is_empty() {
            request = request.reply_markup(inline_keyboard(actions));
        }
        let sent = request.await?;
        Ok(MessageHandle::new(sent.chat.id.0, sent.id.0))
    }

    async fn edit(
        &self,
        chat_id: i64,
        handle: &MessageHandle,
        text: &str,
        actions: &[ActionButton],
    ) -> Result<(), DispatchError> {
        if !handle.is_in_chat(chat_id) {
            return Err(DispatchError::ForeignMessage(*handle, chat_id));
        }

        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(handle.message_id), text)
            .parse_mode(ParseMode::Html);
        if !actions.is_empty() {
            request = request.reply_markup(inline_keyboard(actions));
        }

        match request.await {
            Ok(_) => Ok(()),
            // identical content; the message already shows this text
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
