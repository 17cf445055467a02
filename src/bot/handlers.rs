use super::callbacks::CallbackAction;
use super::jobs::JobRunner;
use super::messenger::Messenger;
use super::resilient::EditOutcome;
use super::views;
use crate::media::{recognize, MediaRequest};
use crate::session::PendingLinks;
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Explain how to send a link
    #[command(description = "How to send a link.")]
    Help,
    /// Check bot health
    #[command(description = "Check bot health.")]
    Healthcheck,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Handler for the /start command
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn start(messenger: Arc<dyn Messenger>, msg: Message) -> Result<()> {
    info!("START command initiated by user {}", get_user_id_safe(&msg));
    messenger
        .send(msg.chat.id, views::WELCOME.to_string(), Some(views::info_keyboard()))
        .await?;
    Ok(())
}

/// Handler for the /help command
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn help(messenger: Arc<dyn Messenger>, msg: Message) -> Result<()> {
    messenger
        .send(
            msg.chat.id,
            views::LINK_INSTRUCTIONS.to_string(),
            Some(views::info_keyboard()),
        )
        .await?;
    Ok(())
}

/// Handler for the /healthcheck command
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn healthcheck(messenger: Arc<dyn Messenger>, msg: Message) -> Result<()> {
    info!("Healthcheck command received from user {}", get_user_id_safe(&msg));
    messenger.send(msg.chat.id, "OK".to_string(), None).await?;
    Ok(())
}

/// Handler for plain text: offers the format menu for a link, instructions
/// otherwise.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_text(
    messenger: Arc<dyn Messenger>,
    msg: Message,
    pending: Arc<PendingLinks>,
) -> Result<()> {
    let text = msg.text().unwrap_or_default();
    reply_to_text(&*messenger, &pending, msg.chat.id, get_user_id_safe(&msg), text).await
}

async fn reply_to_text(
    messenger: &dyn Messenger,
    pending: &PendingLinks,
    chat_id: ChatId,
    user_id: i64,
    text: &str,
) -> Result<()> {
    let Some(link) = recognize(text) else {
        debug!(
            "Non-URL message from {user_id}: '{}'",
            crate::utils::truncate_str(text, 50)
        );
        messenger
            .send(chat_id, views::SEND_A_LINK.to_string(), Some(views::info_keyboard()))
            .await?;
        return Ok(());
    };

    info!(
        user_id,
        chat_id = chat_id.0,
        video_id = %link.video_id,
        url = %link.url,
        "Received YouTube link"
    );
    let keyboard = views::format_keyboard(&link.video_id);
    pending.remember(link).await;
    messenger
        .send(chat_id, views::CHOOSE_FORMAT.to_string(), Some(keyboard))
        .await?;
    Ok(())
}

/// Handler for inline button presses. The query must already be answered.
///
/// # Errors
///
/// Returns an error if a fallback message cannot be sent.
pub async fn handle_callback(
    messenger: Arc<dyn Messenger>,
    q: CallbackQuery,
    pending: Arc<PendingLinks>,
    jobs: Arc<JobRunner>,
) -> Result<()> {
    let data = q.data.as_deref().unwrap_or_default();
    let Some(action) = CallbackAction::parse(data) else {
        warn!("Unknown callback_data received: '{data}'");
        return Ok(());
    };
    let Some((chat_id, msg_id)) = q.message.as_ref().map(|m| (m.chat().id, m.id())) else {
        warn!("Callback {data} has no message attached");
        return Ok(());
    };
    debug!(user_id = q.from.id.0, action = ?action, "Button pressed");
    run_action(&*messenger, &pending, &jobs, chat_id, msg_id, action).await
}

async fn run_action(
    messenger: &dyn Messenger,
    pending: &PendingLinks,
    jobs: &Arc<JobRunner>,
    chat_id: ChatId,
    msg_id: MessageId,
    action: CallbackAction,
) -> Result<()> {
    match action {
        CallbackAction::ShowInstructions => {
            show_in_place(
                messenger,
                chat_id,
                msg_id,
                views::LINK_INSTRUCTIONS,
                views::info_keyboard(),
            )
            .await?;
        }
        CallbackAction::ChooseQuality { ref video_id } | CallbackAction::Back { ref video_id } => {
            if pending.get(video_id).await.is_none() {
                return link_expired(messenger, chat_id, msg_id).await;
            }
            let (text, keyboard) = if matches!(action, CallbackAction::Back { .. }) {
                (views::CHOOSE_FORMAT, views::format_keyboard(video_id))
            } else {
                (views::CHOOSE_QUALITY, views::quality_keyboard(video_id))
            };
            show_in_place(messenger, chat_id, msg_id, text, keyboard).await?;
        }
        CallbackAction::Audio { ref video_id } | CallbackAction::Video { ref video_id, .. } => {
            let Some(link) = pending.get(video_id).await else {
                return link_expired(messenger, chat_id, msg_id).await;
            };
            let Some(kind) = action.media_kind() else {
                return Ok(());
            };
            jobs.spawn(chat_id, MediaRequest { link, kind });
        }
    }
    Ok(())
}

/// Edits the button message; sends a new one unless the text was already shown.
async fn show_in_place(
    messenger: &dyn Messenger,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    keyboard: InlineKeyboardMarkup,
) -> Result<()> {
    match messenger
        .edit(chat_id, msg_id, text.to_string(), Some(keyboard.clone()))
        .await
    {
        EditOutcome::Edited => debug!("Edited message {} in place", msg_id.0),
        EditOutcome::NotModified => debug!("Message {} already shows this text", msg_id.0),
        EditOutcome::Failed => {
            warn!("Failed to edit message {}. Sending new message.", msg_id.0);
            messenger.send(chat_id, text.to_string(), Some(keyboard)).await?;
        }
    }
    Ok(())
}

async fn link_expired(messenger: &dyn Messenger, chat_id: ChatId, msg_id: MessageId) -> Result<()> {
    info!(chat_id = chat_id.0, "Button refers to an expired link");
    show_in_place(messenger, chat_id, msg_id, views::LINK_EXPIRED, views::info_keyboard()).await
}
