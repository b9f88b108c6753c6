use std::time::Duration;

use log::{debug, error, info, warn};

use crate::{
    commands::{self, Command},
    queries::{
        accounts::Registry,
        telegram::{TelegramClient, Update},
    },
    types::Notifier,
};

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Answers registration commands until the task is dropped.
pub async fn listen_commands(telegram: TelegramClient, registry: Registry) {
    let bot_username = loop {
        match telegram.get_me().await {
            Ok(username) => break username,
            Err(err) => {
                warn!("[Telegram] getMe failed with err {err}");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    };
    info!("[Telegram] Listening for commands as @{bot_username}");
    let mut offset = 0;

    loop {
        let updates = match telegram.get_updates(offset).await {
            Ok(updates) => updates,
            Err(err) => {
                warn!("[Telegram] getUpdates failed with err {err}");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            handle_update(&telegram, &registry, &bot_username, update).await;
        }
    }
}

/// Runs the command in `update`, if any, and replies in the chat it came from.
pub async fn handle_update(
    telegram: &TelegramClient,
    registry: &Registry,
    bot_username: &str,
    update: Update,
) {
    let Some(message) = update.message else {
        return;
    };
    let (Some(text), Some(from)) = (message.text.as_deref(), message.from.as_ref()) else {
        return;
    };
    let Some(command) = Command::parse(text, bot_username) else {
        return;
    };

    debug!("[Telegram] {:?} from {}", command, from.id);
    let reply = commands::handle(registry, &from.id.to_string(), command).await;

    if let Err(err) = telegram.send(&message.chat.id.to_string(), &reply).await {
        error!(
            "[Telegram] Replying in chat {} failed with err {err}",
            message.chat.id
        );
    }
}
