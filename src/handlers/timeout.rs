use std::time::Duration;

use teloxide::{prelude::*, types::ChatId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{settle, AsyncBotState};
use crate::{error::GameError, game_manager::GameManager};

/// Closes submission windows that ran out. A window is identified by its chat and
/// round number; the game ignores windows of rounds that already moved on.
#[derive(Clone)]
pub struct TimeoutScheduler {
    window: Option<Duration>,
    expired: UnboundedSender<(ChatId, u32)>,
}

impl TimeoutScheduler {
    pub fn new(window: Option<Duration>) -> (TimeoutScheduler, UnboundedReceiver<(ChatId, u32)>) {
        let (expired, receiver) = mpsc::unbounded_channel();
        (TimeoutScheduler { window, expired }, receiver)
    }

    pub fn schedule(&self, channel: ChatId, round: u32) {
        let Some(window) = self.window else {
            return;
        };
        let expired = self.expired.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = expired.send((channel, round));
        });
    }
}

/// Runs for the lifetime of the bot.
pub async fn run_timeouts(
    bot: Bot,
    bot_state: AsyncBotState,
    scheduler: TimeoutScheduler,
    mut expired: UnboundedReceiver<(ChatId, u32)>,
) {
    while let Some((channel, round)) = expired.recv().await {
        let result = bot_state.submission_timeout(channel, round);
        // The game may be long gone.
        if matches!(result, Err(GameError::NotFound)) {
            continue;
        }
        if let Err(err) = settle(&bot, &bot_state, &scheduler, channel, result).await {
            log::warn!("Failed to close round {} in chat {}: {}", round, channel.0, err);
        }
    }
}
