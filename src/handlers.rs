use std::sync::Arc;

use teloxide::{prelude::*, types::ChatId, RequestError};

use crate::{
    error::GameError,
    game::outbound::Outbound,
    game_manager::{local_game_manager::LocalGameManager, Delivery, GameManager},
};
use delivery::deliver;
use timeout::TimeoutScheduler;

pub type AsyncBotState = Arc<LocalGameManager>;

pub fn new_async_bot_state(manager: LocalGameManager) -> AsyncBotState {
    Arc::new(manager)
}

pub fn schema() -> Handler<
    'static,
    DependencyMap,
    Result<(), teloxide::RequestError>,
    teloxide::dispatching::DpHandlerDescription,
> {
    dptree::entry()
        .branch(command_handler::get_command_handler())
        .branch(callback_handler::get_callback_handler())
}

/// Text shown to players when an operation is refused.
pub fn humanize(err: GameError) -> String {
    let text = match err {
        GameError::AlreadyInGame => "You are already in this game.",
        GameError::PlayerAlreadyInGame => "You are already playing in another chat. /leave that game first.",
        GameError::ChannelAlreadyHasGame => "This chat already has a game. /join it instead.",
        GameError::GameFull => "Sorry, the game is full.",
        GameError::NotGameMaster => "Only the game master can do that.",
        GameError::InvalidSubmission => "You can't play that card right now.",
        GameError::NotEnoughPlayers => "Not enough players. A game needs at least 3.",
        GameError::DeckExhausted => "The deck has run out of cards. Game over!",
        GameError::NotFound => "There is no game for that here. /create one!",
    };
    text.to_string()
}

/// Delivers the outcome of a game operation, or tells `channel` why it was refused.
pub async fn settle(
    bot: &Bot,
    bot_state: &AsyncBotState,
    scheduler: &TimeoutScheduler,
    channel: ChatId,
    result: Result<Delivery, GameError>,
) -> Result<(), RequestError> {
    match result {
        Ok(delivery) => {
            let game_channel = delivery.channel;
            deliver(bot, bot_state, scheduler, delivery).await?;
            if bot_state.view(game_channel).is_none() {
                log::info!("Game in chat {} is over", game_channel.0);
            }
            Ok(())
        }
        Err(err) => {
            if err.ends_game() {
                log::info!("Game in chat {} ended: {}", channel.0, err);
            } else {
                log::debug!("Refused in chat {}: {}", channel.0, err);
            }
            let report = Delivery {
                channel,
                messages: vec![Outbound::ReportError {
                    message: humanize(err),
                }],
            };
            deliver(bot, bot_state, scheduler, report).await
        }
    }
}

pub mod callback_handler;
pub mod command_handler;
pub mod delivery;
pub mod timeout;
