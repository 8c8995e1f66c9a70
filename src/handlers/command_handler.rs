use teloxide::{prelude::*, types::User, utils::command::BotCommands};

use super::{delivery::render_view, settle, timeout::TimeoutScheduler, AsyncBotState};
use crate::{
    error::GameError,
    game_manager::{Command, GameManager},
};

pub fn get_command_handler() -> Handler<
    'static,
    DependencyMap,
    Result<(), teloxide::RequestError>,
    teloxide::dispatching::DpHandlerDescription,
> {
    Update::filter_message()
        .filter_command::<GameCommand>()
        .endpoint(command_handler)
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Cards Against Humanity commands")]
enum GameCommand {
    #[command(description = "Shows this message.")]
    Help,
    #[command(description = "Create a game in this chat")]
    Create,
    #[command(description = "Join the game in this chat")]
    Join,
    #[command(description = "Leave your game")]
    Leave,
    #[command(description = "Kick the player whose message you reply to (game master)")]
    Kick,
    #[command(description = "Start the first round (game master)")]
    Start,
    #[command(description = "Stop the game (game master)")]
    Stop,
    #[command(description = "Play again after sitting out a round")]
    Back,
    #[command(description = "Show the round and scores")]
    Status,
    #[command(description = "Send your hand again")]
    Hand,
}

fn player_name(user: &User) -> String {
    match &user.username {
        Some(username) => format!("@{username}"),
        None => user.full_name(),
    }
}

async fn command_handler(
    bot_state: AsyncBotState,
    scheduler: TimeoutScheduler,
    bot: Bot,
    msg: Message,
    cmd: GameCommand,
) -> Result<(), teloxide::RequestError> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let (id, name) = (user.id, player_name(user));
    let channel = msg.chat.id;

    let result = match cmd {
        GameCommand::Help => {
            bot.send_message(channel, GameCommand::descriptions().to_string())
                .await?;
            return Ok(());
        }
        GameCommand::Create => {
            if msg.chat.is_private() {
                bot.send_message(channel, "Games are played in groups. Add me to one and /create there.")
                    .await?;
                return Ok(());
            }
            let created = bot_state.create_game(channel, id, &name);
            if created.is_ok() {
                log::info!("Game created in chat {} by {}", channel.0, name);
                bot.send_message(
                    channel,
                    format!("{name} created a game. /join to play, the game master can /start once 3 players are in. Open a private chat with me to receive your cards."),
                )
                .await?;
            }
            created
        }
        GameCommand::Join => {
            if msg.chat.is_private() {
                Err(GameError::NotFound)
            } else {
                bot_state.route_message(channel, Command::Join { user: id, name })
            }
        }
        GameCommand::Leave => bot_state.route_message(channel, Command::Leave { user: id }),
        GameCommand::Kick => {
            let Some(target) = msg.reply_to_message().and_then(|m| m.from()) else {
                bot.send_message(channel, "Reply to a message of the player you want to kick.")
                    .await?;
                return Ok(());
            };
            bot_state.route_message(
                channel,
                Command::Kick {
                    requester: id,
                    target: target.id,
                },
            )
        }
        GameCommand::Start => bot_state.route_message(channel, Command::Start { user: id }),
        GameCommand::Stop => {
            let stopped = bot_state.route_message(channel, Command::Stop { user: id });
            if stopped.is_ok() {
                log::info!("Game in chat {} stopped by {}", channel.0, name);
            }
            stopped
        }
        GameCommand::Back => bot_state.route_message(channel, Command::Resume { user: id }),
        GameCommand::Status => {
            let game_channel = bot_state.find_game_for_player(id).unwrap_or(channel);
            let text = match bot_state.view(game_channel) {
                Some(view) => render_view(&view),
                None => "There is no game here. /create one!".to_string(),
            };
            bot.send_message(channel, text).await?;
            return Ok(());
        }
        GameCommand::Hand => bot_state.deal_hand(id).ok_or(GameError::NotFound),
    };

    settle(&bot, &bot_state, &scheduler, channel, result).await
}
