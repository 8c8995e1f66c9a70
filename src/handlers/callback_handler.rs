use std::str::FromStr;

use derive_more::Display;
use teloxide::prelude::*;

use super::{humanize, settle, timeout::TimeoutScheduler, AsyncBotState};
use crate::game_manager::{GameManager, Reaction};

pub fn get_callback_handler() -> Handler<
    'static,
    DependencyMap,
    Result<(), teloxide::RequestError>,
    teloxide::dispatching::DpHandlerDescription,
> {
    Update::filter_callback_query().endpoint(callback_handler)
}

/// Payload of an inline keyboard button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ButtonPress {
    /// Play the card at this position of the hand.
    #[display(fmt = "s:{}", _0)]
    Submit(usize),
    /// Pick this submission as the winner.
    #[display(fmt = "j:{}", _0)]
    Judge(usize),
}

#[derive(Debug, Display)]
#[display(fmt = "unknown button")]
pub struct UnknownButton;

impl FromStr for ButtonPress {
    type Err = UnknownButton;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, index) = s.split_once(':').ok_or(UnknownButton)?;
        let index = index.parse::<usize>().map_err(|_| UnknownButton)?;
        match kind {
            "s" => Ok(ButtonPress::Submit(index)),
            "j" => Ok(ButtonPress::Judge(index)),
            _ => Err(UnknownButton),
        }
    }
}

async fn callback_handler(
    bot_state: AsyncBotState,
    scheduler: TimeoutScheduler,
    bot: Bot,
    q: CallbackQuery,
) -> Result<(), teloxide::RequestError> {
    let user = q.from.id;
    let Some(press) = q.data.as_deref().and_then(|data| data.parse::<ButtonPress>().ok()) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let reaction = match press {
        ButtonPress::Submit(card_index) => Reaction::Submit { user, card_index },
        ButtonPress::Judge(choice) => match &q.message {
            Some(message) => Reaction::JudgeChoice {
                user,
                message_id: message.id,
                choice,
            },
            None => {
                bot.answer_callback_query(q.id).await?;
                return Ok(());
            }
        },
    };

    // Looked up first: a game that ends on this press is no longer indexed.
    let channel = bot_state.find_game_for_player(user);

    match bot_state.route_reaction(reaction) {
        Ok(delivery) => {
            bot.answer_callback_query(q.id).await?;
            if let Some(delivery) = delivery {
                let channel = delivery.channel;
                settle(&bot, &bot_state, &scheduler, channel, Ok(delivery)).await?;
            }
        }
        Err(err) if err.ends_game() => {
            bot.answer_callback_query(q.id).await?;
            if let Some(channel) = channel {
                settle(&bot, &bot_state, &scheduler, channel, Err(err)).await?;
            }
        }
        Err(err) => {
            log::debug!("Button {} from user {} refused: {}", press, user.0, err);
            bot.answer_callback_query(q.id).text(humanize(err)).await?;
        }
    }

    Ok(())
}
