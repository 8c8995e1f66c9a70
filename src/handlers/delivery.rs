use teloxide::{
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup},
    RequestError,
};

use super::{callback_handler::ButtonPress, timeout::TimeoutScheduler, AsyncBotState};
use crate::{
    game::{
        game_phase::GamePhase,
        outbound::{Outbound, TrackedMessage},
        GameView,
    },
    game_manager::{Delivery, GameManager},
};

const BLANK: &str = "___";

/// Sends every intent of `delivery` to Telegram.
///
/// Group messages go to the game chat and fail the whole delivery. Hands go to each
/// player's private chat; a player who never opened a chat with the bot is skipped.
pub async fn deliver(
    bot: &Bot,
    bot_state: &AsyncBotState,
    scheduler: &TimeoutScheduler,
    delivery: Delivery,
) -> Result<(), RequestError> {
    let Delivery { channel, messages } = delivery;

    for message in messages {
        let text = render(&message);
        match message {
            Outbound::DealHand { player, cards } => {
                let private = ChatId(player.0 as i64);
                if let Err(err) = bot
                    .send_message(private, text)
                    .reply_markup(make_hand_keyboard(&cards))
                    .await
                {
                    log::warn!("Could not send a hand to user {}: {}", player.0, err);
                }
            }
            Outbound::PostNewPrompt { round, .. } => {
                let sent = bot.send_message(channel, text).await?;
                bot_state.record_message(channel, round, TrackedMessage::Prompt, sent.id);
                scheduler.schedule(channel, round);
            }
            Outbound::SubmissionCount {
                message_id: Some(id),
                ..
            } => {
                if let Err(err) = bot.edit_message_text(channel, id, text).await {
                    log::debug!("Could not update the prompt in chat {}: {}", channel.0, err);
                }
            }
            Outbound::PostSubmissions { round, choices, .. } => {
                let sent = bot
                    .send_message(channel, text)
                    .reply_markup(make_choice_keyboard(choices.len()))
                    .await?;
                bot_state.record_message(channel, round, TrackedMessage::Submissions, sent.id);
            }
            _ => {
                bot.send_message(channel, text).await?;
            }
        }
    }

    Ok(())
}

pub fn make_hand_keyboard(cards: &[String]) -> InlineKeyboardMarkup {
    let mut keyboard = vec![];

    for (index, card) in cards.iter().enumerate() {
        let row = vec![InlineKeyboardButton::callback(
            card.to_string(),
            ButtonPress::Submit(index).to_string(),
        )];
        keyboard.push(row);
    }

    InlineKeyboardMarkup::new(keyboard)
}

pub fn make_choice_keyboard(choices: usize) -> InlineKeyboardMarkup {
    let row = (0..choices)
        .map(|index| {
            InlineKeyboardButton::callback(
                (index + 1).to_string(),
                ButtonPress::Judge(index).to_string(),
            )
        })
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(row.chunks(5).map(|r| r.to_vec()))
}

/// Puts the answers into the prompt's blanks, or after it when it has none.
pub fn fill_blanks(prompt: &str, cards: &[String]) -> String {
    let mut parts = prompt.split(BLANK);
    let mut filled = parts.next().unwrap_or_default().to_string();
    let mut cards = cards.iter();

    for part in parts {
        match cards.next() {
            Some(card) => filled.push_str(card.trim_end_matches('.')),
            None => filled.push_str(BLANK),
        }
        filled.push_str(part);
    }
    let rest = cards.map(String::as_str).collect::<Vec<_>>();
    if !rest.is_empty() {
        filled.push(' ');
        filled.push_str(&rest.join(" "));
    }
    filled
}

fn prompt_message(round: u32, judge_name: &str, prompt_text: &str, status: &str) -> String {
    format!("Round {round}. {judge_name} is judging.\n\n{prompt_text}\n\n{status}")
}

pub fn render(message: &Outbound) -> String {
    match message {
        Outbound::PlayerJoined { player_name } => format!("{player_name} joined the game."),
        Outbound::PlayerLeft { player_name } => format!("{player_name} left the game."),
        Outbound::NewGameMaster { player_name } => {
            format!("{player_name} is the new game master.")
        }
        Outbound::PostNewPrompt {
            round,
            judge_name,
            prompt_text,
            pick,
        } => {
            let status = match pick {
                1 => "Pick 1 card from your hand in our private chat.".to_string(),
                n => format!("Pick {n} cards from your hand in our private chat, in order."),
            };
            prompt_message(*round, judge_name, prompt_text, &status)
        }
        Outbound::DealHand { cards, .. } => {
            if cards.is_empty() {
                "You have no cards right now.".to_string()
            } else {
                "Your hand. Tap a card to play it.".to_string()
            }
        }
        Outbound::SubmissionCount {
            round,
            judge_name,
            prompt_text,
            submitted,
            total,
            ..
        } => prompt_message(
            *round,
            judge_name,
            prompt_text,
            &format!("{submitted}/{total} players have played."),
        ),
        Outbound::PostSubmissions {
            prompt_text,
            choices,
            ..
        } => {
            let listed = choices
                .iter()
                .enumerate()
                .map(|(i, cards)| format!("{}. {}", i + 1, fill_blanks(prompt_text, cards)))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Everyone has played. Judge, pick the winner:\n\n{listed}")
        }
        Outbound::AnnounceRoundWinner {
            player_name,
            prompt_text,
            cards,
            score,
        } => format!(
            "{player_name} wins the round:\n{}\n\n{player_name} has {score} point{}.",
            fill_blanks(prompt_text, cards),
            if *score == 1 { "" } else { "s" }
        ),
        Outbound::AnnounceGameWinner { player_name, score } => {
            format!("{player_name} wins the game with {score} points!")
        }
        Outbound::GameStopped => "The game has been stopped.".to_string(),
        Outbound::ReportError { message } => message.clone(),
    }
}

pub fn render_view(view: &GameView) -> String {
    let mut lines = vec![format!("Game master: {}", view.master)];
    match view.phase {
        GamePhase::Idle => lines.push("Waiting for the game master to /start.".to_string()),
        GamePhase::Finished => lines.push("The game is over.".to_string()),
        GamePhase::Submitting | GamePhase::Judging => {
            lines.push(format!(
                "Round {}, judged by {}.",
                view.round,
                view.judge.as_deref().unwrap_or("nobody")
            ));
            if let Some(prompt) = &view.prompt {
                lines.push(prompt.clone());
            }
            if view.phase == GamePhase::Judging {
                lines.push("Waiting for the judge.".to_string());
            } else if !view.outstanding.is_empty() {
                lines.push(format!("Waiting for: {}", view.outstanding.join(", ")));
            }
        }
    }
    lines.push(String::new());
    lines.push("Scores:".to_string());
    for (name, score) in &view.scores {
        lines.push(format!("{name}: {score}"));
    }
    lines.join("\n")
}
