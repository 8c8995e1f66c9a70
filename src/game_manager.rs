use crate::{
    error::GameError,
    game::{outbound::Outbound, outbound::TrackedMessage, GameView},
};
use teloxide::types::{ChatId, MessageId, UserId};

/// What to show, and in which game chat, after an event has been handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub channel: ChatId,
    pub messages: Vec<Outbound>,
}

/// Chat commands that target an existing game.
#[derive(Clone, Debug)]
pub enum Command {
    Join { user: UserId, name: String },
    Leave { user: UserId },
    Kick { requester: UserId, target: UserId },
    Start { user: UserId },
    Stop { user: UserId },
    Resume { user: UserId },
}

/// Button presses on game messages.
#[derive(Clone, Copy, Debug)]
pub enum Reaction {
    Submit {
        user: UserId,
        card_index: usize,
    },
    JudgeChoice {
        user: UserId,
        message_id: MessageId,
        choice: usize,
    },
}

pub trait GameManager {
    fn create_game(&self, channel: ChatId, creator: UserId, name: &str)
        -> Result<Delivery, GameError>;

    /// Drops the game of `channel` and all of its players. No-op if there is none.
    fn remove_game(&self, channel: ChatId);

    /// The chat of the game a player is currently in.
    fn find_game_for_player(&self, player: UserId) -> Option<ChatId>;

    /// `channel` is where the command was issued; the player's own game takes
    /// precedence so commands also work from a private chat.
    fn route_message(&self, channel: ChatId, command: Command) -> Result<Delivery, GameError>;

    /// `Ok(None)` when the reaction does not belong to any game.
    fn route_reaction(&self, reaction: Reaction) -> Result<Option<Delivery>, GameError>;

    fn submission_timeout(&self, channel: ChatId, round: u32) -> Result<Delivery, GameError>;

    fn record_message(&self, channel: ChatId, round: u32, tracked: TrackedMessage, id: MessageId);

    fn view(&self, channel: ChatId) -> Option<GameView>;

    /// The player's hand, ready to be sent to them privately.
    fn deal_hand(&self, player: UserId) -> Option<Delivery>;
}

pub mod local_game_manager;

// game_manager owns which chat runs which game and who plays where (routing)
// game decides what an event does to that game (logic)
