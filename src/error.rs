use derive_more::Display;

/// Every way a game or manager operation can be refused.
///
/// A refused operation leaves the game untouched, with two exceptions that end the
/// game instead: `NotEnoughPlayers` raised mid-round and `DeckExhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GameError {
    #[display(fmt = "player is already in this game")]
    AlreadyInGame,
    #[display(fmt = "player is already in a game in another chat")]
    PlayerAlreadyInGame,
    #[display(fmt = "chat already has a game")]
    ChannelAlreadyHasGame,
    #[display(fmt = "game has reached its player limit")]
    GameFull,
    #[display(fmt = "requester is not the game master")]
    NotGameMaster,
    #[display(fmt = "submission rejected")]
    InvalidSubmission,
    #[display(fmt = "not enough players")]
    NotEnoughPlayers,
    #[display(fmt = "deck exhausted")]
    DeckExhausted,
    #[display(fmt = "no such game or player")]
    NotFound,
}

impl GameError {
    /// Whether the refused operation took the game down with it.
    pub fn ends_game(&self) -> bool {
        matches!(self, GameError::NotEnoughPlayers | GameError::DeckExhausted)
    }
}

impl std::error::Error for GameError {}
