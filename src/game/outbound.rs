use teloxide::types::{MessageId, UserId};

/// Something the chat should show as a result of a game operation. The game only
/// describes what happened; delivering it is the caller's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    PlayerJoined {
        player_name: String,
    },
    PlayerLeft {
        player_name: String,
    },
    NewGameMaster {
        player_name: String,
    },
    PostNewPrompt {
        round: u32,
        judge_name: String,
        prompt_text: String,
        pick: usize,
    },
    /// Sent privately to `player`.
    DealHand {
        player: UserId,
        cards: Vec<String>,
    },
    /// Refresh of the prompt message, edited in place when its id is known.
    SubmissionCount {
        round: u32,
        message_id: Option<MessageId>,
        judge_name: String,
        prompt_text: String,
        submitted: usize,
        total: usize,
    },
    PostSubmissions {
        round: u32,
        prompt_text: String,
        choices: Vec<Vec<String>>,
    },
    AnnounceRoundWinner {
        player_name: String,
        prompt_text: String,
        cards: Vec<String>,
        score: u32,
    },
    AnnounceGameWinner {
        player_name: String,
        score: u32,
    },
    GameStopped,
    ReportError {
        message: String,
    },
}

/// Chat messages of a round that the game needs to know the id of.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackedMessage {
    Prompt,
    Submissions,
}
