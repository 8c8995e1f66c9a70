use crate::{card::CardCatalog, config::GameConfig, error::GameError};
use deck::Deck;
use game_phase::*;
use outbound::{Outbound, TrackedMessage};
use player::*;
use rand::RngCore;
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId, UserId};

pub mod deck;
pub mod game_phase;
pub mod outbound;
pub mod player;

/// One game, bound to one chat. Callers share it behind a single lock; every
/// method runs start to finish under that lock.
pub struct Game {
    channel: ChatId,
    master: UserId,
    deck: Deck,
    players: PlayerRegistry,
    rounds: RoundMachine,
    dissolved: bool,
}

/// Read-only snapshot for rendering.
#[derive(Clone, Debug)]
pub struct GameView {
    pub channel: ChatId,
    pub phase: GamePhase,
    pub round: u32,
    pub master: String,
    pub judge: Option<String>,
    pub prompt: Option<String>,
    pub pick: usize,
    /// Players whose submission is still incomplete.
    pub outstanding: Vec<String>,
    /// Complete submissions in judging order. Empty outside of judging.
    pub choices: Vec<Vec<String>>,
    pub scores: Vec<(String, u32)>,
}

type Outcome = Result<Vec<Outbound>, GameError>;

impl Game {
    pub fn new(
        channel: ChatId,
        master: UserId,
        master_name: &str,
        catalog: Arc<CardCatalog>,
        config: GameConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Game, GameError> {
        let mut deck = Deck::new(catalog, rng);
        let mut players = PlayerRegistry::new(config.hand_size, config.max_players);
        players.add(master, master_name, &mut deck)?;

        Ok(Game {
            channel,
            master,
            deck,
            players,
            rounds: RoundMachine::new(config.win_score),
            dissolved: false,
        })
    }

    pub fn channel(&self) -> ChatId {
        self.channel
    }

    pub fn master(&self) -> UserId {
        self.master
    }

    pub fn is_master(&self, id: UserId) -> bool {
        self.master == id
    }

    pub fn has_player(&self, id: UserId) -> bool {
        self.players.contains(id)
    }

    pub fn player_ids(&self) -> Vec<UserId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn phase(&self) -> GamePhase {
        self.rounds.phase()
    }

    /// Stopped, dissolved or won. The owner should discard the game.
    pub fn is_over(&self) -> bool {
        self.dissolved || self.rounds.phase() == GamePhase::Finished
    }

    pub fn join(&mut self, id: UserId, name: &str) -> Outcome {
        self.ensure_running()?;
        let joined = self.players.add(id, name, &mut self.deck).map(|player| {
            vec![
                Outbound::PlayerJoined {
                    player_name: player.name.clone(),
                },
                deal_hand(player, &self.deck),
            ]
        });
        match joined {
            Ok(out) => Ok(out),
            Err(err) => self.settle(Err(err), Vec::new()),
        }
    }

    pub fn leave(&mut self, id: UserId) -> Outcome {
        self.ensure_running()?;
        let Some((index, departed)) = self.players.remove(id, &mut self.deck) else {
            return Err(GameError::NotFound);
        };
        let mut out = vec![Outbound::PlayerLeft {
            player_name: departed.name,
        }];

        if self.players.is_empty() {
            self.rounds.teardown(&mut self.deck, &mut self.players);
            self.dissolved = true;
            return Err(GameError::NotEnoughPlayers);
        }
        if departed.id == self.master {
            if let Some(next) = self.players.longest_tenured() {
                self.master = next.id;
                out.push(Outbound::NewGameMaster {
                    player_name: next.name.clone(),
                });
            }
        }

        let result = self.rounds.player_removed(
            id,
            index,
            &mut self.deck,
            &mut self.players,
            &mut out,
        );
        self.settle(result, out)
    }

    pub fn kick(&mut self, requester: UserId, target: UserId) -> Outcome {
        self.ensure_running()?;
        if !self.is_master(requester) {
            return Err(GameError::NotGameMaster);
        }
        if !self.has_player(target) {
            return Err(GameError::NotFound);
        }
        self.leave(target)
    }

    pub fn stop(&mut self, requester: UserId) -> Outcome {
        self.ensure_running()?;
        if !self.is_master(requester) {
            return Err(GameError::NotGameMaster);
        }
        self.close();
        Ok(vec![Outbound::GameStopped])
    }

    /// Ends the game without announcing anything. Cards in play go back to the deck.
    pub fn close(&mut self) {
        if !self.dissolved {
            self.rounds.teardown(&mut self.deck, &mut self.players);
            self.dissolved = true;
        }
    }

    /// Brings a player who sat out back into rotation from the next round on.
    pub fn resume(&mut self, id: UserId) -> Outcome {
        self.ensure_running()?;
        let player = self.players.get_mut(id).ok_or(GameError::NotFound)?;
        player.status = PlayerStatus::Active;
        let result = self.players.top_up_hands(&mut self.deck);
        self.settle(result, Vec::new())
    }

    /// Idle -> first round. The player after the master judges first.
    pub fn start(&mut self) -> Outcome {
        self.ensure_running()?;
        let from = self.players.position(self.master).map_or(0, |i| i + 1);
        let mut out = Vec::new();
        let result = self
            .rounds
            .start(from, &mut self.deck, &mut self.players, &mut out);
        match result {
            // Too few players to begin is a plain refusal, not the end of the game.
            Err(GameError::NotEnoughPlayers) => Err(GameError::NotEnoughPlayers),
            result => self.settle(result, out),
        }
    }

    pub fn submit(&mut self, id: UserId, hand_index: usize) -> Outcome {
        self.ensure_running()?;
        let mut out = Vec::new();
        let result =
            self.rounds
                .submit(id, hand_index, &mut self.deck, &mut self.players, &mut out);
        self.settle(result, out)
    }

    pub fn judge_reaction(&mut self, id: UserId, message_id: MessageId, choice: usize) -> Outcome {
        self.ensure_running()?;
        let mut out = Vec::new();
        let result = self.rounds.judge(
            id,
            message_id,
            choice,
            &mut self.deck,
            &mut self.players,
            &mut out,
        );
        self.settle(result, out)
    }

    pub fn submission_timeout(&mut self, round: u32) -> Outcome {
        self.ensure_running()?;
        let mut out = Vec::new();
        let result =
            self.rounds
                .submission_timeout(round, &mut self.deck, &mut self.players, &mut out);
        self.settle(result, out)
    }

    pub fn record_message(&mut self, round: u32, tracked: TrackedMessage, id: MessageId) {
        self.rounds.record_message(round, tracked, id);
    }

    /// The player's hand as a private-message intent.
    pub fn hand(&self, id: UserId) -> Option<Outbound> {
        self.players.get(id).map(|p| deal_hand(p, &self.deck))
    }

    pub fn current_view(&self) -> GameView {
        let catalog = self.deck.catalog();
        let round = self.rounds.round();
        let pick = round.map_or(0, |r| catalog.get(r.prompt).pick);

        let outstanding = round
            .map(|r| {
                self.players
                    .iter()
                    .filter(|p| r.submissions.get(&p.id).map_or(false, |c| c.len() < pick))
                    .map(|p| p.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        let choices = match (self.rounds.phase(), round) {
            (GamePhase::Judging, Some(r)) => r
                .choices
                .iter()
                .map(|id| {
                    r.submissions[id]
                        .iter()
                        .map(|card| catalog.text(*card).to_string())
                        .collect()
                })
                .collect(),
            _ => Vec::new(),
        };

        GameView {
            channel: self.channel,
            phase: self.rounds.phase(),
            round: round.map_or(0, |r| r.number),
            master: self.players.name_of(self.master),
            judge: round.map(|r| self.players.name_of(r.judge)),
            prompt: round.map(|r| catalog.text(r.prompt).to_string()),
            pick,
            outstanding,
            choices,
            scores: self.players.iter().map(|p| (p.name.clone(), p.score)).collect(),
        }
    }

    fn ensure_running(&self) -> Result<(), GameError> {
        if self.is_over() {
            Err(GameError::NotFound)
        } else {
            Ok(())
        }
    }

    /// Running out of players mid-round dissolves the game; running out of cards
    /// finishes it.
    fn settle(&mut self, result: Result<(), GameError>, out: Vec<Outbound>) -> Outcome {
        match result {
            Ok(()) => Ok(out),
            Err(GameError::NotEnoughPlayers) => {
                self.dissolved = true;
                Err(GameError::NotEnoughPlayers)
            }
            Err(GameError::DeckExhausted) => {
                if self.rounds.phase() != GamePhase::Finished {
                    self.rounds.finish(&mut self.deck, &mut self.players);
                }
                Err(GameError::DeckExhausted)
            }
            Err(err) => Err(err),
        }
    }
}
