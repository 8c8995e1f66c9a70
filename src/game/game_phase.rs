use super::{
    deck::Deck,
    outbound::{Outbound, TrackedMessage},
    player::{Player, PlayerRegistry, PlayerStatus},
};
use crate::{card::CardId, error::GameError};
use std::collections::HashMap;
use teloxide::types::{MessageId, UserId};

/// Fewer active players than this cannot sustain a round.
pub const MIN_PLAYERS: usize = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GamePhase {
    Idle,
    Submitting,
    Judging,
    Finished,
}

#[derive(Clone, Debug)]
pub struct Round {
    pub number: u32,
    pub judge: UserId,
    pub prompt: CardId,
    /// Every player eligible this round with the cards they have put in so far.
    pub submissions: HashMap<UserId, Vec<CardId>>,
    /// Owners of the complete submissions, in the order shown to the judge.
    pub choices: Vec<UserId>,
    pub prompt_message: Option<MessageId>,
    pub judging_message: Option<MessageId>,
}

impl Round {
    /// (complete submissions, eligible players)
    pub fn progress(&self, pick: usize) -> (usize, usize) {
        let complete = self
            .submissions
            .values()
            .filter(|cards| cards.len() >= pick)
            .count();
        (complete, self.submissions.len())
    }
}

/// Drives a game through its rounds. Holds no cards of its own beyond the current
/// prompt and submissions; the deck and players are lent in by the owning game.
pub struct RoundMachine {
    phase: GamePhase,
    round: Option<Round>,
    /// Join-order position of the current (or most recent) judge.
    judge_slot: usize,
    rounds_played: u32,
    win_score: u32,
}

impl RoundMachine {
    pub fn new(win_score: u32) -> RoundMachine {
        RoundMachine {
            phase: GamePhase::Idle,
            round: None,
            judge_slot: 0,
            rounds_played: 0,
            win_score,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Idle -> Submitting. The first judge is the first active player at or after `from`.
    pub fn start(
        &mut self,
        from: usize,
        deck: &mut Deck,
        players: &mut PlayerRegistry,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        if self.phase != GamePhase::Idle {
            return Ok(());
        }
        if players.active_count() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        self.begin_round(from, deck, players, out)
    }

    pub fn submit(
        &mut self,
        player: UserId,
        hand_index: usize,
        deck: &mut Deck,
        players: &mut PlayerRegistry,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        let (GamePhase::Submitting, Some(round)) = (self.phase, self.round.as_mut()) else {
            return Err(GameError::InvalidSubmission);
        };
        let pick = deck.catalog().get(round.prompt).pick;
        let Some(slot) = round.submissions.get_mut(&player) else {
            return Err(GameError::InvalidSubmission);
        };
        if slot.len() >= pick {
            return Err(GameError::InvalidSubmission);
        }
        let Some(submitter) = players.get_mut(player) else {
            return Err(GameError::InvalidSubmission);
        };
        if hand_index >= submitter.hand.len() {
            return Err(GameError::InvalidSubmission);
        }

        slot.push(submitter.hand.remove(hand_index));
        if slot.len() < pick {
            // Positions shifted; the old hand keyboard is stale.
            out.push(deal_hand(submitter, deck));
        }

        let (submitted, total) = round.progress(pick);
        out.push(Outbound::SubmissionCount {
            round: round.number,
            message_id: round.prompt_message,
            judge_name: players.name_of(round.judge),
            prompt_text: deck.catalog().text(round.prompt).to_string(),
            submitted,
            total,
        });

        if submitted == total {
            self.close_submissions(deck, players, out)?;
        }
        Ok(())
    }

    /// Picks the winner when `judge` reacted on the judging message. Anything else
    /// is dropped without error.
    pub fn judge(
        &mut self,
        judge: UserId,
        message_id: MessageId,
        choice: usize,
        deck: &mut Deck,
        players: &mut PlayerRegistry,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        let accepted = self.phase == GamePhase::Judging
            && self.round.as_ref().map_or(false, |r| {
                r.judge == judge
                    && r.judging_message == Some(message_id)
                    && choice < r.choices.len()
            });
        if !accepted {
            return Ok(());
        }
        let Some(round) = self.round.take() else {
            return Ok(());
        };

        let winner = round.choices[choice];
        let catalog = deck.catalog();
        let prompt_text = catalog.text(round.prompt).to_string();
        let cards: Vec<String> = round
            .submissions
            .get(&winner)
            .map(|ids| ids.iter().map(|id| catalog.text(*id).to_string()).collect())
            .unwrap_or_default();
        for (_, submitted) in round.submissions {
            deck.discard(submitted);
        }

        match players.get_mut(winner) {
            Some(p) => {
                p.score += 1;
                p.trophies.push(round.prompt);
                out.push(Outbound::AnnounceRoundWinner {
                    player_name: p.name.clone(),
                    prompt_text,
                    cards,
                    score: p.score,
                });
            }
            None => deck.discard(Some(round.prompt)),
        }
        if let Err(err) = players.top_up_hands(deck) {
            self.finish(deck, players);
            return Err(err);
        }

        let leader = players
            .iter()
            .filter(|p| p.score >= self.win_score)
            .max_by_key(|p| p.score);
        if let Some(leader) = leader {
            out.push(Outbound::AnnounceGameWinner {
                player_name: leader.name.clone(),
                score: leader.score,
            });
            self.phase = GamePhase::Finished;
            return Ok(());
        }

        self.begin_round(self.judge_slot + 1, deck, players, out)
    }

    /// Hook for an external timer: closes the submission window of `round_number`.
    /// Players who did not finish sit out from now on.
    pub fn submission_timeout(
        &mut self,
        round_number: u32,
        deck: &mut Deck,
        players: &mut PlayerRegistry,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        if self.phase != GamePhase::Submitting {
            return Ok(());
        }
        let Some(round) = self.round.as_ref().filter(|r| r.number == round_number) else {
            return Ok(());
        };

        let pick = deck.catalog().get(round.prompt).pick;
        let late = round
            .submissions
            .iter()
            .filter(|(_, cards)| cards.len() < pick)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for id in late {
            if let Some(p) = players.get_mut(id) {
                p.status = PlayerStatus::AwaitingKick;
            }
        }

        if players.active_count() < MIN_PLAYERS {
            self.teardown(deck, players);
            return Err(GameError::NotEnoughPlayers);
        }
        self.close_submissions(deck, players, out)
    }

    /// Reacts to a player having been dropped from the registry at join-order
    /// position `index`.
    pub fn player_removed(
        &mut self,
        player: UserId,
        index: usize,
        deck: &mut Deck,
        players: &mut PlayerRegistry,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        if !matches!(self.phase, GamePhase::Submitting | GamePhase::Judging) {
            return Ok(());
        }
        let Some(round) = self.round.as_mut() else {
            return Ok(());
        };

        if let Some(cards) = round.submissions.remove(&player) {
            deck.discard(cards);
        }
        round.choices.retain(|id| *id != player);
        let was_judge = round.judge == player;
        if index < self.judge_slot {
            self.judge_slot -= 1;
        }

        if players.active_count() < MIN_PLAYERS {
            self.teardown(deck, players);
            return Err(GameError::NotEnoughPlayers);
        }
        if was_judge {
            // Whoever slid into the judge's position judges next.
            return self.begin_round(index, deck, players, out);
        }

        match self.phase {
            GamePhase::Submitting => {
                let pick = deck.catalog().get(round.prompt).pick;
                let (submitted, total) = round.progress(pick);
                if submitted == total {
                    return self.close_submissions(deck, players, out);
                }
                out.push(Outbound::SubmissionCount {
                    round: round.number,
                    message_id: round.prompt_message,
                    judge_name: players.name_of(round.judge),
                    prompt_text: deck.catalog().text(round.prompt).to_string(),
                    submitted,
                    total,
                });
                Ok(())
            }
            GamePhase::Judging if round.choices.is_empty() => {
                self.begin_round(self.judge_slot + 1, deck, players, out)
            }
            _ => Ok(()),
        }
    }

    pub fn record_message(&mut self, round_number: u32, tracked: TrackedMessage, id: MessageId) {
        if let Some(round) = self.round.as_mut().filter(|r| r.number == round_number) {
            match tracked {
                TrackedMessage::Prompt => round.prompt_message = Some(id),
                TrackedMessage::Submissions => round.judging_message = Some(id),
            }
        }
    }

    /// Ends any running round and returns its cards: submissions to their owners,
    /// the prompt to the discard pile.
    pub fn teardown(&mut self, deck: &mut Deck, players: &mut PlayerRegistry) {
        let prompt = self.clear_round(deck, players);
        deck.discard(prompt);
        if self.phase != GamePhase::Finished {
            self.phase = GamePhase::Idle;
        }
    }

    /// Ends the game for good, returning the cards in play.
    pub fn finish(&mut self, deck: &mut Deck, players: &mut PlayerRegistry) {
        self.phase = GamePhase::Finished;
        self.teardown(deck, players);
    }

    fn begin_round(
        &mut self,
        from: usize,
        deck: &mut Deck,
        players: &mut PlayerRegistry,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        let next = next_active(players, from);
        let Some((slot, judge)) = next.filter(|_| players.active_count() >= MIN_PLAYERS) else {
            self.teardown(deck, players);
            return Err(GameError::NotEnoughPlayers);
        };

        let previous = self.clear_round(deck, players);
        let prompt = match deck.draw_prompt(previous) {
            Ok(prompt) => prompt,
            Err(err) => {
                self.finish(deck, players);
                return Err(err);
            }
        };
        let pick = deck.catalog().get(prompt).pick;
        let short_handed = players
            .iter()
            .any(|p| p.is_active() && p.id != judge && p.hand.len() < pick);
        if short_handed {
            deck.discard(Some(prompt));
            self.finish(deck, players);
            return Err(GameError::DeckExhausted);
        }

        self.judge_slot = slot;
        self.rounds_played += 1;
        let eligible = players
            .iter()
            .filter(|p| p.is_active() && p.id != judge)
            .collect::<Vec<_>>();

        let card = deck.catalog().get(prompt);
        out.push(Outbound::PostNewPrompt {
            round: self.rounds_played,
            judge_name: players.name_of(judge),
            prompt_text: card.text.clone(),
            pick: card.pick,
        });
        out.extend(eligible.iter().map(|p| deal_hand(p, deck)));

        self.round = Some(Round {
            number: self.rounds_played,
            judge,
            prompt,
            submissions: eligible.iter().map(|p| (p.id, Vec::new())).collect(),
            choices: Vec::new(),
            prompt_message: None,
            judging_message: None,
        });
        self.phase = GamePhase::Submitting;
        Ok(())
    }

    /// Submitting -> Judging with whatever is complete. A round nobody finished is
    /// skipped.
    fn close_submissions(
        &mut self,
        deck: &mut Deck,
        players: &mut PlayerRegistry,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        let Some(round) = self.round.as_mut() else {
            return Ok(());
        };
        let pick = deck.catalog().get(round.prompt).pick;

        for (id, cards) in round.submissions.iter_mut() {
            if cards.len() < pick {
                match players.get_mut(*id) {
                    Some(p) => p.hand.append(cards),
                    None => deck.discard(cards.drain(..)),
                }
            }
        }
        round.submissions.retain(|_, cards| !cards.is_empty());

        let mut choices = players
            .iter()
            .map(|p| p.id)
            .filter(|id| round.submissions.contains_key(id))
            .collect::<Vec<_>>();
        if choices.is_empty() {
            return self.begin_round(self.judge_slot + 1, deck, players, out);
        }
        deck.shuffle(&mut choices);

        let catalog = deck.catalog();
        out.push(Outbound::PostSubmissions {
            round: round.number,
            prompt_text: catalog.text(round.prompt).to_string(),
            choices: choices
                .iter()
                .map(|id| {
                    round.submissions[id]
                        .iter()
                        .map(|card| catalog.text(*card).to_string())
                        .collect()
                })
                .collect(),
        });
        round.choices = choices;
        self.phase = GamePhase::Judging;
        Ok(())
    }

    fn clear_round(&mut self, deck: &mut Deck, players: &mut PlayerRegistry) -> Option<CardId> {
        let round = self.round.take()?;
        for (id, cards) in round.submissions {
            match players.get_mut(id) {
                Some(p) => p.hand.extend(cards),
                None => deck.discard(cards),
            }
        }
        Some(round.prompt)
    }
}

/// First active player at or after join-order position `from`, wrapping around.
fn next_active(players: &PlayerRegistry, from: usize) -> Option<(usize, UserId)> {
    let len = players.len();
    (0..len)
        .map(|i| (from + i) % len)
        .find_map(|i| players.at(i).filter(|p| p.is_active()).map(|p| (i, p.id)))
}

pub(super) fn deal_hand(player: &Player, deck: &Deck) -> Outbound {
    Outbound::DealHand {
        player: player.id,
        cards: player
            .hand
            .iter()
            .map(|card| deck.catalog().text(*card).to_string())
            .collect(),
    }
}
