use super::deck::Deck;
use crate::{card::CardId, error::GameError};
use teloxide::types::UserId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlayerStatus {
    Active,
    /// Missed a submission window. Sits out until they come back or get kicked.
    AwaitingKick,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub id: UserId,
    pub name: String,
    pub hand: Vec<CardId>,
    pub score: u32,
    /// Prompts won, one per point.
    pub trophies: Vec<CardId>,
    pub status: PlayerStatus,
}

impl Player {
    pub fn is_active(&self) -> bool {
        self.status == PlayerStatus::Active
    }
}

/// Players of one game in join order.
pub struct PlayerRegistry {
    players: Vec<Player>,
    hand_size: usize,
    max_players: usize,
}

impl PlayerRegistry {
    pub fn new(hand_size: usize, max_players: usize) -> PlayerRegistry {
        PlayerRegistry {
            players: Vec::new(),
            hand_size,
            max_players,
        }
    }

    pub fn add(&mut self, id: UserId, name: &str, deck: &mut Deck) -> Result<&Player, GameError> {
        if self.contains(id) {
            return Err(GameError::AlreadyInGame);
        }
        if self.players.len() >= self.max_players {
            return Err(GameError::GameFull);
        }

        // A short hand is fine; the round checks it covers the prompt.
        let hand = deck.draw(self.hand_size)?;
        self.players.push(Player {
            id,
            name: name.to_string(),
            hand,
            score: 0,
            trophies: Vec::new(),
            status: PlayerStatus::Active,
        });

        Ok(&self.players[self.players.len() - 1])
    }

    /// Drops the player and returns their cards to the deck. Yields the position the
    /// player held in join order along with what is left of them.
    pub fn remove(&mut self, id: UserId, deck: &mut Deck) -> Option<(usize, Player)> {
        let index = self.position(id)?;
        let mut player = self.players.remove(index);
        deck.discard(player.hand.drain(..));
        deck.discard(player.trophies.drain(..));
        Some((index, player))
    }

    /// Refills active players' hands. Fails with `DeckExhausted` when an active
    /// player is left holding nothing.
    pub fn top_up_hands(&mut self, deck: &mut Deck) -> Result<(), GameError> {
        let mut empty_handed = false;
        for player in self.players.iter_mut().filter(|p| p.is_active()) {
            let missing = self.hand_size.saturating_sub(player.hand.len());
            match deck.draw(missing) {
                Ok(cards) => player.hand.extend(cards),
                Err(_) => empty_handed |= player.hand.is_empty(),
            }
        }
        if empty_handed {
            Err(GameError::DeckExhausted)
        } else {
            Ok(())
        }
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: UserId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn get(&self, id: UserId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: UserId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn at(&self, index: usize) -> Option<&Player> {
        self.players.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_active()).count()
    }

    /// Earliest joiner still active, falling back to the earliest joiner.
    pub fn longest_tenured(&self) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.is_active())
            .or_else(|| self.players.first())
    }

    pub fn name_of(&self, id: UserId) -> String {
        self.get(id).map(|p| p.name.clone()).unwrap_or_default()
    }
}
