use crate::{
    card::{CardCatalog, CardId, CardKind},
    error::GameError,
};
use rand::{seq::SliceRandom, Rng, RngCore};
use std::sync::Arc;

/// Draw stack plus discard pile for one kind of card.
struct Pile {
    draw: Vec<CardId>,
    discard: Vec<CardId>,
}

impl Pile {
    fn draw<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> Vec<CardId> {
        let mut drawn = Vec::with_capacity(n);
        while drawn.len() < n {
            if self.draw.is_empty() {
                if self.discard.is_empty() {
                    break;
                }
                self.draw.append(&mut self.discard);
                self.draw.shuffle(rng);
            }
            if let Some(card) = self.draw.pop() {
                drawn.push(card);
            }
        }
        drawn
    }
}

/// Per-game piles over the shared catalog. Prompts and responses cycle separately.
pub struct Deck {
    catalog: Arc<CardCatalog>,
    prompts: Pile,
    responses: Pile,
    rng: Box<dyn RngCore + Send>,
}

impl Deck {
    pub fn new(catalog: Arc<CardCatalog>, mut rng: Box<dyn RngCore + Send>) -> Deck {
        let mut prompts = catalog.ids_of(CardKind::Prompt).collect::<Vec<_>>();
        let mut responses = catalog.ids_of(CardKind::Response).collect::<Vec<_>>();
        prompts.shuffle(rng.as_mut());
        responses.shuffle(rng.as_mut());

        Deck {
            catalog,
            prompts: Pile {
                draw: prompts,
                discard: Vec::new(),
            },
            responses: Pile {
                draw: responses,
                discard: Vec::new(),
            },
            rng,
        }
    }

    pub fn catalog(&self) -> &CardCatalog {
        &self.catalog
    }

    /// Draws up to `n` response cards, reshuffling the discard pile when the draw
    /// pile runs dry. Fails only when nothing at all could be drawn.
    pub fn draw(&mut self, n: usize) -> Result<Vec<CardId>, GameError> {
        let drawn = self.responses.draw(n, self.rng.as_mut());
        if n > 0 && drawn.is_empty() {
            return Err(GameError::DeckExhausted);
        }
        Ok(drawn)
    }

    /// Puts cards of either kind on their discard pile.
    pub fn discard<I>(&mut self, cards: I)
    where
        I: IntoIterator<Item = CardId>,
    {
        for card in cards {
            match self.catalog.get(card).kind {
                CardKind::Prompt => self.prompts.discard.push(card),
                CardKind::Response => self.responses.discard.push(card),
            }
        }
    }

    /// Discards `previous` (if any) and draws a fresh prompt.
    pub fn draw_prompt(&mut self, previous: Option<CardId>) -> Result<CardId, GameError> {
        self.discard(previous);
        self.prompts
            .draw(1, self.rng.as_mut())
            .pop()
            .ok_or(GameError::DeckExhausted)
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(self.rng.as_mut());
    }

    #[cfg(test)]
    pub(crate) fn contents(&self) -> Vec<CardId> {
        [
            &self.prompts.draw,
            &self.prompts.discard,
            &self.responses.draw,
            &self.responses.discard,
        ]
        .into_iter()
        .flatten()
        .copied()
        .collect()
    }
}
