use serde::Deserialize;
use std::{error::Error, fs, path::Path};

const BUILTIN_PACK: &str = include_str!("../packs/main.json");

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CardKind {
    Prompt,
    Response,
}

#[derive(Clone, Debug)]
pub struct Card {
    pub kind: CardKind,
    pub text: String,
    /// Number of responses a prompt asks for. Always 0 for responses.
    pub pick: usize,
}

/// Position of a card inside its catalog.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord, derive_more::Display)]
pub struct CardId(pub usize);

#[derive(Deserialize)]
pub struct CardPack {
    pub name: String,
    pub prompts: Vec<PromptEntry>,
    pub responses: Vec<String>,
}

#[derive(Deserialize)]
pub struct PromptEntry {
    pub text: String,
    #[serde(default = "default_pick")]
    pub pick: usize,
}

fn default_pick() -> usize {
    1
}

/// Read-only set of every card known to the process. Shared by all games.
pub struct CardCatalog {
    name: String,
    cards: Vec<Card>,
}

impl CardCatalog {
    pub fn from_pack(pack: CardPack) -> CardCatalog {
        let prompts = pack.prompts.into_iter().map(|p| Card {
            kind: CardKind::Prompt,
            text: p.text,
            pick: p.pick.max(1),
        });
        let responses = pack.responses.into_iter().map(|text| Card {
            kind: CardKind::Response,
            text,
            pick: 0,
        });

        CardCatalog {
            name: pack.name,
            cards: prompts.chain(responses).collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<CardCatalog, serde_json::Error> {
        let pack: CardPack = serde_json::from_str(json)?;
        Ok(CardCatalog::from_pack(pack))
    }

    pub fn load(path: &Path) -> Result<CardCatalog, Box<dyn Error + Send + Sync>> {
        let json = fs::read_to_string(path)?;
        Ok(CardCatalog::from_json(&json)?)
    }

    /// The pack compiled into the binary.
    pub fn builtin() -> Result<CardCatalog, serde_json::Error> {
        CardCatalog::from_json(BUILTIN_PACK)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, id: CardId) -> &Card {
        &self.cards[id.0]
    }

    pub fn text(&self, id: CardId) -> &str {
        &self.cards[id.0].text
    }

    pub fn ids_of(&self, kind: CardKind) -> impl Iterator<Item = CardId> + '_ {
        self.cards
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.kind == kind)
            .map(|(i, _)| CardId(i))
    }

    pub fn count(&self, kind: CardKind) -> usize {
        self.ids_of(kind).count()
    }
}

#[cfg(test)]
impl CardCatalog {
    /// Catalog of `prompts` single-pick prompts followed by `responses` responses,
    /// all with distinct text.
    pub(crate) fn numbered(prompts: usize, responses: usize) -> CardCatalog {
        CardCatalog::from_pack(CardPack {
            name: "numbered".to_string(),
            prompts: (0..prompts)
                .map(|i| PromptEntry {
                    text: format!("prompt {i} ___"),
                    pick: 1,
                })
                .collect(),
            responses: (0..responses).map(|i| format!("response {i}")).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_defaults_to_one_and_is_never_zero() {
        let catalog = CardCatalog::from_json(
            r#"{
                "name": "test",
                "prompts": [
                    {"text": "Why ___?"},
                    {"text": "___ and ___.", "pick": 2},
                    {"text": "Broken.", "pick": 0}
                ],
                "responses": ["A", "B"]
            }"#,
        )
        .unwrap();

        let picks = catalog
            .ids_of(CardKind::Prompt)
            .map(|id| catalog.get(id).pick)
            .collect::<Vec<_>>();
        assert_eq!(picks, vec![1, 2, 1]);
        assert_eq!(catalog.count(CardKind::Response), 2);
        assert_eq!(catalog.text(CardId(3)), "A");
    }

    #[test]
    fn builtin_pack_parses() {
        let catalog = CardCatalog::builtin().unwrap();
        assert!(catalog.count(CardKind::Prompt) > 0);
        assert!(catalog.count(CardKind::Response) > catalog.count(CardKind::Prompt));
    }

    #[test]
    fn malformed_pack_is_an_error() {
        assert!(CardCatalog::from_json(r#"{"name": "x", "prompts": 3}"#).is_err());
    }
}
