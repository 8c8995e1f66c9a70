use super::{Command, Delivery, GameManager, Reaction};
use crate::{
    card::CardCatalog,
    config::GameConfig,
    error::GameError,
    game::{
        outbound::{Outbound, TrackedMessage},
        Game, GameView,
    },
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use teloxide::types::{ChatId, MessageId, UserId};

pub type SharedGame = Arc<Mutex<Game>>;

struct Registry {
    games: HashMap<ChatId, SharedGame>,
    player_map: HashMap<UserId, ChatId>,
    seeder: StdRng,
}

/// In-memory games of this process.
///
/// The registry lock only guards the two indices and is always released before a
/// game's own lock is taken, so a slow game never holds up the others.
pub struct LocalGameManager {
    catalog: Arc<CardCatalog>,
    config: GameConfig,
    registry: Mutex<Registry>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalGameManager {
    pub fn new(catalog: Arc<CardCatalog>, config: GameConfig) -> LocalGameManager {
        LocalGameManager::with_seeder(catalog, config, StdRng::from_entropy())
    }

    /// Games created by this manager shuffle reproducibly.
    pub fn with_seed(catalog: Arc<CardCatalog>, config: GameConfig, seed: u64) -> LocalGameManager {
        LocalGameManager::with_seeder(catalog, config, StdRng::seed_from_u64(seed))
    }

    fn with_seeder(catalog: Arc<CardCatalog>, config: GameConfig, seeder: StdRng) -> LocalGameManager {
        LocalGameManager {
            catalog,
            config,
            registry: Mutex::new(Registry {
                games: HashMap::new(),
                player_map: HashMap::new(),
                seeder,
            }),
        }
    }

    pub fn game_count(&self) -> usize {
        self.registry().games.len()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }

    fn game(&self, channel: ChatId) -> Option<SharedGame> {
        self.registry().games.get(&channel).cloned()
    }

    /// The player's game, or else the game of `channel`.
    fn resolve(&self, channel: ChatId, player: UserId) -> Option<(ChatId, SharedGame)> {
        let registry = self.registry();
        let channel = registry.player_map.get(&player).copied().unwrap_or(channel);
        registry.games.get(&channel).map(|game| (channel, game.clone()))
    }

    /// Runs `op` under the game's lock and retires the game if it ended.
    fn run<T, F>(&self, channel: ChatId, game: &SharedGame, op: F) -> Result<T, GameError>
    where
        F: FnOnce(&mut Game) -> Result<T, GameError>,
    {
        let (result, over) = {
            let mut game = lock(game);
            let result = op(&mut *game);
            (result, game.is_over())
        };
        if over {
            self.retire(channel, game);
        }
        result
    }

    /// Unregisters `game` unless the chat has moved on to a newer one.
    fn retire(&self, channel: ChatId, game: &SharedGame) {
        let mut registry = self.registry();
        let current = registry
            .games
            .get(&channel)
            .map_or(false, |g| Arc::ptr_eq(g, game));
        if current {
            registry.games.remove(&channel);
            registry.player_map.retain(|_, c| *c != channel);
        }
    }

    fn unindex(&self, player: UserId, channel: ChatId) {
        let mut registry = self.registry();
        if registry.player_map.get(&player) == Some(&channel) {
            registry.player_map.remove(&player);
        }
    }

    fn join(&self, channel: ChatId, user: UserId, name: &str) -> Result<Delivery, GameError> {
        // Claim the index entry first so the same user cannot race into two games.
        let game = {
            let mut registry = self.registry();
            if let Some(current) = registry.player_map.get(&user) {
                return Err(if *current == channel {
                    GameError::AlreadyInGame
                } else {
                    GameError::PlayerAlreadyInGame
                });
            }
            let game = registry
                .games
                .get(&channel)
                .cloned()
                .ok_or(GameError::NotFound)?;
            registry.player_map.insert(user, channel);
            game
        };

        let result = self.run(channel, &game, |g| g.join(user, name));
        if result.is_err() {
            self.unindex(user, channel);
        }
        result.map(|messages| Delivery { channel, messages })
    }

    /// Runs a command that may take `departing` out of the game.
    fn remove_player<F>(
        &self,
        channel: ChatId,
        game: &SharedGame,
        departing: UserId,
        op: F,
    ) -> Result<Delivery, GameError>
    where
        F: FnOnce(&mut Game) -> Result<Vec<Outbound>, GameError>,
    {
        let result = self.run(channel, game, op);
        if matches!(result, Ok(_) | Err(GameError::NotEnoughPlayers)) {
            self.unindex(departing, channel);
        }
        result.map(|messages| Delivery { channel, messages })
    }
}

impl GameManager for LocalGameManager {
    fn create_game(
        &self,
        channel: ChatId,
        creator: UserId,
        name: &str,
    ) -> Result<Delivery, GameError> {
        let mut registry = self.registry();
        if registry.games.contains_key(&channel) {
            return Err(GameError::ChannelAlreadyHasGame);
        }
        if registry.player_map.contains_key(&creator) {
            return Err(GameError::PlayerAlreadyInGame);
        }

        let rng = StdRng::seed_from_u64(registry.seeder.gen());
        let game = Game::new(
            channel,
            creator,
            name,
            self.catalog.clone(),
            self.config,
            Box::new(rng),
        )?;
        let messages = game.hand(creator).into_iter().collect();

        registry.games.insert(channel, Arc::new(Mutex::new(game)));
        registry.player_map.insert(creator, channel);
        Ok(Delivery { channel, messages })
    }

    fn remove_game(&self, channel: ChatId) {
        let removed = {
            let mut registry = self.registry();
            let removed = registry.games.remove(&channel);
            if removed.is_some() {
                registry.player_map.retain(|_, c| *c != channel);
            }
            removed
        };
        // Anyone still holding the game sees it as over.
        if let Some(game) = removed {
            lock(&game).close();
        }
    }

    fn find_game_for_player(&self, player: UserId) -> Option<ChatId> {
        self.registry().player_map.get(&player).copied()
    }

    fn route_message(&self, channel: ChatId, command: Command) -> Result<Delivery, GameError> {
        let issuer = match &command {
            // Joining only ever targets the chat it was asked in.
            Command::Join { user, name } => return self.join(channel, *user, name),
            Command::Leave { user }
            | Command::Start { user }
            | Command::Stop { user }
            | Command::Resume { user } => *user,
            Command::Kick { requester, .. } => *requester,
        };
        let (game_channel, game) = self.resolve(channel, issuer).ok_or(GameError::NotFound)?;
        let delivery = |messages| Delivery {
            channel: game_channel,
            messages,
        };

        match command {
            Command::Join { user, name } => self.join(channel, user, &name),
            Command::Leave { user } => {
                self.remove_player(game_channel, &game, user, |g| g.leave(user))
            }
            Command::Kick { requester, target } => {
                self.remove_player(game_channel, &game, target, |g| g.kick(requester, target))
            }
            Command::Start { user } => self
                .run(game_channel, &game, |g| {
                    if g.is_master(user) {
                        g.start()
                    } else {
                        Err(GameError::NotGameMaster)
                    }
                })
                .map(delivery),
            Command::Stop { user } => self
                .run(game_channel, &game, |g| g.stop(user))
                .map(delivery),
            Command::Resume { user } => self
                .run(game_channel, &game, |g| g.resume(user))
                .map(delivery),
        }
    }

    fn route_reaction(&self, reaction: Reaction) -> Result<Option<Delivery>, GameError> {
        let user = match reaction {
            Reaction::Submit { user, .. } | Reaction::JudgeChoice { user, .. } => user,
        };
        let Some((channel, game)) = self
            .find_game_for_player(user)
            .and_then(|channel| Some((channel, self.game(channel)?)))
        else {
            return Ok(None);
        };

        let messages = self.run(channel, &game, |g| match reaction {
            Reaction::Submit { user, card_index } => g.submit(user, card_index),
            Reaction::JudgeChoice {
                user,
                message_id,
                choice,
            } => g.judge_reaction(user, message_id, choice),
        })?;
        Ok(Some(Delivery { channel, messages }))
    }

    fn submission_timeout(&self, channel: ChatId, round: u32) -> Result<Delivery, GameError> {
        let game = self.game(channel).ok_or(GameError::NotFound)?;
        let messages = self.run(channel, &game, |g| g.submission_timeout(round))?;
        Ok(Delivery { channel, messages })
    }

    fn record_message(&self, channel: ChatId, round: u32, tracked: TrackedMessage, id: MessageId) {
        if let Some(game) = self.game(channel) {
            lock(&game).record_message(round, tracked, id);
        }
    }

    fn view(&self, channel: ChatId) -> Option<GameView> {
        let game = self.game(channel)?;
        let view = lock(&game).current_view();
        Some(view)
    }

    fn deal_hand(&self, player: UserId) -> Option<Delivery> {
        let channel = self.find_game_for_player(player)?;
        let game = self.game(channel)?;
        let hand = lock(&game).hand(player)?;
        Some(Delivery {
            channel,
            messages: vec![hand],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::game_phase::GamePhase;

    const GROUP: ChatId = ChatId(-1);
    const OTHER_GROUP: ChatId = ChatId(-2);

    fn manager() -> LocalGameManager {
        LocalGameManager::with_seed(
            Arc::new(CardCatalog::numbered(10, 100)),
            GameConfig::default(),
            9,
        )
    }

    fn join(m: &LocalGameManager, channel: ChatId, id: u64) -> Result<Delivery, GameError> {
        m.route_message(
            channel,
            Command::Join {
                user: UserId(id),
                name: format!("p{id}"),
            },
        )
    }

    #[test]
    fn second_game_in_a_chat_is_refused() {
        let m = manager();
        m.create_game(GROUP, UserId(1), "p1").unwrap();
        join(&m, GROUP, 2).unwrap();

        assert_eq!(
            m.create_game(GROUP, UserId(3), "p3"),
            Err(GameError::ChannelAlreadyHasGame)
        );
        let view = m.view(GROUP).unwrap();
        assert_eq!(view.master, "p1");
        assert_eq!(view.scores.len(), 2);
        assert_eq!(m.find_game_for_player(UserId(3)), None);
    }

    #[test]
    fn players_are_in_at_most_one_game() {
        let m = manager();
        m.create_game(GROUP, UserId(1), "p1").unwrap();
        assert_eq!(
            m.create_game(OTHER_GROUP, UserId(1), "p1"),
            Err(GameError::PlayerAlreadyInGame)
        );
        m.create_game(OTHER_GROUP, UserId(2), "p2").unwrap();
        assert_eq!(join(&m, GROUP, 2), Err(GameError::PlayerAlreadyInGame));
        assert_eq!(join(&m, GROUP, 1), Err(GameError::AlreadyInGame));
        assert_eq!(m.find_game_for_player(UserId(2)), Some(OTHER_GROUP));
    }

    #[test]
    fn failed_join_leaves_no_index_entry() {
        let m = manager();
        assert_eq!(join(&m, GROUP, 5), Err(GameError::NotFound));
        assert_eq!(m.find_game_for_player(UserId(5)), None);
    }

    #[test]
    fn remove_game_clears_players_and_is_idempotent() {
        let m = manager();
        m.create_game(GROUP, UserId(1), "p1").unwrap();
        join(&m, GROUP, 2).unwrap();
        m.remove_game(GROUP);
        m.remove_game(GROUP);
        assert_eq!(m.game_count(), 0);
        assert_eq!(m.find_game_for_player(UserId(1)), None);
        assert_eq!(m.find_game_for_player(UserId(2)), None);
        m.create_game(OTHER_GROUP, UserId(2), "p2").unwrap();
    }

    #[test]
    fn leave_and_kick_keep_the_index_in_step() {
        let m = manager();
        m.create_game(GROUP, UserId(1), "p1").unwrap();
        for id in 2..=4 {
            join(&m, GROUP, id).unwrap();
        }

        m.route_message(GROUP, Command::Leave { user: UserId(2) })
            .unwrap();
        assert_eq!(m.find_game_for_player(UserId(2)), None);

        assert_eq!(
            m.route_message(
                GROUP,
                Command::Kick {
                    requester: UserId(3),
                    target: UserId(4)
                }
            ),
            Err(GameError::NotGameMaster)
        );
        assert_eq!(m.find_game_for_player(UserId(4)), Some(GROUP));

        m.route_message(
            GROUP,
            Command::Kick {
                requester: UserId(1),
                target: UserId(4),
            },
        )
        .unwrap();
        assert_eq!(m.find_game_for_player(UserId(4)), None);
        assert_eq!(m.find_game_for_player(UserId(3)), Some(GROUP));
    }

    #[test]
    fn only_the_master_starts() {
        let m = manager();
        m.create_game(GROUP, UserId(1), "p1").unwrap();
        join(&m, GROUP, 2).unwrap();
        join(&m, GROUP, 3).unwrap();
        assert_eq!(
            m.route_message(GROUP, Command::Start { user: UserId(2) }),
            Err(GameError::NotGameMaster)
        );
        m.route_message(GROUP, Command::Start { user: UserId(1) })
            .unwrap();
        assert_eq!(m.view(GROUP).unwrap().phase, GamePhase::Submitting);
    }

    #[test]
    fn dissolved_and_stopped_games_are_removed() {
        let m = manager();
        m.create_game(GROUP, UserId(1), "p1").unwrap();
        for id in 2..=3 {
            join(&m, GROUP, id).unwrap();
        }
        m.route_message(GROUP, Command::Start { user: UserId(1) })
            .unwrap();
        assert_eq!(
            m.route_message(GROUP, Command::Leave { user: UserId(3) }),
            Err(GameError::NotEnoughPlayers)
        );
        assert!(m.view(GROUP).is_none());
        assert_eq!(m.find_game_for_player(UserId(1)), None);

        m.create_game(GROUP, UserId(1), "p1").unwrap();
        let stopped = m
            .route_message(GROUP, Command::Stop { user: UserId(1) })
            .unwrap();
        assert_eq!(stopped.messages, vec![crate::game::outbound::Outbound::GameStopped]);
        assert_eq!(m.game_count(), 0);
    }

    #[test]
    fn stray_reactions_are_dropped() {
        let m = manager();
        let stray = Reaction::Submit {
            user: UserId(8),
            card_index: 0,
        };
        assert_eq!(m.route_reaction(stray), Ok(None));
    }

    #[test]
    fn commands_from_a_private_chat_find_the_players_game() {
        let m = manager();
        m.create_game(GROUP, UserId(1), "p1").unwrap();
        join(&m, GROUP, 2).unwrap();
        let private = ChatId(2);
        let delivery = m
            .route_message(private, Command::Leave { user: UserId(2) })
            .unwrap();
        assert_eq!(delivery.channel, GROUP);
        assert!(m.deal_hand(UserId(2)).is_none());
        assert_eq!(m.deal_hand(UserId(1)).unwrap().channel, GROUP);
    }
}
