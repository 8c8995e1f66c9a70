use std::{sync::Arc, thread};

use cards_against_chat::{
    card::{CardCatalog, CardPack, PromptEntry},
    config::GameConfig,
    error::GameError,
    game::{game_phase::GamePhase, outbound::Outbound, outbound::TrackedMessage},
    game_manager::{local_game_manager::LocalGameManager, Command, Delivery, GameManager, Reaction},
};
use teloxide::types::{ChatId, MessageId, UserId};

const GROUP: ChatId = ChatId(-1001);

fn catalog(prompts: usize, responses: usize) -> Arc<CardCatalog> {
    Arc::new(CardCatalog::from_pack(CardPack {
        name: "test".to_string(),
        prompts: (0..prompts)
            .map(|i| PromptEntry {
                text: format!("prompt {i} ___"),
                pick: 1,
            })
            .collect(),
        responses: (0..responses).map(|i| format!("response {i}")).collect(),
    }))
}

fn manager(prompts: usize, config: GameConfig) -> LocalGameManager {
    LocalGameManager::with_seed(catalog(prompts, 300), config, 7)
}

fn name(id: u64) -> String {
    format!("p{id}")
}

/// First id creates the game, the rest join in order.
fn seat(m: &LocalGameManager, channel: ChatId, ids: &[u64]) {
    m.create_game(channel, UserId(ids[0]), &name(ids[0])).unwrap();
    for id in &ids[1..] {
        m.route_message(
            channel,
            Command::Join {
                user: UserId(*id),
                name: name(*id),
            },
        )
        .unwrap();
    }
}

fn hand(m: &LocalGameManager, id: u64) -> Vec<String> {
    match m.deal_hand(UserId(id)).unwrap().messages.as_slice() {
        [Outbound::DealHand { cards, .. }] => cards.clone(),
        other => panic!("expected a hand, got {other:?}"),
    }
}

fn judge(m: &LocalGameManager, channel: ChatId) -> u64 {
    let judge = m.view(channel).unwrap().judge.unwrap();
    judge[1..].parse().unwrap()
}

/// Everyone but the judge plays their first card, then the judge picks choice 0.
fn play_round(
    m: &LocalGameManager,
    channel: ChatId,
    ids: &[u64],
) -> Result<Option<Delivery>, GameError> {
    let judge = judge(m, channel);
    for id in ids.iter().filter(|id| **id != judge) {
        m.route_reaction(Reaction::Submit {
            user: UserId(*id),
            card_index: 0,
        })
        .unwrap();
    }
    let round = m.view(channel).unwrap().round;
    let message_id = MessageId(round as i32);
    m.record_message(channel, round, TrackedMessage::Submissions, message_id);
    m.route_reaction(Reaction::JudgeChoice {
        user: UserId(judge),
        message_id,
        choice: 0,
    })
}

#[test]
fn first_round_is_judged_and_rotates() {
    let m = manager(10, GameConfig::default());
    seat(&m, GROUP, &[1, 2, 3]);

    let started = m
        .route_message(GROUP, Command::Start { user: UserId(1) })
        .unwrap();
    assert!(started
        .messages
        .iter()
        .any(|o| matches!(o, Outbound::PostNewPrompt { round: 1, .. })));
    assert_eq!(judge(&m, GROUP), 2);

    let winning = hand(&m, 3)[0].clone();
    m.route_reaction(Reaction::Submit {
        user: UserId(1),
        card_index: 0,
    })
    .unwrap();
    assert_eq!(
        m.route_reaction(Reaction::Submit {
            user: UserId(1),
            card_index: 0
        }),
        Err(GameError::InvalidSubmission)
    );
    let closed = m
        .route_reaction(Reaction::Submit {
            user: UserId(3),
            card_index: 0,
        })
        .unwrap()
        .unwrap();
    assert!(closed
        .messages
        .iter()
        .any(|o| matches!(o, Outbound::PostSubmissions { .. })));

    let view = m.view(GROUP).unwrap();
    assert_eq!(view.phase, GamePhase::Judging);
    assert_eq!(view.choices.len(), 2);
    let choice = view
        .choices
        .iter()
        .position(|cards| cards == &vec![winning.clone()])
        .unwrap();

    m.record_message(GROUP, view.round, TrackedMessage::Submissions, MessageId(40));
    let scored = m
        .route_reaction(Reaction::JudgeChoice {
            user: UserId(2),
            message_id: MessageId(40),
            choice,
        })
        .unwrap()
        .unwrap();
    assert!(scored.messages.iter().any(|o| matches!(
        o,
        Outbound::AnnounceRoundWinner { player_name, score: 1, cards, .. }
            if player_name == "p3" && cards == &vec![winning.clone()]
    )));

    let view = m.view(GROUP).unwrap();
    assert_eq!(view.phase, GamePhase::Submitting);
    assert_eq!(view.round, 2);
    assert_eq!(view.judge.as_deref(), Some("p3"));
    assert!(view.scores.contains(&("p3".to_string(), 1)));
}

#[test]
fn judge_reactions_on_other_messages_are_ignored() {
    let m = manager(10, GameConfig::default());
    seat(&m, GROUP, &[1, 2, 3]);
    m.route_message(GROUP, Command::Start { user: UserId(1) })
        .unwrap();
    for id in [1, 3] {
        m.route_reaction(Reaction::Submit {
            user: UserId(id),
            card_index: 0,
        })
        .unwrap();
    }
    m.record_message(GROUP, 1, TrackedMessage::Submissions, MessageId(5));

    let stray = m
        .route_reaction(Reaction::JudgeChoice {
            user: UserId(2),
            message_id: MessageId(6),
            choice: 0,
        })
        .unwrap()
        .unwrap();
    assert!(stray.messages.is_empty());
    let impostor = m
        .route_reaction(Reaction::JudgeChoice {
            user: UserId(1),
            message_id: MessageId(5),
            choice: 0,
        })
        .unwrap()
        .unwrap();
    assert!(impostor.messages.is_empty());
    assert_eq!(m.view(GROUP).unwrap().phase, GamePhase::Judging);
}

#[test]
fn running_out_of_prompts_ends_the_game() {
    let config = GameConfig {
        win_score: 100,
        ..GameConfig::default()
    };
    let m = manager(2, config);
    let ids = [1, 2, 3];
    seat(&m, GROUP, &ids);
    m.route_message(GROUP, Command::Start { user: UserId(1) })
        .unwrap();

    assert!(play_round(&m, GROUP, &ids).is_ok());
    assert_eq!(m.view(GROUP).unwrap().round, 2);
    assert_eq!(play_round(&m, GROUP, &ids), Err(GameError::DeckExhausted));

    assert!(m.view(GROUP).is_none());
    assert_eq!(m.find_game_for_player(UserId(1)), None);
    m.create_game(GROUP, UserId(1), "p1").unwrap();
}

#[test]
fn reaching_the_winning_score_finishes_and_removes_the_game() {
    let config = GameConfig {
        win_score: 2,
        ..GameConfig::default()
    };
    let m = manager(20, config);
    let ids = [1, 2, 3];
    seat(&m, GROUP, &ids);
    m.route_message(GROUP, Command::Start { user: UserId(1) })
        .unwrap();

    let mut winner = None;
    for _ in 0..10 {
        let delivery = play_round(&m, GROUP, &ids).unwrap().unwrap();
        winner = delivery.messages.into_iter().find_map(|o| match o {
            Outbound::AnnounceGameWinner { player_name, score } => Some((player_name, score)),
            _ => None,
        });
        if winner.is_some() {
            break;
        }
    }

    let (_, score) = winner.unwrap();
    assert_eq!(score, 2);
    assert!(m.view(GROUP).is_none());
    for id in ids {
        assert_eq!(m.find_game_for_player(UserId(id)), None);
    }
}

#[test]
fn departing_master_hands_over_and_last_player_dissolves() {
    let m = manager(10, GameConfig::default());
    seat(&m, GROUP, &[1, 2]);

    let left = m
        .route_message(GROUP, Command::Leave { user: UserId(1) })
        .unwrap();
    assert!(left.messages.contains(&Outbound::NewGameMaster {
        player_name: "p2".to_string()
    }));
    assert_eq!(m.view(GROUP).unwrap().master, "p2");

    assert_eq!(
        m.route_message(GROUP, Command::Leave { user: UserId(2) }),
        Err(GameError::NotEnoughPlayers)
    );
    assert!(m.view(GROUP).is_none());
    assert_eq!(m.find_game_for_player(UserId(2)), None);
}

#[test]
fn timed_out_players_sit_out_until_they_are_back() {
    let m = manager(10, GameConfig::default());
    let ids = [1, 2, 3, 4];
    seat(&m, GROUP, &ids);
    m.route_message(GROUP, Command::Start { user: UserId(1) })
        .unwrap();
    assert_eq!(judge(&m, GROUP), 2);
    for id in [1, 3] {
        m.route_reaction(Reaction::Submit {
            user: UserId(id),
            card_index: 0,
        })
        .unwrap();
    }

    let stale = m.submission_timeout(GROUP, 7).unwrap();
    assert!(stale.messages.is_empty());
    assert_eq!(m.view(GROUP).unwrap().phase, GamePhase::Submitting);

    let closed = m.submission_timeout(GROUP, 1).unwrap();
    assert!(closed
        .messages
        .iter()
        .any(|o| matches!(o, Outbound::PostSubmissions { choices, .. } if choices.len() == 2)));
    assert_eq!(m.view(GROUP).unwrap().phase, GamePhase::Judging);

    m.route_message(GROUP, Command::Resume { user: UserId(4) })
        .unwrap();
    m.record_message(GROUP, 1, TrackedMessage::Submissions, MessageId(9));
    let next = m
        .route_reaction(Reaction::JudgeChoice {
            user: UserId(2),
            message_id: MessageId(9),
            choice: 0,
        })
        .unwrap()
        .unwrap();
    assert!(next
        .messages
        .iter()
        .any(|o| matches!(o, Outbound::DealHand { player, .. } if *player == UserId(4))));
}

#[test]
fn concurrent_submissions_are_each_accepted_once() {
    let m = Arc::new(manager(10, GameConfig::default()));
    let ids = (1..=8).collect::<Vec<u64>>();
    seat(&m, GROUP, &ids);
    m.route_message(GROUP, Command::Start { user: UserId(1) })
        .unwrap();
    let judge = judge(&m, GROUP);

    let workers = ids
        .iter()
        .copied()
        .filter(|id| *id != judge)
        .map(|id| {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                m.route_reaction(Reaction::Submit {
                    user: UserId(id),
                    card_index: 0,
                })
            })
        })
        .collect::<Vec<_>>();
    for worker in workers {
        assert!(matches!(worker.join().unwrap(), Ok(Some(_))));
    }

    let view = m.view(GROUP).unwrap();
    assert_eq!(view.phase, GamePhase::Judging);
    assert_eq!(view.choices.len(), 7);
    assert!(view.choices.iter().all(|cards| cards.len() == 1));
}

#[test]
fn racing_joins_put_a_player_in_one_game_only() {
    let m = Arc::new(manager(10, GameConfig::default()));
    let channels = (0..8).map(|i| ChatId(-2000 - i)).collect::<Vec<_>>();
    for (i, channel) in channels.iter().enumerate() {
        m.create_game(*channel, UserId(100 + i as u64), "host").unwrap();
    }

    let workers = channels
        .iter()
        .copied()
        .map(|channel| {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                m.route_message(
                    channel,
                    Command::Join {
                        user: UserId(7),
                        name: "p7".to_string(),
                    },
                )
            })
        })
        .collect::<Vec<_>>();
    let results = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .collect::<Vec<_>>();

    let joined = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .collect::<Vec<_>>();
    assert_eq!(joined.len(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| *r == Err(GameError::PlayerAlreadyInGame)));
    assert_eq!(m.find_game_for_player(UserId(7)), Some(joined[0].channel));

    let members = channels
        .iter()
        .filter(|c| {
            m.view(**c)
                .unwrap()
                .scores
                .iter()
                .any(|(name, _)| name == "p7")
        })
        .count();
    assert_eq!(members, 1);
}

#[test]
fn joining_after_the_responses_ran_out_ends_the_game() {
    let m = LocalGameManager::with_seed(catalog(10, 12), GameConfig::default(), 7);
    m.create_game(GROUP, UserId(1), "p1").unwrap();
    assert_eq!(hand(&m, 1).len(), 10);
    m.route_message(
        GROUP,
        Command::Join {
            user: UserId(2),
            name: name(2),
        },
    )
    .unwrap();
    assert_eq!(hand(&m, 2).len(), 2);

    assert_eq!(
        m.route_message(
            GROUP,
            Command::Join {
                user: UserId(3),
                name: name(3),
            },
        ),
        Err(GameError::DeckExhausted)
    );
    assert!(m.view(GROUP).is_none());
    for id in 1..=3 {
        assert_eq!(m.find_game_for_player(UserId(id)), None);
    }
}
