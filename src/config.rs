use derive_more::Display;
use std::{path::PathBuf, time::Duration};

/// Tunables of a single game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameConfig {
    pub hand_size: usize,
    pub max_players: usize,
    pub win_score: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            hand_size: 10,
            max_players: 20,
            win_score: 7,
        }
    }
}

/// Process-wide settings, read once at startup.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub game: GameConfig,
    pub card_pack: Option<PathBuf>,
    pub submission_timeout: Option<Duration>,
}

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "{} must be a positive integer, got {:?}", key, value)]
    InvalidNumber { key: &'static str, value: String },
}

impl std::error::Error for ConfigError {}

impl Settings {
    pub fn from_env() -> Result<Settings, ConfigError> {
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GameConfig::default();
        let number = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            match lookup(key) {
                None => Ok(None),
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Ok(Some(n)),
                    _ => Err(ConfigError::InvalidNumber { key, value }),
                },
            }
        };

        let game = GameConfig {
            hand_size: number("CAH_HAND_SIZE")?.map_or(defaults.hand_size, |n| n as usize),
            max_players: number("CAH_MAX_PLAYERS")?.map_or(defaults.max_players, |n| n as usize),
            win_score: number("CAH_WIN_SCORE")?.map_or(defaults.win_score, |n| n as u32),
        };

        Ok(Settings {
            game,
            card_pack: lookup("CAH_CARD_PACK").map(PathBuf::from),
            submission_timeout: number("CAH_SUBMISSION_TIMEOUT_SECS")?.map(Duration::from_secs),
        })
    }
}
