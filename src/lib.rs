pub mod card;
pub mod config;
pub mod error;
pub mod game;
pub mod game_manager;
pub mod handlers;
