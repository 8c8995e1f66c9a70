use std::{error::Error, sync::Arc};

use cards_against_chat::{
    card::{CardCatalog, CardKind},
    config::Settings,
    game_manager::local_game_manager::LocalGameManager,
    handlers::{
        self,
        timeout::{run_timeouts, TimeoutScheduler},
    },
};
use teloxide::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting Cards Against Chat Bot");

    let settings = Settings::from_env()?;
    let catalog = match &settings.card_pack {
        Some(path) => CardCatalog::load(path).map_err(|e| e as Box<dyn Error>)?,
        None => CardCatalog::builtin()?,
    };
    log::info!(
        "Using card pack {} ({} prompts, {} responses)",
        catalog.name(),
        catalog.count(CardKind::Prompt),
        catalog.count(CardKind::Response)
    );
    if let Some(window) = settings.submission_timeout {
        log::info!("Submissions close after {}s", window.as_secs());
    }

    let bot_state =
        handlers::new_async_bot_state(LocalGameManager::new(Arc::new(catalog), settings.game));
    let (scheduler, expired) = TimeoutScheduler::new(settings.submission_timeout);

    let bot = Bot::from_env();
    tokio::spawn(run_timeouts(
        bot.clone(),
        bot_state.clone(),
        scheduler.clone(),
        expired,
    ));

    Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![bot_state, scheduler])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
