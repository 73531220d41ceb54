use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use studygroup_bot::error::{Result, StudyGroupBotError};
use studygroup_bot::scheduler::Scheduler;
use studygroup_bot::services::delivery::restore_pending;
use studygroup_bot::{RosterResolver, StudyGroupBot, TelegramApi};

#[derive(Parser, Debug)]
#[command(name = "studygroup-bot")]
#[command(about = "Study group management bot for Telegram")]
struct Cli {
    #[arg(long, env = "BOT_TOKEN")]
    token: Option<String>,

    #[arg(long, default_value = "./data/studygroup-bot.db")]
    db: String,

    #[arg(long, default_value = "https://api.telegram.org")]
    api_url: String,

    #[arg(long, default_value_t = 30)]
    poll_timeout: u64,

    #[arg(long, default_value_t = 15)]
    delivery_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,studygroup_bot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let Some(token) = cli.token.filter(|token| !token.trim().is_empty()) else {
        eprintln!("BOT_TOKEN environment variable is not set.");
        eprintln!("Set it before starting the bot:");
        eprintln!("  export BOT_TOKEN='your_token_here'");
        eprintln!("Get a token from @BotFather on Telegram.");
        return Err(StudyGroupBotError::Config("missing bot token".to_string()));
    };

    let api = Arc::new(TelegramApi::with_base_url(&token, &cli.api_url)?);
    let bot = StudyGroupBot::new(api.clone(), &cli.db, RosterResolver::seed_from_static()).await?;

    // Polling only; any webhook left over from a previous deployment wins
    // over getUpdates until it is removed.
    if let Err(err) = api.delete_webhook().await {
        tracing::warn!(error = %err, "could not clear webhook");
    }

    let orphaned = restore_pending(bot.schedules()).await?;
    if orphaned > 0 {
        tracing::warn!(
            count = orphaned,
            "pending scheduled messages found but not restored (add chat_id to the schedules table to close this gap)"
        );
    }

    let mut scheduler = Scheduler::new();
    scheduler.register_job(Arc::new(
        bot.delivery_job(Duration::from_secs(cli.delivery_interval)),
    ));
    scheduler.start();

    tracing::info!(db = %cli.db, "bot is running (long polling)");

    let mut offset: Option<i64> = None;
    loop {
        match api.get_updates(offset, cli.poll_timeout).await {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    bot.handle_update(update).await;
                }
            }
            Err(StudyGroupBotError::Conflict(description)) => {
                tracing::error!("another instance of this bot is already polling: {description}");
                tracing::error!(
                    "stop the other deployment (or local run), wait a minute, then start again"
                );
                scheduler.stop().await;
                return Err(StudyGroupBotError::Conflict(description));
            }
            Err(err) => {
                tracing::warn!(error = %err, "polling failed, retrying");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
