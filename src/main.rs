use poise::serenity_prelude as serenity;
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tripbook::{
    bot,
    config::{database, settings},
    core::trip,
    errors::{Error, Result},
    services::{DiscordNotifier, Services},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenvy::dotenv().ok();

    // 3. Application settings
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Database and schema
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Discord token, read directly before use
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    // 6. Collaborators; booking confirmations go out as direct messages
    let notifier = Arc::new(DiscordNotifier::new(Arc::new(serenity::Http::new(&token))));
    let services = Services::standalone(db, app_config, notifier);

    // 7. Transitions lost with the previous process
    let rescheduled = trip::reschedule_pending_transitions(&services).await?;
    info!(rescheduled, "Trip transitions restored");

    // 8. Run the bot
    bot::run_bot(&token, services).await
}
