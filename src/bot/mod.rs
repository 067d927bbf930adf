//! Bot layer - Discord-specific interface and command handlers
//!
//! Commands translate chat input into core calls on behalf of the user linked to the
//! invoking Discord account. Error replies go through [`Error::user_message`], so
//! internal failures never leak details into the chat.

/// Discord command implementations (trips, bookings, account, general)
pub mod commands;
/// Discord interaction handlers (autocomplete, etc.)
pub mod handlers;

use crate::{
    core::{access::Actor, user},
    errors::{Error, Result},
    services::Services,
};
use poise::serenity_prelude as serenity;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
pub struct BotData {
    /// Database, settings and collaborators for core operations
    pub services: Services,
}

impl BotData {
    /// Creates a new `BotData` instance around the wired services.
    #[must_use]
    pub const fn new(services: Services) -> Self {
        Self { services }
    }
}

/// Poise context with this bot's data and error type.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Resolves the invoking Discord account to a registered user.
pub async fn current_actor(ctx: Context<'_>) -> Result<Actor> {
    let chat_id = ctx.author().id.to_string();
    user::find_user_by_chat(&ctx.data().services.db, &chat_id)
        .await?
        .map(|u| Actor::from(&u))
        .ok_or_else(|| {
            Error::validation(
                "account",
                "this Discord account is not registered yet, use /register first",
            )
        })
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            if error.is_internal() {
                error!("Error in command `{}`: {:?}", ctx.command().name, error);
            } else {
                info!("Command `{}` rejected: {}", ctx.command().name, error);
            }
            if let Err(e) = ctx.say(format!("❌ {}", error.user_message())).await {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Registers the commands and runs the Discord client until it stops.
#[instrument(skip(token, services))]
pub async fn run_bot(token: &str, services: Services) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::register(),
                commands::trips(),
                commands::seats(),
                commands::book(),
                commands::bookings(),
                commands::cancel(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Commands registered globally");
                Ok(BotData::new(services))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::Client::builder(token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
