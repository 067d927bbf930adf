//! General Discord commands - ping and help.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Tripbook Help**\n\
        Book intercity seats straight from Discord.\n\n\
        **Getting started**\n\
        • `/register <phone> <first name> <last name>` - Creates your account and links this Discord account.\n\n\
        **Trips**\n\
        • `/trips [from] [to]` - Lists upcoming trips open for booking.\n\
        • `/seats <trip>` - Shows the seat map and prices of a trip.\n\n\
        **Bookings**\n\
        • `/book <trip> <seats> <pickup> <dropoff>` - Books seats, e.g. seats `1, 2`, pickup `ул. Светланская, 10`.\n\
        • `/bookings` - Lists your bookings.\n\
        • `/cancel <booking>` - Cancels a booking and frees its seats.\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
