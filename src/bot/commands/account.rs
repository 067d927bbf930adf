//! Account commands - registering and linking the Discord account.

mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        core::user,
        entities::Role,
        errors::{Error, Result},
    };
    use tracing::info;

    /// Creates a customer account for this Discord account.
    #[poise::command(slash_command, prefix_command)]
    pub async fn register(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Phone number, e.g. +79001234567"] phone: String,
        #[description = "First name"] first_name: String,
        #[description = "Last name"] last_name: String,
    ) -> Result<()> {
        let db = &ctx.data().services.db;
        let chat_id = ctx.author().id.to_string();

        if let Some(existing) = user::find_user_by_chat(db, &chat_id).await? {
            ctx.say(format!(
                "ℹ️ This account is already registered as {} {}.",
                existing.first_name, existing.last_name
            ))
            .await?;
            return Ok(());
        }

        let created = user::create_user(db, &phone, &first_name, &last_name, Role::Customer).await?;
        let linked = user::link_chat(db, created.id, &chat_id).await?;
        info!(user_id = linked.id, "Discord account registered");

        ctx.say(format!(
            "✅ Welcome, {}! Use `/trips` to find a trip.",
            linked.first_name
        ))
        .await?;
        Ok(())
    }
}

pub use inner::*;
