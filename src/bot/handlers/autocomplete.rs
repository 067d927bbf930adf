//! Autocomplete handlers for Discord slash command parameters.

use crate::{bot::BotData, core::city, errors::Error};

/// Suggests city names containing the partial input, up to Discord's limit of 25.
pub async fn autocomplete_city_name(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let Ok(cities) = city::list_cities(&ctx.data().services).await else {
        return Vec::new();
    };

    let partial_lower = partial.to_lowercase();
    cities
        .into_iter()
        .filter(|c| c.name.to_lowercase().contains(&partial_lower))
        .map(|c| c.name)
        .take(25)
        .collect()
}
