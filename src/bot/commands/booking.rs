//! Booking Discord commands - `book`, `bookings` and `cancel`.

use crate::errors::{Error, Result};

/// Parses a seat list such as `"1, 2 5"`.
pub fn parse_seat_list(raw: &str) -> Result<Vec<i32>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i32>().map_err(|_| {
                Error::validation("seat_numbers", format!("'{part}' is not a seat number"))
            })
        })
        .collect()
}

mod inner {
    #![allow(missing_docs)]

    use super::parse_seat_list;
    use crate::{
        bot::{BotData, current_actor},
        core::booking::{self, NewBooking},
        errors::{Error, Result},
    };

    /// Books seats on a trip.
    #[poise::command(slash_command, prefix_command)]
    pub async fn book(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Trip number from /trips"] trip_id: i64,
        #[description = "Seat numbers, e.g. 1, 2"] seats: String,
        #[description = "Pickup address in the departure city"] pickup: String,
        #[description = "Dropoff address in the arrival city"] dropoff: String,
    ) -> Result<()> {
        let actor = current_actor(ctx).await?;
        let services = &ctx.data().services;

        let created = booking::create_booking(
            services,
            &actor,
            NewBooking {
                trip_id,
                seat_numbers: parse_seat_list(&seats)?,
                pickup_location: pickup,
                dropoff_location: dropoff,
                payment_id: None,
            },
        )
        .await?;
        let details = booking::booking_details(&services.db, &created).await?;

        ctx.say(format!("✅ Booked!\n{}", details.render())).await?;
        Ok(())
    }

    /// Lists your bookings.
    #[poise::command(slash_command, prefix_command)]
    pub async fn bookings(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let actor = current_actor(ctx).await?;
        let details = booking::detailed_bookings(&ctx.data().services, actor.user_id).await?;

        if details.is_empty() {
            ctx.say("You have no bookings yet.").await?;
            return Ok(());
        }
        let reply = details
            .iter()
            .take(10)
            .map(booking::BookingDetails::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        ctx.say(reply).await?;
        Ok(())
    }

    /// Cancels one of your bookings.
    #[poise::command(slash_command, prefix_command)]
    pub async fn cancel(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Booking number from /bookings"] booking_id: i64,
    ) -> Result<()> {
        let actor = current_actor(ctx).await?;
        booking::cancel_booking(&ctx.data().services, &actor, booking_id).await?;
        ctx.say(format!("✅ Booking #{booking_id} cancelled, seats released."))
            .await?;
        Ok(())
    }
}

pub use inner::*;
