//! Trip Discord commands - `trips` and `seats`.

mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete},
        core::{city, pricing, trip, trip_seat},
        errors::{Error, Result},
    };
    use std::{collections::HashMap, fmt::Write};

    /// Lists upcoming trips that are open for booking.
    #[poise::command(slash_command, prefix_command)]
    pub async fn trips(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Departure city"]
        #[autocomplete = "autocomplete::autocomplete_city_name"]
        from: Option<String>,
        #[description = "Arrival city"]
        #[autocomplete = "autocomplete::autocomplete_city_name"]
        to: Option<String>,
    ) -> Result<()> {
        let services = &ctx.data().services;

        let mut city_filter = [None, None];
        for (slot, name) in city_filter.iter_mut().zip([&from, &to]) {
            if let Some(name) = name {
                let found = city::find_city_by_name(services, name)
                    .await?
                    .ok_or_else(|| Error::CityNotFound { city: name.clone() })?;
                *slot = Some(found.id);
            }
        }

        let trips = trip::list_upcoming_trips(&services.db, city_filter[0], city_filter[1]).await?;
        if trips.is_empty() {
            ctx.say("No upcoming trips match your search.").await?;
            return Ok(());
        }

        let names: HashMap<i64, String> = city::list_cities(services)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let unknown = "?".to_string();

        let mut reply = String::from("**Upcoming trips**\n");
        for t in trips.iter().take(20) {
            let free = trip_seat::available_seat_count(&services.db, t.id).await?;
            let from_price = [t.front_seat_price, t.middle_seat_price, t.back_seat_price]
                .into_iter()
                .min()
                .unwrap_or_default();
            let _ = writeln!(
                reply,
                "• #{} {} → {}, {} (arrives {}), {} seats free, from {}",
                t.id,
                names.get(&t.origin_city_id).unwrap_or(&unknown),
                names.get(&t.destination_city_id).unwrap_or(&unknown),
                t.departure_time.format("%d.%m.%Y %H:%M"),
                t.arrival_time.format("%H:%M"),
                free,
                from_price.normalize()
            );
        }
        ctx.say(reply).await?;
        Ok(())
    }

    /// Shows the seat map of a trip with the price of each seat.
    #[poise::command(slash_command, prefix_command)]
    pub async fn seats(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Trip number from /trips"] trip_id: i64,
    ) -> Result<()> {
        let db = &ctx.data().services.db;
        let t = trip::get_trip(db, trip_id).await?;
        let map = trip_seat::seat_map(db, t.id).await?;

        let mut reply = format!("**Seats of trip #{}**\n", t.id);
        for entry in &map {
            let status = if entry.is_booked { "❌ taken" } else { "✅ free" };
            let _ = writeln!(
                reply,
                "• {} ({}) {} {}",
                entry.seat_number,
                entry.seat_zone.as_str(),
                pricing::seat_price(&t, entry.seat_zone).normalize(),
                status
            );
        }
        if !t.is_bookable {
            reply.push_str("\nBooking for this trip is closed.");
        }
        ctx.say(reply).await?;
        Ok(())
    }
}

pub use inner::*;
