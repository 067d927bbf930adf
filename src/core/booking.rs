//! Booking consistency engine - atomic seat claims, price reconciliation and release.
//!
//! A trip seat becomes booked only inside a successful [`create_booking`], and a claim
//! is all-or-nothing: the transaction takes the database write lock with its first
//! statement, then reads the free seats and flips them with a conditional update
//! (`is_booked = false` guard). Concurrent claims queue on the write lock, so a loser
//! sees the winner's seats as booked and fails with [`Error::SeatsUnavailable`].
//! Whatever fails after the claim (address, payment, price) rolls the claim back.

use crate::{
    core::{
        access::{self, Actor, Operation},
        city, payment, pricing, trip as trip_core,
    },
    entities::{
        Booking, BookingSeat, Seat, Trip, TripSeat, User, booking, booking_seat,
        payment as payment_entity, seat, trip, trip_seat,
    },
    errors::{Error, Result},
    services::{
        Services,
        cache::{self, detailed_bookings_key},
        notify,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Input of [`create_booking`].
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// Trip to book
    pub trip_id: i64,
    /// Seat numbers in the trip's vehicle
    pub seat_numbers: Vec<i32>,
    /// Pickup address in the origin city, as typed
    pub pickup_location: String,
    /// Dropoff address in the destination city, as typed
    pub dropoff_location: String,
    /// Payment to attach; its amount must equal the booking price
    pub payment_id: Option<i64>,
}

/// A booking with everything needed to show it to its owner.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub booking_id: i64,
    pub trip_id: i64,
    pub departure_time: DateTime<Utc>,
    pub origin: String,
    pub destination: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub seat_numbers: Vec<i32>,
    pub total_price: Decimal,
    pub is_active: bool,
    pub payment_id: Option<i64>,
}

impl BookingDetails {
    /// Chat-friendly summary.
    #[must_use]
    pub fn render(&self) -> String {
        let seats = if self.seat_numbers.is_empty() {
            "not assigned".to_string()
        } else {
            self.seat_numbers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let status = if self.is_active {
            "✅ Active"
        } else {
            "❌ Cancelled"
        };
        format!(
            "🚖 Booking #{}\n\
             📅 Date: {}\n\
             📍 From: {}, {}\n\
             🏁 To: {}, {}\n\
             💵 Price: {}\n\
             💺 Seats: {}\n\
             🔹 Status: {}",
            self.booking_id,
            self.departure_time.format("%d.%m.%Y %H:%M"),
            self.origin,
            self.pickup_location,
            self.destination,
            self.dropoff_location,
            self.total_price.normalize(),
            seats,
            status
        )
    }
}

/// Seat numbers must be non-empty, unique and positive.
pub fn validate_seat_numbers(seat_numbers: &[i32]) -> Result<()> {
    if seat_numbers.is_empty() {
        return Err(Error::validation("seat_numbers", "select at least one seat"));
    }
    if let Some(bad) = seat_numbers.iter().find(|n| **n < 1) {
        return Err(Error::validation(
            "seat_numbers",
            format!("seat number {bad} is not valid"),
        ));
    }
    let unique: HashSet<i32> = seat_numbers.iter().copied().collect();
    if unique.len() != seat_numbers.len() {
        return Err(Error::validation("seat_numbers", "seats are listed twice"));
    }
    Ok(())
}

/// Takes the write lock for a booking transaction with a no-op update of the trip row.
///
/// `SQLite` upgrades a deferred transaction that has already read without waiting, so
/// the lock must come first; a write as the first statement waits out the busy timeout.
async fn lock_trip<C>(db: &C, trip_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    Trip::update_many()
        .col_expr(trip::Column::IsBookable, Expr::col(trip::Column::IsBookable).into())
        .filter(trip::Column::Id.eq(trip_id))
        .exec(db)
        .await?;
    Ok(())
}

/// [`lock_trip`] for transactions that start from a booking.
async fn lock_booking<C>(db: &C, booking_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    Booking::update_many()
        .col_expr(booking::Column::IsActive, Expr::col(booking::Column::IsActive).into())
        .filter(booking::Column::Id.eq(booking_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Claims the requested seats of `trip`, all or none.
///
/// Must run inside a transaction that holds the write lock (see [`lock_trip`]).
async fn claim_seats<C>(
    db: &C,
    trip: &trip::Model,
    seat_numbers: &[i32],
) -> Result<Vec<(trip_seat::Model, seat::Model)>>
where
    C: ConnectionTrait,
{
    let mut claimable: Vec<(trip_seat::Model, seat::Model)> = TripSeat::find()
        .find_also_related(Seat)
        .filter(trip_seat::Column::TripId.eq(trip.id))
        .filter(trip_seat::Column::IsBooked.eq(false))
        .filter(seat::Column::VehicleId.eq(trip.vehicle_id))
        .filter(seat::Column::SeatNumber.is_in(seat_numbers.iter().copied()))
        .lock_exclusive()
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(trip_seat, seat)| seat.map(|seat| (trip_seat, seat)))
        .collect();

    if claimable.len() != seat_numbers.len() {
        let found: HashSet<i32> = claimable.iter().map(|(_, s)| s.seat_number).collect();
        let mut missing: Vec<i32> = seat_numbers
            .iter()
            .copied()
            .filter(|n| !found.contains(n))
            .collect();
        missing.sort_unstable();
        return Err(Error::SeatsUnavailable {
            seat_numbers: missing,
        });
    }

    let ids: Vec<i64> = claimable.iter().map(|(ts, _)| ts.id).collect();
    let claimed = TripSeat::update_many()
        .col_expr(trip_seat::Column::IsBooked, Expr::value(true))
        .filter(trip_seat::Column::Id.is_in(ids))
        .filter(trip_seat::Column::IsBooked.eq(false))
        .exec(db)
        .await?;
    if claimed.rows_affected != seat_numbers.len() as u64 {
        let mut requested = seat_numbers.to_vec();
        requested.sort_unstable();
        return Err(Error::SeatsUnavailable {
            seat_numbers: requested,
        });
    }

    // A released seat or a rezoned one may carry a stale cost; the sold price is frozen here.
    for (sold, seat) in &mut claimable {
        let price = trip.zone_price(seat.seat_zone);
        if sold.cost != price {
            TripSeat::update_many()
                .col_expr(trip_seat::Column::Cost, Expr::value(price))
                .filter(trip_seat::Column::Id.eq(sold.id))
                .exec(db)
                .await?;
            sold.cost = price;
        }
    }

    Ok(claimable)
}

/// Resolves an address within a city, or fails with [`Error::InvalidLocation`].
async fn resolve_location(
    services: &Services,
    field: &'static str,
    raw: &str,
    city: &str,
) -> Result<String> {
    services
        .addresses
        .resolve(raw, city)
        .await?
        .ok_or_else(|| Error::InvalidLocation {
            field,
            address: raw.trim().to_string(),
            city: city.to_string(),
        })
}

/// Loads a payment that may be attached to a new booking by `actor`.
async fn attachable_payment<C>(
    db: &C,
    actor: &Actor,
    payment_id: i64,
) -> Result<payment_entity::Model>
where
    C: ConnectionTrait,
{
    let payment = payment::get_payment(db, payment_id).await?;
    if payment.user_id != actor.user_id {
        return Err(Error::validation(
            "payment",
            "payment belongs to another user",
        ));
    }
    let attached = Booking::find()
        .filter(booking::Column::PaymentId.eq(payment_id))
        .one(db)
        .await?;
    if let Some(other) = attached {
        return Err(Error::validation(
            "payment",
            format!("payment is already attached to booking {}", other.id),
        ));
    }
    Ok(payment)
}

async fn city_name<C>(db: &C, city_id: i64) -> Result<String>
where
    C: ConnectionTrait,
{
    Ok(city::get_city(db, city_id).await?.name)
}

/// Creates a booking for `actor`, claiming the requested seats atomically.
///
/// After commit the owner is notified (best effort) and their cached booking list is
/// dropped.
#[instrument(skip(services, new), fields(trip_id = new.trip_id, seats = ?new.seat_numbers))]
pub async fn create_booking(
    services: &Services,
    actor: &Actor,
    new: NewBooking,
) -> Result<booking::Model> {
    access::authorize(actor, Operation::CreateBooking)?;
    validate_seat_numbers(&new.seat_numbers)?;
    crate::services::address::validate_format("pickup_location", &new.pickup_location)?;
    crate::services::address::validate_format("dropoff_location", &new.dropoff_location)?;

    let db = &services.db;
    let user = User::find_by_id(actor.user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user: actor.user_id.to_string(),
        })?;

    let txn = db.begin().await?;
    lock_trip(&txn, new.trip_id).await?;
    let trip = trip_core::get_trip(&txn, new.trip_id).await?;
    if !trip.is_bookable || !trip.is_active {
        return Err(Error::TripNotBookable { trip_id: trip.id });
    }

    let claimed = claim_seats(&txn, &trip, &new.seat_numbers).await?;

    let origin = city_name(&txn, trip.origin_city_id).await?;
    let destination = city_name(&txn, trip.destination_city_id).await?;
    let pickup =
        resolve_location(services, "pickup_location", &new.pickup_location, &origin).await?;
    let dropoff =
        resolve_location(services, "dropoff_location", &new.dropoff_location, &destination)
            .await?;

    let payment = match new.payment_id {
        Some(payment_id) => Some(attachable_payment(&txn, actor, payment_id).await?),
        None => None,
    };

    let booking = booking::ActiveModel {
        user_id: Set(actor.user_id),
        trip_id: Set(trip.id),
        payment_id: Set(payment.as_ref().map(|p| p.id)),
        pickup_location: Set(pickup),
        dropoff_location: Set(dropoff),
        booking_datetime: Set(Utc::now()),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let links = claimed.iter().map(|(trip_seat, _)| booking_seat::ActiveModel {
        booking_id: Set(booking.id),
        trip_seat_id: Set(trip_seat.id),
    });
    BookingSeat::insert_many(links)
        .exec_without_returning(&txn)
        .await?;

    let total = pricing::total_price(&trip, claimed.iter().map(|(_, seat)| seat.seat_zone));
    if let Some(payment) = &payment {
        if payment.amount != total {
            return Err(Error::PriceMismatch {
                expected: total,
                actual: payment.amount,
            });
        }
    }
    txn.commit().await?;

    info!(booking_id = booking.id, %total, "Booking created");

    if let Some(chat_id) = &user.chat_id {
        let mut seat_numbers: Vec<i32> = claimed.iter().map(|(_, s)| s.seat_number).collect();
        seat_numbers.sort_unstable();
        let details = BookingDetails {
            booking_id: booking.id,
            trip_id: trip.id,
            departure_time: trip.departure_time,
            origin,
            destination,
            pickup_location: booking.pickup_location.clone(),
            dropoff_location: booking.dropoff_location.clone(),
            seat_numbers,
            total_price: total,
            is_active: true,
            payment_id: booking.payment_id,
        };
        notify::notify_best_effort(services.notifier.as_ref(), chat_id, &details.render()).await;
    }
    services
        .cache
        .invalidate(&detailed_bookings_key(booking.user_id))
        .await;

    Ok(booking)
}

/// Frees the trip seats of a booking, except those still held by another active booking.
pub async fn release_booking_seats<C>(db: &C, booking_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let linked: Vec<i64> = BookingSeat::find()
        .select_only()
        .column(booking_seat::Column::TripSeatId)
        .filter(booking_seat::Column::BookingId.eq(booking_id))
        .into_tuple()
        .all(db)
        .await?;
    if linked.is_empty() {
        return Ok(0);
    }

    let still_held: HashSet<i64> = BookingSeat::find()
        .select_only()
        .column(booking_seat::Column::TripSeatId)
        .inner_join(Booking)
        .filter(booking_seat::Column::TripSeatId.is_in(linked.clone()))
        .filter(booking_seat::Column::BookingId.ne(booking_id))
        .filter(booking::Column::IsActive.eq(true))
        .into_tuple::<i64>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let release: Vec<i64> = linked
        .into_iter()
        .filter(|id| !still_held.contains(id))
        .collect();
    if release.is_empty() {
        return Ok(0);
    }

    let result = TripSeat::update_many()
        .col_expr(trip_seat::Column::IsBooked, Expr::value(false))
        .filter(trip_seat::Column::Id.is_in(release))
        .exec(db)
        .await?;
    debug!(booking_id, released = result.rows_affected, "Released trip seats");
    Ok(result.rows_affected)
}

async fn load_booking<C>(db: &C, booking_id: i64) -> Result<booking::Model>
where
    C: ConnectionTrait,
{
    Booking::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or(Error::BookingNotFound { booking_id })
}

/// Cancels an active booking and frees its seats.
#[instrument(skip(services))]
pub async fn cancel_booking(
    services: &Services,
    actor: &Actor,
    booking_id: i64,
) -> Result<booking::Model> {
    let txn = services.db.begin().await?;
    lock_booking(&txn, booking_id).await?;
    let booking = load_booking(&txn, booking_id).await?;
    access::authorize_booking(actor, &booking, Operation::CancelBooking)?;
    if !booking.is_active {
        return Err(Error::AlreadyCancelled { booking_id });
    }

    release_booking_seats(&txn, booking_id).await?;
    let mut active: booking::ActiveModel = booking.into();
    active.is_active = Set(false);
    let cancelled = active.update(&txn).await?;
    txn.commit().await?;

    services
        .cache
        .invalidate(&detailed_bookings_key(cancelled.user_id))
        .await;
    info!(booking_id, "Booking cancelled");
    Ok(cancelled)
}

/// Deletes a booking, freeing its seats first if it was still active.
#[instrument(skip(services))]
pub async fn delete_booking(services: &Services, actor: &Actor, booking_id: i64) -> Result<()> {
    let txn = services.db.begin().await?;
    lock_booking(&txn, booking_id).await?;
    let booking = load_booking(&txn, booking_id).await?;
    access::authorize_booking(actor, &booking, Operation::DeleteBooking)?;

    if booking.is_active {
        release_booking_seats(&txn, booking_id).await?;
    }
    BookingSeat::delete_many()
        .filter(booking_seat::Column::BookingId.eq(booking_id))
        .exec(&txn)
        .await?;
    Booking::delete_by_id(booking_id).exec(&txn).await?;
    txn.commit().await?;

    services
        .cache
        .invalidate(&detailed_bookings_key(booking.user_id))
        .await;
    info!(booking_id, "Booking deleted");
    Ok(())
}

/// Finds a booking the actor may see.
pub async fn get_booking(
    db: &DatabaseConnection,
    actor: &Actor,
    booking_id: i64,
) -> Result<booking::Model> {
    let booking = load_booking(db, booking_id).await?;
    access::authorize_booking(actor, &booking, Operation::ViewBooking)?;
    Ok(booking)
}

/// The actor's own bookings, or every booking when `all` is requested by a caller
/// allowed to view all bookings. Newest first.
pub async fn list_bookings(
    db: &DatabaseConnection,
    actor: &Actor,
    all: bool,
) -> Result<Vec<booking::Model>> {
    let mut query = Booking::find();
    if all {
        access::authorize(actor, Operation::ListAllBookings)?;
    } else {
        query = query.filter(booking::Column::UserId.eq(actor.user_id));
    }
    query
        .order_by_desc(booking::Column::BookingDatetime)
        .order_by_desc(booking::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Seats linked to a booking with their vehicle seats, by seat number.
async fn booking_seats<C>(db: &C, booking_id: i64) -> Result<Vec<(trip_seat::Model, seat::Model)>>
where
    C: ConnectionTrait,
{
    Ok(TripSeat::find()
        .inner_join(BookingSeat)
        .filter(booking_seat::Column::BookingId.eq(booking_id))
        .find_also_related(Seat)
        .order_by_asc(seat::Column::SeatNumber)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(trip_seat, seat)| seat.map(|seat| (trip_seat, seat)))
        .collect())
}

fn sold_price(seats: &[(trip_seat::Model, seat::Model)]) -> Decimal {
    seats
        .iter()
        .map(|(sold, seat)| pricing::snapshot_price(sold.cost, seat.seat_zone))
        .sum()
}

/// Price of a booking as sold: the sum of its seats' snapshotted prices. Later trip
/// price edits do not change it.
pub async fn booking_total_price(db: &DatabaseConnection, booking_id: i64) -> Result<Decimal> {
    let booking = load_booking(db, booking_id).await?;
    let seats = booking_seats(db, booking.id).await?;
    Ok(sold_price(&seats))
}

/// Builds the display form of a booking.
pub async fn booking_details(
    db: &DatabaseConnection,
    booking: &booking::Model,
) -> Result<BookingDetails> {
    let trip = trip_core::get_trip(db, booking.trip_id).await?;
    let seats = booking_seats(db, booking.id).await?;
    Ok(BookingDetails {
        booking_id: booking.id,
        trip_id: trip.id,
        departure_time: trip.departure_time,
        origin: city_name(db, trip.origin_city_id).await?,
        destination: city_name(db, trip.destination_city_id).await?,
        pickup_location: booking.pickup_location.clone(),
        dropoff_location: booking.dropoff_location.clone(),
        seat_numbers: seats.iter().map(|(_, s)| s.seat_number).collect(),
        total_price: sold_price(&seats),
        is_active: booking.is_active,
        payment_id: booking.payment_id,
    })
}

/// A user's bookings in display form, read through the cache.
pub async fn detailed_bookings(services: &Services, user_id: i64) -> Result<Vec<BookingDetails>> {
    let key = detailed_bookings_key(user_id);
    if let Some(details) = cache::get_json(services.cache.as_ref(), &key).await {
        debug!(user_id, "Detailed bookings served from cache");
        return Ok(details);
    }

    let bookings = Booking::find()
        .filter(booking::Column::UserId.eq(user_id))
        .order_by_desc(booking::Column::BookingDatetime)
        .order_by_desc(booking::Column::Id)
        .all(&services.db)
        .await?;
    let mut details = Vec::with_capacity(bookings.len());
    for booking in &bookings {
        details.push(booking_details(&services.db, booking).await?);
    }

    cache::set_json(
        services.cache.as_ref(),
        &key,
        &details,
        services.config.cache.detailed_bookings_ttl(),
    )
    .await?;
    Ok(details)
}
