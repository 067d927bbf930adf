//! TripSeat materialization - one sellable seat per vehicle seat per trip.
//!
//! Each trip seat snapshots its zone price as `cost`. Materialization is idempotent:
//! pairs that already exist are skipped, and the `(trip_id, seat_id)` index turns any
//! remaining conflict into a no-op.

use crate::{
    entities::{Seat, SeatZone, Trip, TripSeat, seat, trip, trip_seat},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, sea_query::OnConflict,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// One row of a trip's seat map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMapEntry {
    /// Trip seat id
    pub trip_seat_id: i64,
    /// Vehicle seat id
    pub seat_id: i64,
    /// Seat number in the vehicle
    pub seat_number: i32,
    /// Pricing zone
    pub seat_zone: SeatZone,
    /// Snapshotted zone price
    pub cost: Decimal,
    /// Held by an active booking
    pub is_booked: bool,
}

/// Inserts trip seats for `seats` on `trip`, skipping pairs that already exist.
async fn insert_trip_seats<C>(db: &C, trip: &trip::Model, seats: &[seat::Model]) -> Result<u64>
where
    C: ConnectionTrait,
{
    let existing: HashSet<i64> = TripSeat::find()
        .select_only()
        .column(trip_seat::Column::SeatId)
        .filter(trip_seat::Column::TripId.eq(trip.id))
        .into_tuple::<i64>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let missing: Vec<trip_seat::ActiveModel> = seats
        .iter()
        .filter(|seat| seat.vehicle_id == trip.vehicle_id && !existing.contains(&seat.id))
        .map(|seat| trip_seat::ActiveModel {
            trip_id: Set(trip.id),
            seat_id: Set(seat.id),
            cost: Set(trip.zone_price(seat.seat_zone)),
            is_booked: Set(false),
            ..Default::default()
        })
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let inserted = TripSeat::insert_many(missing)
        .on_conflict(
            OnConflict::columns([trip_seat::Column::TripId, trip_seat::Column::SeatId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(inserted)
}

/// Creates the trip seats of `trip`, one per seat of its vehicle. Returns how many were new.
pub async fn materialize<C>(db: &C, trip: &trip::Model) -> Result<u64>
where
    C: ConnectionTrait,
{
    let seats = Seat::find()
        .filter(seat::Column::VehicleId.eq(trip.vehicle_id))
        .all(db)
        .await?;
    let inserted = insert_trip_seats(db, trip, &seats).await?;
    debug!(trip_id = trip.id, inserted, "Materialized trip seats");
    Ok(inserted)
}

/// Adds trip seats for newly generated `seats` on every trip of the vehicle.
pub async fn materialize_new_seats<C>(db: &C, vehicle_id: i64, seats: &[seat::Model]) -> Result<()>
where
    C: ConnectionTrait,
{
    if seats.is_empty() {
        return Ok(());
    }
    let trips = Trip::find()
        .filter(trip::Column::VehicleId.eq(vehicle_id))
        .all(db)
        .await?;
    for trip in &trips {
        insert_trip_seats(db, trip, seats).await?;
    }
    debug!(vehicle_id, trips = trips.len(), "Materialized new seats on existing trips");
    Ok(())
}

/// Re-snapshots `cost` of every free trip seat from the trip's current zone prices.
///
/// Booked seats keep the price they were sold at.
pub async fn refresh_free_seat_costs<C>(db: &C, trip: &trip::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    let free = TripSeat::find()
        .find_also_related(Seat)
        .filter(trip_seat::Column::TripId.eq(trip.id))
        .filter(trip_seat::Column::IsBooked.eq(false))
        .all(db)
        .await?;

    for zone in [SeatZone::Front, SeatZone::Middle, SeatZone::Back] {
        let ids: Vec<i64> = free
            .iter()
            .filter(|(_, seat)| seat.as_ref().is_some_and(|s| s.seat_zone == zone))
            .map(|(trip_seat, _)| trip_seat.id)
            .collect();
        if ids.is_empty() {
            continue;
        }
        TripSeat::update_many()
            .col_expr(
                trip_seat::Column::Cost,
                sea_orm::sea_query::Expr::value(trip.zone_price(zone)),
            )
            .filter(trip_seat::Column::Id.is_in(ids))
            .filter(trip_seat::Column::IsBooked.eq(false))
            .exec(db)
            .await?;
    }
    Ok(())
}

/// Seat map of a trip ordered by seat number.
pub async fn seat_map<C>(db: &C, trip_id: i64) -> Result<Vec<SeatMapEntry>>
where
    C: ConnectionTrait,
{
    let rows = TripSeat::find()
        .find_also_related(Seat)
        .filter(trip_seat::Column::TripId.eq(trip_id))
        .order_by_asc(seat::Column::SeatNumber)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(trip_seat, seat)| {
            seat.map(|seat| SeatMapEntry {
                trip_seat_id: trip_seat.id,
                seat_id: seat.id,
                seat_number: seat.seat_number,
                seat_zone: seat.seat_zone,
                cost: trip_seat.cost,
                is_booked: trip_seat.is_booked,
            })
        })
        .collect())
}

/// Number of free seats on a trip.
pub async fn available_seat_count<C>(db: &C, trip_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    TripSeat::find()
        .filter(trip_seat::Column::TripId.eq(trip_id))
        .filter(trip_seat::Column::IsBooked.eq(false))
        .count(db)
        .await
        .map_err(Into::into)
}
