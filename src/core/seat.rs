//! Seat business logic - generation, capacity reconciliation and the one permitted edit.
//!
//! Seats are never created or removed by callers directly. They follow the vehicle's
//! `total_seats`: creation generates 1..=N, an increase appends, a decrease removes the
//! highest numbers unless one of them is booked on some trip.

use crate::{
    core::{
        access::{self, Actor, Operation},
        trip_seat,
    },
    entities::{
        BookingSeat, Seat, SeatZone, TripSeat, booking_seat, seat, trip_seat as trip_seat_entity,
        vehicle,
    },
    errors::{Error, Result},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{debug, info, instrument};

/// Zone assigned to a freshly generated seat: seat 1 is the only front seat.
#[must_use]
pub const fn initial_zone(seat_number: i32) -> SeatZone {
    if seat_number == 1 {
        SeatZone::Front
    } else {
        SeatZone::Back
    }
}

/// Requested edits to a seat. Only `seat_zone` may actually change.
#[derive(Debug, Clone, Default)]
pub struct SeatChanges {
    /// New seat number (rejected unless equal to the current one)
    pub seat_number: Option<i32>,
    /// New owning vehicle (rejected unless equal to the current one)
    pub vehicle_id: Option<i64>,
    /// New pricing zone
    pub seat_zone: Option<SeatZone>,
}

/// Lists a vehicle's seats ordered by number.
pub async fn list_seats<C>(db: &C, vehicle_id: i64) -> Result<Vec<seat::Model>>
where
    C: ConnectionTrait,
{
    Seat::find()
        .filter(seat::Column::VehicleId.eq(vehicle_id))
        .order_by_asc(seat::Column::SeatNumber)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a seat by id.
pub async fn get_seat(db: &DatabaseConnection, seat_id: i64) -> Result<seat::Model> {
    Seat::find_by_id(seat_id)
        .one(db)
        .await?
        .ok_or(Error::SeatNotFound { seat_id })
}

/// Inserts seats `from..=to` for a vehicle with their initial zones.
async fn generate_seats<C>(db: &C, vehicle_id: i64, from: i32, to: i32) -> Result<Vec<seat::Model>>
where
    C: ConnectionTrait,
{
    if from > to {
        return Ok(Vec::new());
    }

    let seats = (from..=to).map(|number| seat::ActiveModel {
        vehicle_id: Set(vehicle_id),
        seat_number: Set(number),
        seat_zone: Set(initial_zone(number)),
        ..Default::default()
    });
    Seat::insert_many(seats).exec_without_returning(db).await?;

    Seat::find()
        .filter(seat::Column::VehicleId.eq(vehicle_id))
        .filter(seat::Column::SeatNumber.between(from, to))
        .order_by_asc(seat::Column::SeatNumber)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Brings a vehicle's seat set in line with `vehicle.total_seats`.
///
/// Must run inside the transaction that saved the vehicle: on
/// [`Error::CapacityReductionBlocked`] the caller's rollback restores the old capacity.
#[instrument(skip(db, vehicle), fields(vehicle_id = vehicle.id, total_seats = vehicle.total_seats))]
pub async fn reconcile_seats<C>(db: &C, vehicle: &vehicle::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    let current: Option<i32> = Seat::find()
        .select_only()
        .column_as(seat::Column::SeatNumber.max(), "max_number")
        .filter(seat::Column::VehicleId.eq(vehicle.id))
        .into_tuple()
        .one(db)
        .await?
        .flatten();
    let current = current.unwrap_or(0);
    let target = vehicle.total_seats;

    if target > current {
        let added = generate_seats(db, vehicle.id, current + 1, target).await?;
        debug!(count = added.len(), "Generated seats");
        trip_seat::materialize_new_seats(db, vehicle.id, &added).await?;
    } else if target < current {
        let booked = booked_seat_numbers_above(db, vehicle.id, target).await?;
        if !booked.is_empty() {
            return Err(Error::CapacityReductionBlocked {
                vehicle_id: vehicle.id,
                requested: target,
                booked_seats: booked,
            });
        }
        let removed = remove_seats_above(db, vehicle.id, target).await?;
        info!(removed, "Removed seats above new capacity");
    }
    Ok(())
}

/// Seat numbers above `keep` that are booked on any trip.
async fn booked_seat_numbers_above<C>(db: &C, vehicle_id: i64, keep: i32) -> Result<Vec<i32>>
where
    C: ConnectionTrait,
{
    let mut numbers: Vec<i32> = Seat::find()
        .select_only()
        .column(seat::Column::SeatNumber)
        .inner_join(TripSeat)
        .filter(seat::Column::VehicleId.eq(vehicle_id))
        .filter(seat::Column::SeatNumber.gt(keep))
        .filter(trip_seat_entity::Column::IsBooked.eq(true))
        .into_tuple()
        .all(db)
        .await?;
    numbers.sort_unstable();
    numbers.dedup();
    Ok(numbers)
}

/// Privileged removal of every seat numbered above `keep`, with its trip seats.
///
/// Bypasses the row-level delete guard; only capacity reconciliation and vehicle
/// deletion call it.
pub(crate) async fn remove_seats_above<C>(db: &C, vehicle_id: i64, keep: i32) -> Result<u64>
where
    C: ConnectionTrait,
{
    let seat_ids: Vec<i64> = Seat::find()
        .select_only()
        .column(seat::Column::Id)
        .filter(seat::Column::VehicleId.eq(vehicle_id))
        .filter(seat::Column::SeatNumber.gt(keep))
        .into_tuple()
        .all(db)
        .await?;
    if seat_ids.is_empty() {
        return Ok(0);
    }

    let trip_seat_ids: Vec<i64> = TripSeat::find()
        .select_only()
        .column(trip_seat_entity::Column::Id)
        .filter(trip_seat_entity::Column::SeatId.is_in(seat_ids.clone()))
        .into_tuple()
        .all(db)
        .await?;
    if !trip_seat_ids.is_empty() {
        BookingSeat::delete_many()
            .filter(booking_seat::Column::TripSeatId.is_in(trip_seat_ids.clone()))
            .exec(db)
            .await?;
        TripSeat::delete_many()
            .filter(trip_seat_entity::Column::Id.is_in(trip_seat_ids))
            .exec(db)
            .await?;
    }

    let result = Seat::delete_many()
        .filter(seat::Column::Id.is_in(seat_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Applies seat edits. Changing `seat_number` or `vehicle_id` fails with
/// [`Error::SeatImmutableField`] and leaves the row untouched.
pub async fn update_seat(
    db: &DatabaseConnection,
    actor: &Actor,
    seat_id: i64,
    changes: SeatChanges,
) -> Result<seat::Model> {
    access::authorize(actor, Operation::UpdateSeat)?;
    let seat = get_seat(db, seat_id).await?;

    if changes
        .seat_number
        .is_some_and(|number| number != seat.seat_number)
    {
        return Err(Error::SeatImmutableField {
            field: "seat_number",
        });
    }
    if changes.vehicle_id.is_some_and(|id| id != seat.vehicle_id) {
        return Err(Error::SeatImmutableField { field: "vehicle_id" });
    }

    let Some(zone) = changes.seat_zone else {
        return Ok(seat);
    };
    if zone == seat.seat_zone {
        return Ok(seat);
    }

    let mut active: seat::ActiveModel = seat.into();
    active.seat_zone = Set(zone);
    let updated = active.update(db).await?;
    info!(seat_id, zone = zone.as_str(), "Seat zone updated");
    Ok(updated)
}

/// Changes a seat's pricing zone.
pub async fn update_seat_zone(
    db: &DatabaseConnection,
    actor: &Actor,
    seat_id: i64,
    zone: SeatZone,
) -> Result<seat::Model> {
    update_seat(
        db,
        actor,
        seat_id,
        SeatChanges {
            seat_zone: Some(zone),
            ..Default::default()
        },
    )
    .await
}

/// Seats cannot be deleted one by one; lower the vehicle's capacity instead.
pub async fn delete_seat(db: &DatabaseConnection, actor: &Actor, seat_id: i64) -> Result<()> {
    access::authorize(actor, Operation::DeleteSeat)?;
    let seat = get_seat(db, seat_id).await?;
    Err(Error::SeatDeletionForbidden { seat_id: seat.id })
}
