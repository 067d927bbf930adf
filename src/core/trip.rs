//! Trip scheduling - creation, edits, and the two deferred status transitions.
//!
//! Trips on one vehicle may not overlap. Bounds are inclusive: a trip departing at the
//! exact minute another arrives is an overlap. Each trip closes for booking at
//! `departure - cutoff` and deactivates at arrival; both transitions are idempotent.

use crate::{
    core::{
        access::{self, Actor, Operation},
        booking, trip_seat,
    },
    entities::{
        Booking, City, Role, Trip, TripSeat, User, Vehicle, booking as booking_entity, trip,
        trip_seat as trip_seat_entity,
    },
    errors::{Error, Result},
    services::{
        Services,
        cache::{CacheStore, detailed_bookings_key},
        tasks::{TaskRunner, TripAction},
    },
};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait, Unchanged, sea_query::Expr,
};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

/// Fields of a new trip.
#[derive(Debug, Clone)]
pub struct NewTrip {
    /// Vehicle serving the trip
    pub vehicle_id: i64,
    /// Assigned driver
    pub driver_id: Option<i64>,
    /// Departure city
    pub origin_city_id: i64,
    /// Arrival city
    pub destination_city_id: i64,
    /// Departure instant
    pub departure_time: DateTime<Utc>,
    /// Arrival instant
    pub arrival_time: DateTime<Utc>,
    /// Front zone price
    pub front_seat_price: Decimal,
    /// Middle zone price
    pub middle_seat_price: Decimal,
    /// Back zone price
    pub back_seat_price: Decimal,
    /// Minutes before departure when booking closes; configured default when `None`
    pub booking_cutoff_minutes: Option<i32>,
}

/// Partial update of a trip; `None` keeps the current value.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default)]
pub struct TripChanges {
    /// Rejected unless equal to the current vehicle
    pub vehicle_id: Option<i64>,
    /// `Some(None)` unassigns the driver
    pub driver_id: Option<Option<i64>>,
    pub origin_city_id: Option<i64>,
    pub destination_city_id: Option<i64>,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub front_seat_price: Option<Decimal>,
    pub middle_seat_price: Option<Decimal>,
    pub back_seat_price: Option<Decimal>,
    pub booking_cutoff_minutes: Option<i32>,
}

/// Field-level checks that need no database access.
fn validate_fields(trip: &trip::Model) -> Result<()> {
    if trip.departure_time >= trip.arrival_time {
        return Err(Error::validation(
            "arrival_time",
            "arrival must be after departure",
        ));
    }
    if trip.origin_city_id == trip.destination_city_id {
        return Err(Error::validation(
            "destination_city_id",
            "origin and destination must differ",
        ));
    }
    for (field, price) in [
        ("front_seat_price", trip.front_seat_price),
        ("middle_seat_price", trip.middle_seat_price),
        ("back_seat_price", trip.back_seat_price),
    ] {
        if price < Decimal::ZERO {
            return Err(Error::validation(field, "price cannot be negative"));
        }
    }
    if trip.booking_cutoff_minutes < 0 {
        return Err(Error::validation(
            "booking_cutoff_minutes",
            "cutoff cannot be negative",
        ));
    }
    Ok(())
}

/// Every column except the id, marked for writing.
fn writable(trip: &trip::Model) -> trip::ActiveModel {
    trip::ActiveModel {
        vehicle_id: Set(trip.vehicle_id),
        driver_id: Set(trip.driver_id),
        origin_city_id: Set(trip.origin_city_id),
        destination_city_id: Set(trip.destination_city_id),
        departure_time: Set(trip.departure_time),
        arrival_time: Set(trip.arrival_time),
        front_seat_price: Set(trip.front_seat_price),
        middle_seat_price: Set(trip.middle_seat_price),
        back_seat_price: Set(trip.back_seat_price),
        is_bookable: Set(trip.is_bookable),
        is_active: Set(trip.is_active),
        booking_cutoff_minutes: Set(trip.booking_cutoff_minutes),
        created_at: Set(trip.created_at),
        ..Default::default()
    }
}

/// Rejects a schedule that overlaps another trip of the same vehicle.
async fn ensure_no_overlap<C>(
    db: &C,
    vehicle_id: i64,
    departure: DateTime<Utc>,
    arrival: DateTime<Utc>,
    exclude: Option<i64>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut query = Trip::find()
        .filter(trip::Column::VehicleId.eq(vehicle_id))
        .filter(trip::Column::DepartureTime.lte(arrival))
        .filter(trip::Column::ArrivalTime.gte(departure));
    if let Some(id) = exclude {
        query = query.filter(trip::Column::Id.ne(id));
    }

    if let Some(other) = query.one(db).await? {
        return Err(Error::validation(
            "schedule",
            format!(
                "vehicle is already on trip {} from {} to {}",
                other.id,
                other.departure_time.format("%Y-%m-%d %H:%M"),
                other.arrival_time.format("%Y-%m-%d %H:%M")
            ),
        ));
    }
    Ok(())
}

/// Checks that every referenced row exists.
async fn ensure_references<C>(
    db: &C,
    vehicle_id: i64,
    driver_id: Option<i64>,
    city_ids: [i64; 2],
) -> Result<()>
where
    C: ConnectionTrait,
{
    if Vehicle::find_by_id(vehicle_id).one(db).await?.is_none() {
        return Err(Error::VehicleNotFound { vehicle_id });
    }
    for city_id in city_ids {
        if City::find_by_id(city_id).one(db).await?.is_none() {
            return Err(Error::CityNotFound {
                city: city_id.to_string(),
            });
        }
    }
    if let Some(driver_id) = driver_id {
        let driver = User::find_by_id(driver_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::UserNotFound {
                user: driver_id.to_string(),
            })?;
        if driver.role != Role::Driver {
            return Err(Error::validation("driver_id", "assigned user is not a driver"));
        }
    }
    Ok(())
}

/// Instant at which booking closes.
#[must_use]
pub fn booking_closes_at(trip: &trip::Model) -> DateTime<Utc> {
    trip.departure_time - TimeDelta::minutes(i64::from(trip.booking_cutoff_minutes))
}

/// Scheduled travel time.
#[must_use]
pub fn trip_duration(trip: &trip::Model) -> TimeDelta {
    trip.arrival_time - trip.departure_time
}

/// Finds a trip by id.
pub async fn get_trip<C>(db: &C, trip_id: i64) -> Result<trip::Model>
where
    C: ConnectionTrait,
{
    Trip::find_by_id(trip_id)
        .one(db)
        .await?
        .ok_or(Error::TripNotFound { trip_id })
}

/// Active, bookable trips departing in the future, soonest first.
pub async fn list_upcoming_trips(
    db: &DatabaseConnection,
    origin_city_id: Option<i64>,
    destination_city_id: Option<i64>,
) -> Result<Vec<trip::Model>> {
    let mut query = Trip::find()
        .filter(trip::Column::IsActive.eq(true))
        .filter(trip::Column::IsBookable.eq(true))
        .filter(trip::Column::DepartureTime.gt(Utc::now()));
    if let Some(origin) = origin_city_id {
        query = query.filter(trip::Column::OriginCityId.eq(origin));
    }
    if let Some(destination) = destination_city_id {
        query = query.filter(trip::Column::DestinationCityId.eq(destination));
    }
    query
        .order_by_asc(trip::Column::DepartureTime)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Queues the transitions a trip still needs.
pub async fn schedule_transitions(tasks: &dyn TaskRunner, trip: &trip::Model) -> Result<()> {
    if trip.is_bookable {
        tasks
            .schedule(
                TripAction::DisableBooking { trip_id: trip.id },
                booking_closes_at(trip),
            )
            .await?;
    }
    if trip.is_active {
        tasks
            .schedule(TripAction::Deactivate { trip_id: trip.id }, trip.arrival_time)
            .await?;
    }
    Ok(())
}

/// Schedules a trip, materializes its seats and queues its transitions.
#[instrument(skip(services, new), fields(vehicle_id = new.vehicle_id))]
pub async fn create_trip(services: &Services, actor: &Actor, new: NewTrip) -> Result<trip::Model> {
    access::authorize(actor, Operation::CreateTrip)?;
    if new.departure_time <= Utc::now() {
        return Err(Error::validation(
            "departure_time",
            "departure must be in the future",
        ));
    }

    let draft = trip::Model {
        id: 0,
        vehicle_id: new.vehicle_id,
        driver_id: new.driver_id,
        origin_city_id: new.origin_city_id,
        destination_city_id: new.destination_city_id,
        departure_time: new.departure_time,
        arrival_time: new.arrival_time,
        front_seat_price: new.front_seat_price,
        middle_seat_price: new.middle_seat_price,
        back_seat_price: new.back_seat_price,
        is_bookable: true,
        is_active: true,
        booking_cutoff_minutes: new
            .booking_cutoff_minutes
            .unwrap_or(services.config.default_cutoff_minutes),
        created_at: Utc::now(),
    };
    validate_fields(&draft)?;

    let txn = services.db.begin().await?;
    ensure_references(
        &txn,
        new.vehicle_id,
        new.driver_id,
        [new.origin_city_id, new.destination_city_id],
    )
    .await?;
    ensure_no_overlap(
        &txn,
        new.vehicle_id,
        new.departure_time,
        new.arrival_time,
        None,
    )
    .await?;
    let trip = writable(&draft).insert(&txn).await?;
    let seats = trip_seat::materialize(&txn, &trip).await?;
    txn.commit().await?;

    info!(trip_id = trip.id, seats, "Trip created");
    schedule_transitions(services.tasks.as_ref(), &trip).await?;
    Ok(trip)
}

/// Applies trip edits. New times or cutoff reschedule the pending transitions; new
/// prices re-snapshot the cost of seats not yet sold.
#[instrument(skip(services, changes))]
pub async fn update_trip(
    services: &Services,
    actor: &Actor,
    trip_id: i64,
    changes: TripChanges,
) -> Result<trip::Model> {
    let txn = services.db.begin().await?;
    let current = get_trip(&txn, trip_id).await?;
    access::authorize_trip(actor, &current, Operation::UpdateTrip)?;

    if changes.vehicle_id.is_some_and(|id| id != current.vehicle_id) {
        return Err(Error::validation(
            "vehicle_id",
            "a trip cannot be moved to another vehicle",
        ));
    }

    let mut next = current.clone();
    if let Some(driver_id) = changes.driver_id {
        next.driver_id = driver_id;
    }
    next.origin_city_id = changes.origin_city_id.unwrap_or(next.origin_city_id);
    next.destination_city_id = changes
        .destination_city_id
        .unwrap_or(next.destination_city_id);
    next.departure_time = changes.departure_time.unwrap_or(next.departure_time);
    next.arrival_time = changes.arrival_time.unwrap_or(next.arrival_time);
    next.front_seat_price = changes.front_seat_price.unwrap_or(next.front_seat_price);
    next.middle_seat_price = changes.middle_seat_price.unwrap_or(next.middle_seat_price);
    next.back_seat_price = changes.back_seat_price.unwrap_or(next.back_seat_price);
    next.booking_cutoff_minutes = changes
        .booking_cutoff_minutes
        .unwrap_or(next.booking_cutoff_minutes);
    validate_fields(&next)?;

    ensure_references(
        &txn,
        next.vehicle_id,
        next.driver_id,
        [next.origin_city_id, next.destination_city_id],
    )
    .await?;
    ensure_no_overlap(
        &txn,
        next.vehicle_id,
        next.departure_time,
        next.arrival_time,
        Some(trip_id),
    )
    .await?;

    let mut active = writable(&next);
    active.id = Unchanged(trip_id);
    let updated = active.update(&txn).await?;
    let prices_changed = updated.front_seat_price != current.front_seat_price
        || updated.middle_seat_price != current.middle_seat_price
        || updated.back_seat_price != current.back_seat_price;
    if prices_changed {
        trip_seat::refresh_free_seat_costs(&txn, &updated).await?;
    }
    txn.commit().await?;

    let timing_changed = updated.departure_time != current.departure_time
        || updated.arrival_time != current.arrival_time
        || updated.booking_cutoff_minutes != current.booking_cutoff_minutes;
    if timing_changed {
        services.tasks.cancel(trip_id).await;
        schedule_transitions(services.tasks.as_ref(), &updated).await?;
        info!(trip_id, "Trip transitions rescheduled");
    }
    Ok(updated)
}

/// Deletes a trip with its seats and pending transitions. Refused while bookings exist.
pub async fn delete_trip(services: &Services, actor: &Actor, trip_id: i64) -> Result<()> {
    let txn = services.db.begin().await?;
    let trip = get_trip(&txn, trip_id).await?;
    access::authorize_trip(actor, &trip, Operation::DeleteTrip)?;

    let bookings = Booking::find()
        .filter(booking_entity::Column::TripId.eq(trip_id))
        .count(&txn)
        .await?;
    if bookings > 0 {
        return Err(Error::validation(
            "trip",
            format!("trip has {bookings} booking(s)"),
        ));
    }

    TripSeat::delete_many()
        .filter(trip_seat_entity::Column::TripId.eq(trip_id))
        .exec(&txn)
        .await?;
    Trip::delete_by_id(trip_id).exec(&txn).await?;
    txn.commit().await?;

    services.tasks.cancel(trip_id).await;
    info!(trip_id, "Trip deleted");
    Ok(())
}

/// Stops accepting bookings on a trip. Idempotent.
pub async fn disable_booking<C>(db: &C, trip_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let trip = get_trip(db, trip_id).await?;
    if !trip.is_bookable {
        return Ok(());
    }
    Trip::update_many()
        .col_expr(trip::Column::IsBookable, Expr::value(false))
        .filter(trip::Column::Id.eq(trip_id))
        .exec(db)
        .await?;
    info!(trip_id, "Booking closed");
    Ok(())
}

/// Deactivates a trip and every active booking on it, releasing their seats.
///
/// Applying it to an already deactivated trip changes nothing. Returns the number of
/// bookings that were deactivated.
#[instrument(skip(db, cache))]
pub async fn deactivate(
    db: &DatabaseConnection,
    cache: &dyn CacheStore,
    trip_id: i64,
) -> Result<usize> {
    let txn = db.begin().await?;
    let trip = get_trip(&txn, trip_id).await?;
    let active_bookings = Booking::find()
        .filter(booking_entity::Column::TripId.eq(trip_id))
        .filter(booking_entity::Column::IsActive.eq(true))
        .all(&txn)
        .await?;
    if !trip.is_active && !trip.is_bookable && active_bookings.is_empty() {
        return Ok(0);
    }

    Trip::update_many()
        .col_expr(trip::Column::IsActive, Expr::value(false))
        .col_expr(trip::Column::IsBookable, Expr::value(false))
        .filter(trip::Column::Id.eq(trip_id))
        .exec(&txn)
        .await?;

    for booking in &active_bookings {
        booking::release_booking_seats(&txn, booking.id).await?;
    }
    let booking_ids: Vec<i64> = active_bookings.iter().map(|b| b.id).collect();
    if !booking_ids.is_empty() {
        Booking::update_many()
            .col_expr(booking_entity::Column::IsActive, Expr::value(false))
            .filter(booking_entity::Column::Id.is_in(booking_ids))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;

    let users: BTreeSet<i64> = active_bookings.iter().map(|b| b.user_id).collect();
    for user_id in users {
        cache.invalidate(&detailed_bookings_key(user_id)).await;
    }
    info!(trip_id, bookings = active_bookings.len(), "Trip deactivated");
    Ok(active_bookings.len())
}

/// Executes a deferred transition.
pub async fn apply_transition(
    db: &DatabaseConnection,
    cache: &dyn CacheStore,
    action: TripAction,
) -> Result<()> {
    match action {
        TripAction::DisableBooking { trip_id } => disable_booking(db, trip_id).await,
        TripAction::Deactivate { trip_id } => deactivate(db, cache, trip_id).await.map(|_| ()),
    }
}

/// Re-queues the transitions of every active trip. Run once at startup; transitions
/// whose time has passed run immediately.
pub async fn reschedule_pending_transitions(services: &Services) -> Result<usize> {
    let trips = Trip::find()
        .filter(trip::Column::IsActive.eq(true))
        .all(&services.db)
        .await?;

    let mut scheduled = 0;
    for trip in &trips {
        match schedule_transitions(services.tasks.as_ref(), trip).await {
            Ok(()) => scheduled += 1,
            Err(e) => warn!(trip_id = trip.id, error = %e, "Could not reschedule trip"),
        }
    }
    info!(scheduled, "Pending trip transitions rescheduled");
    Ok(scheduled)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::trip_seat::seat_map,
        test_utils::{self, RecordedTask, admin, at_hour},
    };

    #[tokio::test]
    async fn test_overlap_is_inclusive() -> Result<()> {
        let env = test_utils::setup_trip_env(4).await?;
        let first = test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0));
        create_trip(&env.services, &admin(), first).await?;

        let overlapping = test_utils::new_trip(&env, at_hour(13, 0), at_hour(16, 0));
        let err = create_trip(&env.services, &admin(), overlapping)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "schedule"));

        let touching = test_utils::new_trip(&env, at_hour(14, 0), at_hour(16, 0));
        assert!(create_trip(&env.services, &admin(), touching).await.is_err());

        let after = test_utils::new_trip(&env, at_hour(14, 1), at_hour(16, 0));
        assert!(create_trip(&env.services, &admin(), after).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_schedules_rejected() -> Result<()> {
        let env = test_utils::setup_trip_env(4).await?;

        let backwards = test_utils::new_trip(&env, at_hour(14, 0), at_hour(10, 0));
        assert!(create_trip(&env.services, &admin(), backwards).await.is_err());

        let mut same_city = test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0));
        same_city.destination_city_id = same_city.origin_city_id;
        assert!(create_trip(&env.services, &admin(), same_city).await.is_err());

        let mut past = test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0));
        past.departure_time = Utc::now() - TimeDelta::hours(2);
        past.arrival_time = Utc::now() - TimeDelta::hours(1);
        let err = create_trip(&env.services, &admin(), past).await.unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "departure_time"));

        let mut negative = test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0));
        negative.back_seat_price = Decimal::from(-1);
        assert!(create_trip(&env.services, &admin(), negative).await.is_err());

        assert!(list_upcoming_trips(&env.services.db, None, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_schedules_both_transitions() -> Result<()> {
        let env = test_utils::setup_trip_env(4).await?;
        let mut new = test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0));
        new.booking_cutoff_minutes = Some(30);
        let trip = create_trip(&env.services, &admin(), new).await?;

        let recorded = env.doubles.tasks.recorded().await;
        assert_eq!(
            recorded,
            vec![
                RecordedTask::Scheduled(
                    TripAction::DisableBooking { trip_id: trip.id },
                    at_hour(9, 30)
                ),
                RecordedTask::Scheduled(TripAction::Deactivate { trip_id: trip.id }, at_hour(14, 0)),
            ]
        );
        assert_eq!(seat_map(&env.services.db, trip.id).await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_default_cutoff_from_config() -> Result<()> {
        let env = test_utils::setup_trip_env(2).await?;
        let trip = create_trip(
            &env.services,
            &admin(),
            test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
        )
        .await?;
        assert_eq!(
            trip.booking_cutoff_minutes,
            env.services.config.default_cutoff_minutes
        );
        assert_eq!(trip_duration(&trip), TimeDelta::hours(4));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_reschedules_on_time_change() -> Result<()> {
        let env = test_utils::setup_trip_env(2).await?;
        let trip = create_trip(
            &env.services,
            &admin(),
            test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
        )
        .await?;
        env.doubles.tasks.clear().await;

        let updated = update_trip(
            &env.services,
            &admin(),
            trip.id,
            TripChanges {
                arrival_time: Some(at_hour(15, 0)),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.arrival_time, at_hour(15, 0));

        let recorded = env.doubles.tasks.recorded().await;
        assert_eq!(recorded[0], RecordedTask::Cancelled(trip.id));
        assert!(recorded.contains(&RecordedTask::Scheduled(
            TripAction::Deactivate { trip_id: trip.id },
            at_hour(15, 0)
        )));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_price_only_does_not_reschedule() -> Result<()> {
        let env = test_utils::setup_trip_env(3).await?;
        let trip = create_trip(
            &env.services,
            &admin(),
            test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
        )
        .await?;
        env.doubles.tasks.clear().await;

        update_trip(
            &env.services,
            &admin(),
            trip.id,
            TripChanges {
                back_seat_price: Some(Decimal::from(700)),
                ..Default::default()
            },
        )
        .await?;

        assert!(env.doubles.tasks.recorded().await.is_empty());
        let map = seat_map(&env.services.db, trip.id).await?;
        assert_eq!(map[1].cost, Decimal::from(700));
        assert_eq!(map[0].cost, trip.front_seat_price);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_cannot_change_vehicle_or_overlap() -> Result<()> {
        let env = test_utils::setup_trip_env(2).await?;
        let first = create_trip(
            &env.services,
            &admin(),
            test_utils::new_trip(&env, at_hour(10, 0), at_hour(12, 0)),
        )
        .await?;
        let second = create_trip(
            &env.services,
            &admin(),
            test_utils::new_trip(&env, at_hour(13, 0), at_hour(15, 0)),
        )
        .await?;

        let err = update_trip(
            &env.services,
            &admin(),
            first.id,
            TripChanges {
                vehicle_id: Some(first.vehicle_id + 100),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "vehicle_id"));

        let err = update_trip(
            &env.services,
            &admin(),
            second.id,
            TripChanges {
                departure_time: Some(at_hour(11, 30)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "schedule"));

        // Moving a trip within its own window is not an overlap with itself.
        update_trip(
            &env.services,
            &admin(),
            second.id,
            TripChanges {
                departure_time: Some(at_hour(13, 30)),
                ..Default::default()
            },
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_trip() -> Result<()> {
        let env = test_utils::setup_trip_env(2).await?;
        let trip = create_trip(
            &env.services,
            &admin(),
            test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
        )
        .await?;

        delete_trip(&env.services, &admin(), trip.id).await?;
        assert!(matches!(
            get_trip(&env.services.db, trip.id).await,
            Err(Error::TripNotFound { .. })
        ));
        assert!(seat_map(&env.services.db, trip.id).await?.is_empty());
        assert!(
            env.doubles
                .tasks
                .recorded()
                .await
                .contains(&RecordedTask::Cancelled(trip.id))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_trip_with_bookings_rejected() -> Result<()> {
        let ctx = test_utils::setup_booking_env(3).await?;
        test_utils::book_seats(&ctx, &[2]).await?;

        let err = delete_trip(&ctx.services, &admin(), ctx.trip.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "trip"));
        Ok(())
    }

    #[tokio::test]
    async fn test_disable_booking_is_idempotent() -> Result<()> {
        let (db, trip) = test_utils::setup_with_trip(2).await?;
        disable_booking(&db, trip.id).await?;
        disable_booking(&db, trip.id).await?;

        let reloaded = get_trip(&db, trip.id).await?;
        assert!(!reloaded.is_bookable);
        assert!(reloaded.is_active);
        assert!(matches!(
            disable_booking(&db, 999).await,
            Err(Error::TripNotFound { trip_id: 999 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_deactivation_cascades_to_bookings() -> Result<()> {
        let ctx = test_utils::setup_booking_env(4).await?;
        let first = test_utils::book_seats(&ctx, &[1, 2]).await?;
        let second = test_utils::book_seats(&ctx, &[3]).await?;
        let db = &ctx.services.db;

        let affected = deactivate(db, ctx.services.cache.as_ref(), ctx.trip.id).await?;
        assert_eq!(affected, 2);

        let trip = get_trip(db, ctx.trip.id).await?;
        assert!(!trip.is_active);
        assert!(!trip.is_bookable);
        for booking_id in [first.id, second.id] {
            let booking = Booking::find_by_id(booking_id).one(db).await?.unwrap();
            assert!(!booking.is_active);
        }
        assert!(seat_map(db, ctx.trip.id).await?.iter().all(|e| !e.is_booked));

        assert_eq!(
            deactivate(db, ctx.services.cache.as_ref(), ctx.trip.id).await?,
            0
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_reschedule_pending_transitions() -> Result<()> {
        let env = test_utils::setup_trip_env(2).await?;
        create_trip(
            &env.services,
            &admin(),
            test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
        )
        .await?;
        env.doubles.tasks.clear().await;

        assert_eq!(reschedule_pending_transitions(&env.services).await?, 1);
        assert_eq!(env.doubles.tasks.recorded().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_upcoming_trips_filter_by_city() -> Result<()> {
        let env = test_utils::setup_trip_env(2).await?;
        let trip = create_trip(
            &env.services,
            &admin(),
            test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
        )
        .await?;

        let all = list_upcoming_trips(&env.services.db, None, None).await?;
        assert_eq!(all.len(), 1);
        let forward =
            list_upcoming_trips(&env.services.db, Some(trip.origin_city_id), None).await?;
        assert_eq!(forward.len(), 1);
        let reverse =
            list_upcoming_trips(&env.services.db, Some(trip.destination_city_id), None).await?;
        assert!(reverse.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_customer_cannot_create_trip() -> Result<()> {
        let env = test_utils::setup_trip_env(2).await?;
        let customer = test_utils::customer_actor(&env.services.db).await?;
        let err = create_trip(
            &env.services,
            &customer,
            test_utils::new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
        Ok(())
    }
}
