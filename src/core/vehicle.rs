//! Vehicle business logic - registration, capacity changes and removal.
//!
//! Every capacity change runs in the same transaction as the seat reconciliation it
//! triggers, so a blocked capacity reduction leaves the vehicle exactly as it was.

use crate::{
    core::{
        access::{self, Actor, Operation},
        seat,
    },
    entities::{Trip, Vehicle, VehicleType, trip, vehicle},
    errors::{Error, Result},
};
use chrono::Utc;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::LazyLock;
use tracing::{info, instrument};

/// Cyrillic letters allowed on plates (those with Latin look-alikes).
pub const PLATE_LETTERS: &str = "АВЕКМНОРСТУХ";

#[allow(clippy::expect_used)] // Literal pattern, checked by tests
static PLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[АВЕКМНОРСТУХ][0-9]{3}[АВЕКМНОРСТУХ]{2}(?P<region>[0-9]{2,3})?$")
        .expect("plate pattern is valid")
});

/// Normalizes a license plate: strips whitespace, uppercases, appends `default_region`
/// when the region is missing.
pub fn normalize_plate(raw: &str, default_region: &str) -> Result<String> {
    let plate: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let caps = PLATE.captures(&plate).ok_or_else(|| {
        Error::validation(
            "license_plate",
            format!("expected a plate like А123АА{default_region}, using only {PLATE_LETTERS}"),
        )
    })?;

    if caps.name("region").is_some() {
        Ok(plate)
    } else {
        Ok(format!("{plate}{default_region}"))
    }
}

/// Checks the per-type seat bounds and the comfort rule.
pub fn validate_vehicle(vehicle_type: VehicleType, total_seats: i32, is_comfort: bool) -> Result<()> {
    let bounds = vehicle_type.seat_bounds();
    if !bounds.contains(&total_seats) {
        return Err(Error::validation(
            "total_seats",
            format!(
                "{} must have between {} and {} seats",
                vehicle_type.label(),
                bounds.start(),
                bounds.end()
            ),
        ));
    }
    if vehicle_type == VehicleType::PremiumCar && !is_comfort {
        return Err(Error::validation(
            "is_comfort",
            "a premium car must be comfort class",
        ));
    }
    Ok(())
}

/// Fields of a new vehicle.
#[derive(Debug, Clone)]
pub struct NewVehicle {
    /// Kind of vehicle
    pub vehicle_type: VehicleType,
    /// Plate as entered
    pub license_plate: String,
    /// Capacity
    pub total_seats: i32,
    /// Comfort class
    pub is_comfort: bool,
    /// Air conditioning
    pub air_conditioning: bool,
    /// Pets allowed
    pub allows_pets: bool,
}

/// Partial update of a vehicle; `None` keeps the current value.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default)]
pub struct VehicleChanges {
    pub vehicle_type: Option<VehicleType>,
    pub license_plate: Option<String>,
    pub total_seats: Option<i32>,
    pub is_comfort: Option<bool>,
    pub air_conditioning: Option<bool>,
    pub allows_pets: Option<bool>,
}

async fn ensure_plate_free<C>(db: &C, plate: &str, except: Option<i64>) -> Result<()>
where
    C: sea_orm::ConnectionTrait,
{
    let mut query = Vehicle::find().filter(vehicle::Column::LicensePlate.eq(plate));
    if let Some(id) = except {
        query = query.filter(vehicle::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(Error::validation(
            "license_plate",
            format!("a vehicle with plate {plate} already exists"),
        ));
    }
    Ok(())
}

/// Finds a vehicle by id.
pub async fn get_vehicle(db: &DatabaseConnection, vehicle_id: i64) -> Result<vehicle::Model> {
    Vehicle::find_by_id(vehicle_id)
        .one(db)
        .await?
        .ok_or(Error::VehicleNotFound { vehicle_id })
}

/// All vehicles ordered by plate.
pub async fn list_vehicles(db: &DatabaseConnection) -> Result<Vec<vehicle::Model>> {
    Vehicle::find()
        .order_by_asc(vehicle::Column::LicensePlate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Registers a vehicle and generates its seats.
#[instrument(skip(db, new), fields(plate = %new.license_plate))]
pub async fn create_vehicle(
    db: &DatabaseConnection,
    actor: &Actor,
    new: NewVehicle,
    default_region: &str,
) -> Result<vehicle::Model> {
    access::authorize(actor, Operation::CreateVehicle)?;
    let plate = normalize_plate(&new.license_plate, default_region)?;
    validate_vehicle(new.vehicle_type, new.total_seats, new.is_comfort)?;

    let txn = db.begin().await?;
    ensure_plate_free(&txn, &plate, None).await?;

    let vehicle = vehicle::ActiveModel {
        vehicle_type: Set(new.vehicle_type),
        license_plate: Set(plate),
        total_seats: Set(new.total_seats),
        is_comfort: Set(new.is_comfort),
        air_conditioning: Set(new.air_conditioning),
        allows_pets: Set(new.allows_pets),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    seat::reconcile_seats(&txn, &vehicle).await?;
    txn.commit().await?;

    info!(vehicle_id = vehicle.id, seats = vehicle.total_seats, "Vehicle created");
    Ok(vehicle)
}

/// Updates a vehicle; a capacity change reconciles its seats in the same transaction.
#[instrument(skip(db, changes))]
pub async fn update_vehicle(
    db: &DatabaseConnection,
    actor: &Actor,
    vehicle_id: i64,
    changes: VehicleChanges,
    default_region: &str,
) -> Result<vehicle::Model> {
    access::authorize(actor, Operation::UpdateVehicle)?;

    let txn = db.begin().await?;
    let current = Vehicle::find_by_id(vehicle_id)
        .one(&txn)
        .await?
        .ok_or(Error::VehicleNotFound { vehicle_id })?;

    let vehicle_type = changes.vehicle_type.unwrap_or(current.vehicle_type);
    let total_seats = changes.total_seats.unwrap_or(current.total_seats);
    let is_comfort = changes.is_comfort.unwrap_or(current.is_comfort);
    validate_vehicle(vehicle_type, total_seats, is_comfort)?;

    let capacity_changed = total_seats != current.total_seats;
    let mut active: vehicle::ActiveModel = current.into();
    if let Some(raw) = changes.license_plate {
        let plate = normalize_plate(&raw, default_region)?;
        ensure_plate_free(&txn, &plate, Some(vehicle_id)).await?;
        active.license_plate = Set(plate);
    }
    active.vehicle_type = Set(vehicle_type);
    active.total_seats = Set(total_seats);
    active.is_comfort = Set(is_comfort);
    if let Some(flag) = changes.air_conditioning {
        active.air_conditioning = Set(flag);
    }
    if let Some(flag) = changes.allows_pets {
        active.allows_pets = Set(flag);
    }

    let updated = active.update(&txn).await?;
    if capacity_changed {
        seat::reconcile_seats(&txn, &updated).await?;
    }
    txn.commit().await?;

    info!(vehicle_id, total_seats, "Vehicle updated");
    Ok(updated)
}

/// Deletes a vehicle and its seats. Refused while any trip uses the vehicle.
pub async fn delete_vehicle(db: &DatabaseConnection, actor: &Actor, vehicle_id: i64) -> Result<()> {
    access::authorize(actor, Operation::DeleteVehicle)?;

    let txn = db.begin().await?;
    let vehicle = Vehicle::find_by_id(vehicle_id)
        .one(&txn)
        .await?
        .ok_or(Error::VehicleNotFound { vehicle_id })?;

    let trips = Trip::find()
        .filter(trip::Column::VehicleId.eq(vehicle_id))
        .count(&txn)
        .await?;
    if trips > 0 {
        return Err(Error::validation(
            "vehicle",
            format!("vehicle is used by {trips} trip(s)"),
        ));
    }

    seat::remove_seats_above(&txn, vehicle.id, 0).await?;
    Vehicle::delete_by_id(vehicle.id).exec(&txn).await?;
    txn.commit().await?;

    info!(vehicle_id, "Vehicle deleted");
    Ok(())
}
