//! Vehicle entity - A bus, car or van whose seats can be sold on trips.
//!
//! `total_seats` drives seat generation; the bounds depend on `vehicle_type`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Kind of vehicle, stored as its lowercase name.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    /// Full-size coach
    #[sea_orm(string_value = "bus")]
    Bus,
    /// Minibus / shuttle
    #[sea_orm(string_value = "minibus")]
    Minibus,
    /// Regular passenger car
    #[sea_orm(string_value = "car")]
    Car,
    /// Premium car, always comfort class
    #[sea_orm(string_value = "premium_car")]
    PremiumCar,
    /// Sport utility vehicle
    #[sea_orm(string_value = "suv")]
    Suv,
    /// Passenger van
    #[sea_orm(string_value = "van")]
    Van,
}

impl VehicleType {
    /// Allowed `total_seats` for this vehicle type.
    #[must_use]
    pub const fn seat_bounds(self) -> RangeInclusive<i32> {
        match self {
            Self::Bus => 1..=80,
            Self::Minibus => 1..=30,
            Self::Van => 1..=20,
            Self::Suv => 1..=9,
            Self::Car | Self::PremiumCar => 1..=8,
        }
    }

    /// Parses the stored/display name (`"premium_car"`, `"bus"`, ...).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "bus" => Some(Self::Bus),
            "minibus" => Some(Self::Minibus),
            "car" => Some(Self::Car),
            "premium_car" => Some(Self::PremiumCar),
            "suv" => Some(Self::Suv),
            "van" => Some(Self::Van),
            _ => None,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bus => "Bus",
            Self::Minibus => "Minibus",
            Self::Car => "Car",
            Self::PremiumCar => "Premium car",
            Self::Suv => "SUV",
            Self::Van => "Van",
        }
    }
}

/// Vehicle database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    /// Unique identifier for the vehicle
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Kind of vehicle
    pub vehicle_type: VehicleType,
    /// Normalized license plate, e.g. `А123АА125`
    #[sea_orm(unique)]
    pub license_plate: String,
    /// Number of seats; seats 1..=total_seats exist for this vehicle
    pub total_seats: i32,
    /// Comfort class flag (required for premium cars)
    pub is_comfort: bool,
    /// Air conditioning on board
    pub air_conditioning: bool,
    /// Pets allowed on board
    pub allows_pets: bool,
    /// When the vehicle was registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Vehicle and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One vehicle has many seats
    #[sea_orm(has_many = "super::seat::Entity")]
    Seats,
    /// One vehicle serves many trips
    #[sea_orm(has_many = "super::trip::Entity")]
    Trips,
}

impl Related<super::seat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seats.def()
    }
}

impl Related<super::trip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trips.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
