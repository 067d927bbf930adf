//! Trip entity - A scheduled run of one vehicle between two cities.
//!
//! Each trip carries its own per-zone seat prices and a booking cutoff. Two deferred
//! transitions flip `is_bookable` and `is_active` over the trip's lifetime.

use super::seat::SeatZone;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Trip database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trips")]
pub struct Model {
    /// Unique identifier for the trip
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Vehicle serving the trip
    pub vehicle_id: i64,
    /// Driver (trip owner), if assigned
    pub driver_id: Option<i64>,
    /// City of departure
    pub origin_city_id: i64,
    /// City of arrival
    pub destination_city_id: i64,
    /// Scheduled departure (UTC)
    pub departure_time: DateTimeUtc,
    /// Scheduled arrival (UTC)
    pub arrival_time: DateTimeUtc,
    /// Price of a front-zone seat before the front premium
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub front_seat_price: Decimal,
    /// Price of a middle-zone seat
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub middle_seat_price: Decimal,
    /// Price of a back-zone seat
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub back_seat_price: Decimal,
    /// Whether new bookings are accepted
    pub is_bookable: bool,
    /// False once the trip has arrived or was deactivated
    pub is_active: bool,
    /// Bookings close this many minutes before departure
    pub booking_cutoff_minutes: i32,
    /// When the trip was scheduled
    pub created_at: DateTimeUtc,
}

impl Model {
    /// The trip's configured price for a seat zone.
    #[must_use]
    pub const fn zone_price(&self, zone: SeatZone) -> Decimal {
        match zone {
            SeatZone::Front => self.front_seat_price,
            SeatZone::Middle => self.middle_seat_price,
            SeatZone::Back => self.back_seat_price,
        }
    }
}

/// Defines relationships between Trip and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each trip uses one vehicle
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id"
    )]
    Vehicle,
    /// Optional driver
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DriverId",
        to = "super::user::Column::Id"
    )]
    Driver,
    /// Departure city
    #[sea_orm(
        belongs_to = "super::city::Entity",
        from = "Column::OriginCityId",
        to = "super::city::Column::Id"
    )]
    Origin,
    /// Arrival city
    #[sea_orm(
        belongs_to = "super::city::Entity",
        from = "Column::DestinationCityId",
        to = "super::city::Column::Id"
    )]
    Destination,
    /// One trip has many trip seats
    #[sea_orm(has_many = "super::trip_seat::Entity")]
    TripSeats,
    /// One trip has many bookings
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl Related<super::trip_seat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TripSeats.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
