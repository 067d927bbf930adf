//! Seat entity - A numbered seat that belongs to exactly one vehicle.
//!
//! Seats are generated from the vehicle's capacity. `seat_number` and `vehicle_id` are
//! write-once and row-level deletes are refused; see `core::seat` for the sanctioned paths.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Message carried by the write-time guard when a write-once column is touched.
pub const IMMUTABLE_FIELDS_MESSAGE: &str = "seat_number and vehicle_id are immutable";
/// Message carried by the write-time guard when a seat row is deleted directly.
pub const DELETE_FORBIDDEN_MESSAGE: &str = "seats are removed only by capacity reconciliation";

/// Pricing category of a seat, independent of its physical row.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SeatZone {
    /// Front zone, sold with a premium
    #[sea_orm(string_value = "front")]
    Front,
    /// Middle zone
    #[sea_orm(string_value = "middle")]
    Middle,
    /// Back zone
    #[sea_orm(string_value = "back")]
    Back,
}

impl SeatZone {
    /// Parses `"front"`, `"middle"` or `"back"` (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "front" => Some(Self::Front),
            "middle" => Some(Self::Middle),
            "back" => Some(Self::Back),
            _ => None,
        }
    }

    /// Lowercase name as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Middle => "middle",
            Self::Back => "back",
        }
    }
}

/// Seat database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "seats")]
pub struct Model {
    /// Unique identifier for the seat
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning vehicle (write-once)
    pub vehicle_id: i64,
    /// 1-based seat number, unique per vehicle (write-once)
    pub seat_number: i32,
    /// Pricing zone
    pub seat_zone: SeatZone,
}

/// Defines relationships between Seat and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each seat belongs to one vehicle
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id",
        on_delete = "Cascade"
    )]
    Vehicle,
    /// One seat is materialized on many trips
    #[sea_orm(has_many = "super::trip_seat::Entity")]
    TripSeats,
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

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert && (self.seat_number.is_set() || self.vehicle_id.is_set()) {
            return Err(DbErr::Custom(IMMUTABLE_FIELDS_MESSAGE.to_string()));
        }
        Ok(self)
    }

    async fn before_delete<C>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Err(DbErr::Custom(DELETE_FORBIDDEN_MESSAGE.to_string()))
    }
}
