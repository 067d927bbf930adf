//! TripSeat entity - The per-trip materialization of a vehicle seat.
//!
//! `is_booked` is the single source of truth for seat availability within a trip.
//! The `(trip_id, seat_id)` pair is unique; the index is created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// TripSeat database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trip_seats")]
pub struct Model {
    /// Unique identifier for the trip seat
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Trip this seat is sold on
    pub trip_id: i64,
    /// Underlying vehicle seat
    pub seat_id: i64,
    /// Zone price snapshotted when the trip seat was created
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub cost: Decimal,
    /// Whether an active booking holds this seat
    pub is_booked: bool,
}

/// Defines relationships between TripSeat and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each trip seat belongs to one trip
    #[sea_orm(
        belongs_to = "super::trip::Entity",
        from = "Column::TripId",
        to = "super::trip::Column::Id",
        on_delete = "Cascade"
    )]
    Trip,
    /// Each trip seat wraps one vehicle seat
    #[sea_orm(
        belongs_to = "super::seat::Entity",
        from = "Column::SeatId",
        to = "super::seat::Column::Id",
        on_delete = "Cascade"
    )]
    Seat,
    /// Booking links referencing this trip seat
    #[sea_orm(has_many = "super::booking_seat::Entity")]
    BookingSeats,
}

impl Related<super::trip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trip.def()
    }
}

impl Related<super::seat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seat.def()
    }
}

impl Related<super::booking_seat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingSeats.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        super::booking_seat::Relation::Booking.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::booking_seat::Relation::TripSeat.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
