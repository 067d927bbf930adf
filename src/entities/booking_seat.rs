//! Booking/TripSeat link table - the many-to-many set of seats held by a booking.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Link row between a booking and one of its trip seats
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking_trip_seats")]
pub struct Model {
    /// Booking side of the link
    #[sea_orm(primary_key, auto_increment = false)]
    pub booking_id: i64,
    /// Trip seat side of the link
    #[sea_orm(primary_key, auto_increment = false)]
    pub trip_seat_id: i64,
}

/// Defines relationships for the link table
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link belongs to one booking
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id",
        on_delete = "Cascade"
    )]
    Booking,
    /// Link belongs to one trip seat
    #[sea_orm(
        belongs_to = "super::trip_seat::Entity",
        from = "Column::TripSeatId",
        to = "super::trip_seat::Column::Id",
        on_delete = "Cascade"
    )]
    TripSeat,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl Related<super::trip_seat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TripSeat.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
