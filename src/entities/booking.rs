//! Booking entity - A customer's reservation of one or more seats on a trip.
//!
//! Seats are linked through `booking_trip_seats`. `booking_datetime` is set once at
//! creation; `is_active` only ever goes from true to false.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Booking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    /// Unique identifier for the booking
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer who made the booking
    pub user_id: i64,
    /// Booked trip
    pub trip_id: i64,
    /// Attached payment (one-to-one)
    #[sea_orm(unique)]
    pub payment_id: Option<i64>,
    /// Normalized pickup address in the origin city
    pub pickup_location: String,
    /// Normalized dropoff address in the destination city
    pub dropoff_location: String,
    /// Creation timestamp
    pub booking_datetime: DateTimeUtc,
    /// False once cancelled or the trip was deactivated
    pub is_active: bool,
}

/// Defines relationships between Booking and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each booking belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each booking is for one trip
    #[sea_orm(
        belongs_to = "super::trip::Entity",
        from = "Column::TripId",
        to = "super::trip::Column::Id"
    )]
    Trip,
    /// Optional payment
    #[sea_orm(
        belongs_to = "super::payment::Entity",
        from = "Column::PaymentId",
        to = "super::payment::Column::Id"
    )]
    Payment,
    /// Seat links
    #[sea_orm(has_many = "super::booking_seat::Entity")]
    BookingSeats,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::trip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trip.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl Related<super::booking_seat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingSeats.def()
    }
}

impl Related<super::trip_seat::Entity> for Entity {
    fn to() -> RelationDef {
        super::booking_seat::Relation::TripSeat.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::booking_seat::Relation::Booking.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
