//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod booking;
pub mod booking_seat;
pub mod city;
pub mod payment;
pub mod seat;
pub mod trip;
pub mod trip_seat;
pub mod user;
pub mod vehicle;

// Re-export specific types to avoid conflicts
pub use booking::{Column as BookingColumn, Entity as Booking, Model as BookingModel};
pub use booking_seat::{
    Column as BookingSeatColumn, Entity as BookingSeat, Model as BookingSeatModel,
};
pub use city::{Column as CityColumn, Entity as City, Model as CityModel};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel};
pub use seat::{Column as SeatColumn, Entity as Seat, Model as SeatModel, SeatZone};
pub use trip::{Column as TripColumn, Entity as Trip, Model as TripModel};
pub use trip_seat::{Column as TripSeatColumn, Entity as TripSeat, Model as TripSeatModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel, Role};
pub use vehicle::{Column as VehicleColumn, Entity as Vehicle, Model as VehicleModel, VehicleType};
