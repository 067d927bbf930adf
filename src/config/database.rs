//! Database configuration module for `tripbook`.
//!
//! Handles `SQLite` connection setup and schema creation with `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`;
//! the composite uniqueness rules that entities cannot express (seat number per
//! vehicle, one trip seat per seat per trip) are added as explicit indexes.

use crate::entities::{
    Booking, BookingSeat, City, Payment, Seat, Trip, TripSeat, User, Vehicle, seat, trip_seat,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};
use tracing::debug;

/// Default database location when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://tripbook.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the `SQLite` database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(builder.build(&stmt)).await?;
    debug!(table = entity.table_name(), "Ensured table exists");
    Ok(())
}

/// Creates all tables (if missing) in foreign-key order, then the composite unique indexes.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, User).await?;
    create_table(db, &schema, City).await?;
    create_table(db, &schema, Vehicle).await?;
    create_table(db, &schema, Seat).await?;
    create_table(db, &schema, Trip).await?;
    create_table(db, &schema, TripSeat).await?;
    create_table(db, &schema, Payment).await?;
    create_table(db, &schema, Booking).await?;
    create_table(db, &schema, BookingSeat).await?;

    let seat_number_index = Index::create()
        .name("idx_seats_vehicle_seat_number")
        .table(Seat)
        .col(seat::Column::VehicleId)
        .col(seat::Column::SeatNumber)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&seat_number_index)).await?;

    let trip_seat_index = Index::create()
        .name("idx_trip_seats_trip_seat")
        .table(TripSeat)
        .col(trip_seat::Column::TripId)
        .col(trip_seat::Column::SeatId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&trip_seat_index)).await?;

    Ok(())
}
