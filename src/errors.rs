//! Unified error type for the booking backend.
//!
//! Caller-facing variants carry enough structure (field + reason, seat numbers,
//! amounts) to render an actionable message. Internal variants wrap the
//! underlying library errors and are rendered as an opaque failure.

use rust_decimal::Decimal;
use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: bad address characters, non-numeric chat id, overlapping schedule, etc.
    #[error("Invalid {field}: {reason}")]
    Validation {
        /// Name of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// One or more requested seats are not free on the trip.
    #[error("Seats unavailable: {seat_numbers:?}")]
    SeatsUnavailable {
        /// Requested seat numbers that could not be claimed
        seat_numbers: Vec<i32>,
    },

    /// Attached payment does not match the computed booking price.
    #[error("Payment amount {actual} does not match booking price {expected}")]
    PriceMismatch {
        /// Price computed from the claimed seats
        expected: Decimal,
        /// Amount recorded on the payment
        actual: Decimal,
    },

    /// Reducing capacity would remove seats that are booked on some trip.
    #[error(
        "Vehicle {vehicle_id} cannot shrink to {requested} seats: seats {booked_seats:?} are booked"
    )]
    CapacityReductionBlocked {
        /// Vehicle whose capacity change was rejected
        vehicle_id: i64,
        /// Requested new capacity
        requested: i32,
        /// Seat numbers above the new capacity that hold bookings
        booked_seats: Vec<i32>,
    },

    /// Attempt to change a write-once seat field.
    #[error("Seat field `{field}` cannot be changed once created")]
    SeatImmutableField {
        /// The write-once field
        field: &'static str,
    },

    /// Seats are removed only by capacity reduction or vehicle deletion.
    #[error("Seat {seat_id} cannot be deleted directly")]
    SeatDeletionForbidden {
        /// Seat that was targeted
        seat_id: i64,
    },

    /// Trip is not accepting bookings.
    #[error("Trip {trip_id} is not open for booking")]
    TripNotBookable {
        /// Trip id
        trip_id: i64,
    },

    /// Trip does not exist.
    #[error("Trip {trip_id} not found")]
    TripNotFound {
        /// Trip id
        trip_id: i64,
    },

    /// Payment does not exist.
    #[error("Payment {payment_id} not found")]
    PaymentNotFound {
        /// Payment id
        payment_id: i64,
    },

    /// Address could not be resolved in the given city.
    #[error("{field} address '{address}' was not found in {city}")]
    InvalidLocation {
        /// `pickup_location` or `dropoff_location`
        field: &'static str,
        /// Address as supplied
        address: String,
        /// City the lookup was scoped to
        city: String,
    },

    /// Booking is already inactive.
    #[error("Booking {booking_id} is already cancelled")]
    AlreadyCancelled {
        /// Booking id
        booking_id: i64,
    },

    /// Vehicle does not exist.
    #[error("Vehicle {vehicle_id} not found")]
    VehicleNotFound {
        /// Vehicle id
        vehicle_id: i64,
    },

    /// Seat does not exist.
    #[error("Seat {seat_id} not found")]
    SeatNotFound {
        /// Seat id
        seat_id: i64,
    },

    /// Booking does not exist.
    #[error("Booking {booking_id} not found")]
    BookingNotFound {
        /// Booking id
        booking_id: i64,
    },

    /// User does not exist.
    #[error("User not found: {user}")]
    UserNotFound {
        /// Id, phone or chat id used for the lookup
        user: String,
    },

    /// City does not exist.
    #[error("City not found: {city}")]
    CityNotFound {
        /// Id or name used for the lookup
        city: String,
    },

    /// Caller lacks the permission required for an operation.
    #[error("Not allowed to {operation}")]
    PermissionDenied {
        /// Human-readable operation name
        operation: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {message}")]
    Config {
        /// Details
        message: String,
    },

    /// Database failure.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Cached payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or unreadable environment variable.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Discord/poise framework failure.
    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

impl Error {
    /// Shorthand for a [`Error::Validation`].
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that must not leak details to the caller.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Serialization(_)
                | Self::EnvVar(_)
                | Self::FrameworkError(_)
                | Self::Config { .. }
        )
    }

    /// Message safe to show to an end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.is_internal() {
            "Something went wrong on our side, please try again later.".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
