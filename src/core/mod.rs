//! Core business logic - framework-agnostic booking, trip, vehicle and seat operations.
//!
//! Every operation takes the caller as an [`access::Actor`] and checks it before
//! touching the database; the bot layer only translates commands into these calls.

/// Roles, permissions and the operation capability table
pub mod access;
/// Seat claims, cancellation and booking views
pub mod booking;
/// City directory
pub mod city;
/// Payment records
pub mod payment;
/// Zone pricing
pub mod pricing;
/// Seat generation and capacity reconciliation
pub mod seat;
/// Trip scheduling and lifecycle transitions
pub mod trip;
/// Per-trip seat inventory
pub mod trip_seat;
/// User accounts and chat linking
pub mod user;
/// Vehicle registration and capacity changes
pub mod vehicle;
