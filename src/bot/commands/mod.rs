//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Registration and chat linking
pub mod account;

/// Booking, listing and cancelling seats
pub mod booking;

/// General utility commands
pub mod general;

/// Trip search and seat maps
pub mod trip;

pub use account::*;
pub use booking::*;
pub use general::*;
pub use trip::*;
