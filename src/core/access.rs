//! Access control - which caller may run which operation.
//!
//! Every mutating operation names itself with an [`Operation`]; the capability table
//! in [`Operation::required_permission`] maps it to the [`Permission`] a caller must
//! hold, and each [`Role`] grants a fixed permission set. Ownership rules (booking
//! owner, trip driver) are separate predicates checked against the loaded rows.

use crate::{
    entities::{Role, booking, trip, user},
    errors::{Error, Result},
};
use std::fmt;

/// A capability granted by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// See and act on any user's bookings
    ViewAllBookings,
    /// Create, update and delete trips
    ManageTrips,
    /// Create, update and delete vehicles
    ManageVehicles,
    /// Edit seat zones
    ManageSeats,
    /// Create cities
    ManageCities,
}

/// A core operation that may require a permission.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateVehicle,
    UpdateVehicle,
    DeleteVehicle,
    UpdateSeat,
    DeleteSeat,
    CreateTrip,
    UpdateTrip,
    DeleteTrip,
    CreateCity,
    CreateBooking,
    CancelBooking,
    DeleteBooking,
    ViewBooking,
    ListAllBookings,
    RecordPayment,
}

impl Operation {
    /// The capability table. `None` means any registered user may attempt it.
    #[must_use]
    pub const fn required_permission(self) -> Option<Permission> {
        match self {
            Self::CreateVehicle | Self::UpdateVehicle | Self::DeleteVehicle => {
                Some(Permission::ManageVehicles)
            }
            Self::UpdateSeat | Self::DeleteSeat => Some(Permission::ManageSeats),
            Self::CreateTrip | Self::UpdateTrip | Self::DeleteTrip => Some(Permission::ManageTrips),
            Self::CreateCity => Some(Permission::ManageCities),
            Self::ListAllBookings => Some(Permission::ViewAllBookings),
            Self::CreateBooking
            | Self::CancelBooking
            | Self::DeleteBooking
            | Self::ViewBooking
            | Self::RecordPayment => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateVehicle => "create vehicles",
            Self::UpdateVehicle => "update vehicles",
            Self::DeleteVehicle => "delete vehicles",
            Self::UpdateSeat => "edit seats",
            Self::DeleteSeat => "delete seats",
            Self::CreateTrip => "create trips",
            Self::UpdateTrip => "update trips",
            Self::DeleteTrip => "delete trips",
            Self::CreateCity => "create cities",
            Self::CreateBooking => "create bookings",
            Self::CancelBooking => "cancel this booking",
            Self::DeleteBooking => "delete this booking",
            Self::ViewBooking => "view this booking",
            Self::ListAllBookings => "list all bookings",
            Self::RecordPayment => "record payments",
        };
        f.write_str(name)
    }
}

/// Permissions granted by a role.
#[must_use]
pub const fn role_permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::Customer | Role::Driver => &[],
        Role::Manager => &[
            Permission::ViewAllBookings,
            Permission::ManageTrips,
            Permission::ManageCities,
        ],
        Role::Admin => &[
            Permission::ViewAllBookings,
            Permission::ManageTrips,
            Permission::ManageVehicles,
            Permission::ManageSeats,
            Permission::ManageCities,
        ],
    }
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Calling user's id
    pub user_id: i64,
    /// Calling user's role
    pub role: Role,
}

impl Actor {
    /// Builds an actor.
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// True when the actor's role grants `permission`.
    #[must_use]
    pub fn has(&self, permission: Permission) -> bool {
        role_permissions(self.role).contains(&permission)
    }
}

impl From<&user::Model> for Actor {
    fn from(user: &user::Model) -> Self {
        Self::new(user.id, user.role)
    }
}

/// Checks the capability table for `op`.
pub fn authorize(actor: &Actor, op: Operation) -> Result<()> {
    match op.required_permission() {
        Some(permission) if !actor.has(permission) => Err(Error::PermissionDenied {
            operation: op.to_string(),
        }),
        _ => Ok(()),
    }
}

/// True when `actor` made `booking`.
#[must_use]
pub const fn owns_booking(actor: &Actor, booking: &booking::Model) -> bool {
    booking.user_id == actor.user_id
}

/// True when `actor` is the assigned driver of `trip`.
#[must_use]
pub fn drives_trip(actor: &Actor, trip: &trip::Model) -> bool {
    trip.driver_id == Some(actor.user_id)
}

/// Owner, or holder of [`Permission::ViewAllBookings`]; otherwise `PermissionDenied` for `op`.
pub fn authorize_booking(actor: &Actor, booking: &booking::Model, op: Operation) -> Result<()> {
    authorize(actor, op)?;
    if owns_booking(actor, booking) || actor.has(Permission::ViewAllBookings) {
        Ok(())
    } else {
        Err(Error::PermissionDenied {
            operation: op.to_string(),
        })
    }
}

/// Trip edits are open to trip managers and to the trip's own driver.
pub fn authorize_trip(actor: &Actor, trip: &trip::Model, op: Operation) -> Result<()> {
    if drives_trip(actor, trip) {
        return Ok(());
    }
    authorize(actor, op)
}
