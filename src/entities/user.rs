//! User entity - A customer, driver or staff member identified by phone number.
//!
//! `chat_id` links the user to the chat client and is where booking notifications go.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a user; grants a fixed permission set (see `core::access`).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Books seats for themselves
    #[sea_orm(string_value = "customer")]
    Customer,
    /// Drives trips; owns the trips assigned to them
    #[sea_orm(string_value = "driver")]
    Driver,
    /// Schedules trips and sees all bookings
    #[sea_orm(string_value = "manager")]
    Manager,
    /// Full access
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Normalized phone number, e.g. `+79111111111`
    #[sea_orm(unique)]
    pub phone_number: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Role determining permissions
    pub role: Role,
    /// Linked chat identity for notifications
    #[sea_orm(unique)]
    pub chat_id: Option<String>,
    /// Registration timestamp
    pub date_joined: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many bookings
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
    /// One user has many payments
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
