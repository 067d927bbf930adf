//! Payment records. No gateway: a payment is an amount the user has paid, attached to
//! at most one booking.

use crate::{
    core::access::{self, Actor, Operation},
    entities::{Payment, payment},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use tracing::info;

/// Records a payment made by `actor`.
pub async fn record_payment<C>(
    db: &C,
    actor: &Actor,
    amount: Decimal,
    payment_method: &str,
) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    access::authorize(actor, Operation::RecordPayment)?;
    if amount <= Decimal::ZERO {
        return Err(Error::validation("amount", "payment amount must be positive"));
    }
    let method = payment_method.trim();
    if method.is_empty() {
        return Err(Error::validation("payment_method", "payment method is required"));
    }

    let payment = payment::ActiveModel {
        user_id: Set(actor.user_id),
        amount: Set(amount),
        payment_method: Set(method.to_string()),
        payment_datetime: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(payment_id = payment.id, %amount, "Payment recorded");
    Ok(payment)
}

/// Finds a payment by id.
pub async fn get_payment<C>(db: &C, payment_id: i64) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    Payment::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or(Error::PaymentNotFound { payment_id })
}
