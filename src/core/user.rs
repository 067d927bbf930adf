//! User accounts and chat linking.

use crate::{
    entities::{Role, User, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::num::NonZeroU64;
use tracing::info;

/// Normalizes a phone number to `+` followed by 10 to 15 digits.
///
/// Spaces, dashes and parentheses are dropped; a leading `8` on an 11-digit number is
/// read as the `+7` country code.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let digits = if let Some(rest) = compact.strip_prefix('+') {
        rest.to_string()
    } else if compact.len() == 11 && compact.starts_with('8') {
        format!("7{}", &compact[1..])
    } else {
        compact
    };

    if !(10..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::validation(
            "phone_number",
            "expected + followed by 10 to 15 digits",
        ));
    }
    Ok(format!("+{digits}"))
}

/// Finds a user by id.
pub async fn get_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user: user_id.to_string(),
        })
}

/// Registers a user; the phone number must be unused.
pub async fn create_user(
    db: &DatabaseConnection,
    phone_number: &str,
    first_name: &str,
    last_name: &str,
    role: Role,
) -> Result<user::Model> {
    let phone = normalize_phone(phone_number)?;
    let existing = User::find()
        .filter(user::Column::PhoneNumber.eq(phone.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::validation(
            "phone_number",
            format!("{phone} is already registered"),
        ));
    }

    let user = user::ActiveModel {
        phone_number: Set(phone),
        first_name: Set(first_name.trim().to_string()),
        last_name: Set(last_name.trim().to_string()),
        role: Set(role),
        chat_id: Set(None),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = user.id, "User created");
    Ok(user)
}

/// Links a chat identity to a user. The chat id must be numeric and not linked elsewhere.
pub async fn link_chat(
    db: &DatabaseConnection,
    user_id: i64,
    chat_id: &str,
) -> Result<user::Model> {
    let chat_id = chat_id.trim();
    let is_numeric = !chat_id.is_empty() && chat_id.chars().all(|c| c.is_ascii_digit());
    if !is_numeric || chat_id.parse::<NonZeroU64>().is_err() {
        return Err(Error::validation(
            "chat_id",
            "chat id must be a non-zero number",
        ));
    }

    let user = get_user(db, user_id).await?;
    if let Some(other) = find_user_by_chat(db, chat_id).await? {
        if other.id == user.id {
            return Ok(other);
        }
        return Err(Error::validation(
            "chat_id",
            "this chat is already linked to another account",
        ));
    }

    let mut active: user::ActiveModel = user.into();
    active.chat_id = Set(Some(chat_id.to_string()));
    let updated = active.update(db).await?;
    info!(user_id, "Chat linked");
    Ok(updated)
}

/// Finds the user linked to a chat.
pub async fn find_user_by_chat(
    db: &DatabaseConnection,
    chat_id: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::ChatId.eq(chat_id))
        .one(db)
        .await
        .map_err(Into::into)
}
