/// Database models
///
/// # Models
///
/// Auth database:
/// - `user`: Accounts
/// - `session`: Server-side login sessions
/// - `refresh_token`: Hashed refresh tokens with rotation links
/// - `login_attempt`: Login audit trail
///
/// Task database:
/// - `category`: Per-user task categories
/// - `task`: Tasks with status transitions
///
/// Model functions take either a `&PgPool` or any `PgExecutor`, so
/// multi-step writes can run inside one transaction.

pub mod category;
pub mod login_attempt;
pub mod refresh_token;
pub mod session;
pub mod task;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Deserializes a present field as `Some`, including an explicit `null`
///
/// Paired with `#[serde(default)]` on an `Option<Option<T>>` field this
/// tells "absent" (`None`) apart from "set to null" (`Some(None)`).
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
