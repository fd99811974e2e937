pub mod auth;
pub mod user;
pub mod verification;

pub use auth::*;
pub use user::*;
pub use verification::*;

use mongodb::bson::DateTime;

pub fn to_utc(dt: DateTime) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}
