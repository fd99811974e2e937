use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::errors::{AppError, Result};
use crate::models::{to_utc, Verification};
use crate::services::password;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Investor,
    Startup,
    Admin,
    /// Stored as `"none"`: the account exists but has not picked a role yet.
    #[default]
    #[serde(rename = "none")]
    Unassigned,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Investor => "investor",
            Role::Startup => "startup",
            Role::Admin => "admin",
            Role::Unassigned => "none",
        }
    }
}

/// Identity record, one document per email in the `users` collection.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// bcrypt hash, written only through [`User::set_password`].
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verification_code_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verification_expires: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verification_last_sent_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_password_expire: Option<DateTime>,
    #[serde(default)]
    pub verification: Verification,
    pub created_at: DateTime,
}

impl User {
    pub fn new(name: &str, email: &str, phone: &str, role: Role) -> Self {
        User {
            id: None,
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            phone: phone.trim().to_string(),
            password: String::new(),
            role,
            is_verified: false,
            email_verified: false,
            email_verification_code_hash: None,
            email_verification_expires: None,
            email_verification_last_sent_at: None,
            reset_password_token: None,
            reset_password_expire: None,
            verification: Verification::default(),
            created_at: DateTime::now(),
        }
    }

    pub fn set_password(&mut self, plain: &str) -> Result<()> {
        self.password = password::hash(plain)?;
        Ok(())
    }

    pub fn match_password(&self, plain: &str) -> Result<bool> {
        password::verify(plain, &self.password)
    }

    pub fn object_id(&self) -> Result<ObjectId> {
        self.id
            .ok_or_else(|| AppError::Persistence("User record has no id".to_string()))
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub is_verified: bool,
    pub email_verified: bool,
    pub verification_status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            is_verified: user.is_verified,
            email_verified: user.email_verified,
            verification_status: user.verification.status.as_str().to_string(),
            created_at: to_utc(user.created_at),
        }
    }
}
