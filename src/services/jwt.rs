use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub exp: i64,
    pub iat: i64,
}

/// Signs and checks session tokens with the process-wide secret.
pub struct JwtService {
    secret: String,
    expiry_secs: i64,
}

impl JwtService {
    pub fn new(secret: impl Into<String>, expiry_secs: i64) -> Self {
        JwtService {
            secret: secret.into(),
            expiry_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.jwt_expiry_secs())
    }

    pub fn generate_token(&self, user_id: &ObjectId) -> Result<String> {
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            sub: user_id.to_hex(),
            exp: now + self.expiry_secs,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Persistence(format!("Failed to sign token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    /// Verifies the token and parses its subject as a user id.
    pub fn user_id(&self, token: &str) -> Result<ObjectId> {
        let claims = self.verify_token(token)?;
        ObjectId::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".to_string()))
    }
}
