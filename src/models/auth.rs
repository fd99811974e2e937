use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

use crate::models::{Role, UserResponse};

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct RegisterDto {
    #[validate(length(min = 1, message = "Please add a name"))]
    pub name: String,
    #[validate(email(message = "Please add a valid email"))]
    pub email: String,
    #[validate(length(min = 7, message = "Please add a phone number"))]
    pub phone: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct LoginDto {
    #[validate(email(message = "Please add a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Please add a password"))]
    pub password: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectRoleDto {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct VerifyEmailDto {
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ForgotPasswordDto {
    #[validate(email(message = "Please add a valid email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ResetPasswordDto {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}
