pub mod admin;
pub mod auth;
pub mod verification;

use validator::Validate;

use crate::errors::AppError;
use crate::utils::ApiError;

/// Runs the DTO's `validator` rules, reporting the first failure as a 400.
pub(crate) fn validated<T: Validate>(dto: &T) -> Result<(), ApiError> {
    dto.validate().map_err(|e| ApiError::from(AppError::from(e)))
}
