use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found")]
    NotFound,

    #[error("Invalid file type. Allowed: PDF, JPG, PNG")]
    InvalidFileType,

    #[error("File too large. Maximum size is 5MB per file")]
    FileTooLarge,

    #[error("Too many files. Upload one file per document slot (3 max)")]
    TooManyFiles,

    #[error("All required documents must be uploaded")]
    MissingDocuments,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Database error: {0}")]
    Persistence(String),

    #[error("File storage error: {0}")]
    Storage(String),

    #[error("Email delivery failed: {0}")]
    Delivery(String),
}

impl AppError {
    /// Downstream failures; everything else is the caller's fault.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Persistence(_) | AppError::Storage(_) | AppError::Delivery(_)
        )
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for AppError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Persistence(format!("Password hashing failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(format!("Invalid token: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let first = err
            .field_errors()
            .into_iter()
            .flat_map(|(_, errors)| errors.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()));
        AppError::Validation(first.unwrap_or_else(|| err.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
