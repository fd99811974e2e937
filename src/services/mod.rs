pub mod jwt;
pub mod mail;
pub mod otp;
pub mod password;
pub mod templates;
pub mod upload;
pub mod verification;

pub use jwt::JwtService;
pub use mail::MailService;
pub use upload::UploadPipeline;
pub use verification::VerificationService;
