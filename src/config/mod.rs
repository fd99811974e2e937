use log::warn;
use rocket::data::{Limits, ToByteUnit};
use rocket::figment::{self, Figment, providers::{Env, Format, Toml}};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Environment variables read verbatim (no prefix) on top of `Rocket.toml`.
const ENV_KEYS: &[&str] = &[
    "MONGODB_URI",
    "JWT_SECRET",
    "JWT_EXPIRE",
    "ADMIN_EMAIL",
    "ADMIN_PASSWORD",
    "ADMIN_NAME",
    "ADMIN_PHONE",
    "SENDGRID_API_KEY",
    "SENDGRID_FROM_EMAIL",
    "MAIL_HOST",
    "MAIL_PORT",
    "MAIL_USER",
    "MAIL_PASSWORD",
    "APP_URL",
    "ASSET_BASE_URL",
    "LOGO_URL",
    "UPLOAD_DIR",
];

pub const DEFAULT_JWT_SECRET: &str = "somesecret";
const DEFAULT_JWT_EXPIRY_SECS: i64 = 30 * 24 * 60 * 60;

/// Process-wide settings, loaded once in `main` and handed to Rocket as managed state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mongodb_uri: String,
    pub jwt_secret: String,
    pub jwt_expire: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub admin_name: String,
    pub admin_phone: String,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: String,
    pub mail_host: Option<String>,
    pub mail_port: u16,
    pub mail_user: Option<String>,
    pub mail_password: Option<String>,
    pub app_url: String,
    pub asset_base_url: Option<String>,
    pub logo_url: Option<String>,
    pub upload_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            mongodb_uri: "mongodb://localhost:27017/finance-teque".to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expire: "30d".to_string(),
            admin_email: None,
            admin_password: None,
            admin_name: "System Admin".to_string(),
            admin_phone: "0000000000".to_string(),
            sendgrid_api_key: None,
            sendgrid_from_email: "support@financetequecv.com".to_string(),
            mail_host: None,
            mail_port: 587,
            mail_user: None,
            mail_password: None,
            app_url: "http://localhost:5173".to_string(),
            asset_base_url: None,
            logo_url: None,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl AppConfig {
    fn profile() -> String {
        env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string())
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("Rocket.toml").nested())
            .select(Self::profile())
            .merge(Env::raw().only(ENV_KEYS))
    }

    /// Reads `Rocket.toml` and the environment. Any key that fails to parse is an error.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        let config = figment.extract::<AppConfig>()?;

        if config.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("JWT_SECRET not set. Using the built-in development secret.");
        }
        if config.sendgrid_api_key.is_none() && config.mail_host.is_none() {
            warn!("SENDGRID_API_KEY not set. Emails will not be delivered.");
        }

        Ok(config)
    }

    /// Rocket's own figment with body limits wide enough for three 5 MiB documents.
    pub fn rocket_figment() -> Figment {
        rocket::Config::figment().merge((
            "limits",
            Limits::default()
                .limit("file", 8.mebibytes())
                .limit("data-form", 32.mebibytes()),
        ))
    }

    pub fn jwt_expiry_secs(&self) -> i64 {
        parse_duration_secs(&self.jwt_expire).unwrap_or_else(|| {
            warn!("Unrecognised JWT_EXPIRE '{}', using 30d", self.jwt_expire);
            DEFAULT_JWT_EXPIRY_SECS
        })
    }

    pub fn asset_base_url(&self) -> &str {
        self.asset_base_url.as_deref().unwrap_or(&self.app_url)
    }

    pub fn logo_url(&self) -> String {
        match &self.logo_url {
            Some(url) => url.clone(),
            None => format!("{}/logo.png", self.asset_base_url().trim_end_matches('/')),
        }
    }

    pub fn verification_upload_root(&self) -> PathBuf {
        self.upload_dir.join("verification")
    }

    pub fn is_development() -> bool {
        Self::profile() == "development"
    }
}

/// Parses `30d`, `12h`, `15m`, `90s` or a bare number of seconds.
pub fn parse_duration_secs(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c.to_ascii_lowercase()),
        _ => (raw, 's'),
    };

    let value: i64 = digits.trim().parse().ok()?;
    if value <= 0 {
        return None;
    }

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };

    value.checked_mul(multiplier)
}
