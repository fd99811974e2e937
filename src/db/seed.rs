use log::{info, warn};

use crate::config::AppConfig;
use crate::db::IdentityStore;
use crate::errors::Result;
use crate::models::{Role, User};

#[derive(Debug, PartialEq, Eq)]
pub enum SeedOutcome {
    Skipped,
    AlreadyExists,
    Created,
}

/// Creates the configured admin account once. Re-running is a no-op.
pub async fn ensure_admin_user(store: &dyn IdentityStore, config: &AppConfig) -> Result<SeedOutcome> {
    let (Some(email), Some(password)) = (config.admin_email.as_deref(), config.admin_password.as_deref()) else {
        warn!("[Admin seed] ADMIN_EMAIL/ADMIN_PASSWORD not set. Skipping admin seeding.");
        return Ok(SeedOutcome::Skipped);
    };

    if store.find_by_email(email).await?.is_some() {
        info!("[Admin seed] Admin user already exists: {}", email);
        return Ok(SeedOutcome::AlreadyExists);
    }

    let mut admin = User::new(&config.admin_name, email, &config.admin_phone, Role::Admin);
    admin.set_password(password)?;
    admin.is_verified = true;
    admin.email_verified = true;

    store.insert(&admin).await?;
    info!("[Admin seed] Admin user created: {}", email);

    Ok(SeedOutcome::Created)
}
