mod mongo;
pub mod seed;
mod store;

#[cfg(test)]
mod memory;

pub use mongo::MongoIdentityStore;
pub use store::{IdentityStore, Store, UserUpdate};

#[cfg(test)]
pub use memory::MemoryIdentityStore;

use log::{error, info};
use mongodb::Client;
use rocket::fairing::AdHoc;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::Result;

const FALLBACK_DATABASE: &str = "finance-teque";

/// Connects, prepares indexes, seeds the admin and manages the [`Store`].
pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("MongoDB", |rocket| async {
        let Some(config) = rocket.state::<AppConfig>().cloned() else {
            error!("✗ AppConfig must be managed before the MongoDB fairing");
            return Err(rocket);
        };

        match connect(&config).await {
            Ok(store) => {
                info!("✓ MongoDB connected successfully");
                Ok(rocket.manage(store))
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                Err(rocket)
            }
        }
    })
}

async fn connect(config: &AppConfig) -> Result<Store> {
    let client = Client::with_uri_str(&config.mongodb_uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1}, None)
        .await?;

    let database = client
        .default_database()
        .unwrap_or_else(|| client.database(FALLBACK_DATABASE));

    let store = MongoIdentityStore::new(&database);
    store.ensure_indexes().await?;

    if let Err(e) = seed::ensure_admin_user(&store, config).await {
        error!("[Admin seed] Failed: {}", e);
    }

    Ok(Arc::new(store))
}
