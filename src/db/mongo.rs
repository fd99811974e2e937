use mongodb::bson::{doc, oid::ObjectId};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};

use crate::db::{IdentityStore, UserUpdate};
use crate::errors::{AppError, Result};
use crate::models::{User, VerificationStatus};

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoIdentityStore {
    users: Collection<User>,
}

impl MongoIdentityStore {
    pub fn new(db: &Database) -> Self {
        MongoIdentityStore {
            users: db.collection::<User>("users"),
        }
    }

    /// Unique email plus the admin queue index on review status.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        let review_queue = IndexModel::builder()
            .keys(doc! { "verification.status": 1, "createdAt": -1 })
            .build();

        self.users
            .create_indexes(vec![unique_email, review_queue], None)
            .await?;

        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[rocket::async_trait]
impl IdentityStore for MongoIdentityStore {
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "email": email }, None).await?)
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .find_one(doc! { "resetPasswordToken": token_hash }, None)
            .await?)
    }

    async fn insert(&self, user: &User) -> Result<ObjectId> {
        let result = self.users.insert_one(user, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict("User already exists".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Persistence("Inserted id is not an ObjectId".to_string()))
    }

    async fn update(&self, id: &ObjectId, update: UserUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(self.find_by_id(id).await?.is_some());
        }

        let result = self
            .users
            .update_one(doc! { "_id": id }, update.to_document(), None)
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn list_by_status(
        &self,
        status: Option<VerificationStatus>,
        skip: u64,
        limit: i64,
    ) -> Result<(Vec<User>, u64)> {
        let mut filter = doc! { "verification.submittedAt": { "$exists": true } };
        if let Some(status) = status {
            filter.insert("verification.status", status.as_str());
        }

        let find_options = FindOptions::builder()
            .skip(skip)
            .limit(limit)
            .sort(doc! { "createdAt": -1 })
            .build();

        let mut cursor = self.users.find(filter.clone(), find_options).await?;

        let mut users = Vec::new();
        while cursor.advance().await? {
            users.push(cursor.deserialize_current()?);
        }

        let total = self.users.count_documents(filter, None).await?;

        Ok((users, total))
    }
}
