use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use std::sync::Arc;

use crate::errors::Result;
use crate::models::{User, VerificationStatus};

/// A partial update addressed by dotted paths, applied atomically to one record.
#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub set: Document,
    pub unset: Vec<String>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: &str, value: impl Into<Bson>) -> Self {
        self.set.insert(path, value.into());
        self
    }

    pub fn unset(mut self, path: &str) -> Self {
        self.unset.push(path.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Update document in MongoDB operator form.
    pub fn to_document(&self) -> Document {
        let mut update = doc! {};
        if !self.set.is_empty() {
            update.insert("$set", self.set.clone());
        }
        if !self.unset.is_empty() {
            let mut unset = Document::new();
            for path in &self.unset {
                unset.insert(path.as_str(), "");
            }
            update.insert("$unset", unset);
        }
        update
    }
}

/// Persistence seam for identity records.
#[rocket::async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>>;

    /// Fails with `Conflict` when the email is already taken.
    async fn insert(&self, user: &User) -> Result<ObjectId>;

    /// Returns `false` when no record has this id.
    async fn update(&self, id: &ObjectId, update: UserUpdate) -> Result<bool>;

    /// Submitted verifications, newest first. Returns the page and the total number of matches.
    async fn list_by_status(
        &self,
        status: Option<VerificationStatus>,
        skip: u64,
        limit: i64,
    ) -> Result<(Vec<User>, u64)>;
}

pub type Store = Arc<dyn IdentityStore>;
