//! In-process [`IdentityStore`] for tests. Records are kept as BSON documents and
//! updates go through the same dotted `$set`/`$unset` paths MongoDB applies.

use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::db::{IdentityStore, UserUpdate};
use crate::errors::{AppError, Result};
use crate::models::{User, VerificationStatus};

#[derive(Default)]
pub struct MemoryIdentityStore {
    docs: Mutex<Vec<Document>>,
    writes: AtomicUsize,
}

fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

fn unset_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inserts and matched updates performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn raw(&self, id: &ObjectId) -> Option<Document> {
        let docs = self.docs.lock().unwrap();
        docs.iter()
            .find(|d| d.get_object_id("_id").ok() == Some(*id))
            .cloned()
    }

    fn find_where(&self, pred: impl Fn(&Document) -> bool) -> Result<Option<User>> {
        let docs = self.docs.lock().unwrap();
        match docs.iter().find(|d| pred(d)) {
            Some(doc) => Ok(Some(bson::from_document(doc.clone())?)),
            None => Ok(None),
        }
    }
}

#[rocket::async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        self.find_where(|d| d.get_object_id("_id").ok() == Some(*id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_where(|d| d.get_str("email").ok() == Some(email))
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>> {
        self.find_where(|d| d.get_str("resetPasswordToken").ok() == Some(token_hash))
    }

    async fn insert(&self, user: &User) -> Result<ObjectId> {
        let mut docs = self.docs.lock().unwrap();
        if docs.iter().any(|d| d.get_str("email").ok() == Some(user.email.as_str())) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let id = user.id.unwrap_or_else(ObjectId::new);
        let mut doc = bson::to_document(user)?;
        doc.insert("_id", id);
        docs.push(doc);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update(&self, id: &ObjectId, update: UserUpdate) -> Result<bool> {
        let mut docs = self.docs.lock().unwrap();
        let Some(doc) = docs
            .iter_mut()
            .find(|d| d.get_object_id("_id").ok() == Some(*id))
        else {
            return Ok(false);
        };

        for (path, value) in update.set {
            set_path(doc, &path, value);
        }
        for path in &update.unset {
            unset_path(doc, path);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn list_by_status(
        &self,
        status: Option<VerificationStatus>,
        skip: u64,
        limit: i64,
    ) -> Result<(Vec<User>, u64)> {
        let docs = self.docs.lock().unwrap().clone();
        let mut users = docs
            .into_iter()
            .map(bson::from_document::<User>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        users.retain(|u| {
            u.verification.submitted_at.is_some()
                && status.is_none_or(|s| u.verification.status == s)
        });
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = users.len() as u64;
        let page = users
            .into_iter()
            .skip(skip as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_dotted_set_keeps_siblings() {
        let mut doc = doc! { "verification": { "documents": { "idDocument": "/uploads/a.png" }, "status": "pending" } };
        set_path(&mut doc, "verification.personal", Bson::Document(doc! { "firstName": "Ada" }));
        set_path(&mut doc, "verification.status", Bson::String("approved".to_string()));
        assert_eq!(
            doc,
            doc! { "verification": {
                "documents": { "idDocument": "/uploads/a.png" },
                "status": "approved",
                "personal": { "firstName": "Ada" },
            } }
        );
    }

    #[test]
    fn test_dotted_unset() {
        let mut doc = doc! { "a": 1, "verification": { "rejectionReason": "blurry", "status": "pending" } };
        unset_path(&mut doc, "verification.rejectionReason");
        unset_path(&mut doc, "a");
        unset_path(&mut doc, "missing.path");
        assert_eq!(doc, doc! { "verification": { "status": "pending" } });
    }
}
