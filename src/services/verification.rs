use log::info;
use mongodb::bson::{self, oid::ObjectId, DateTime};

use crate::db::{IdentityStore, UserUpdate};
use crate::errors::{AppError, Result};
use crate::models::{
    Documents, User, Verification, VerificationDetails, VerificationStatus,
    VerificationStatusResponse,
};
use crate::services::upload::{DocumentSet, DocumentSource, UploadPipeline};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// One page of the admin review queue.
pub struct VerificationPage {
    pub users: Vec<User>,
    pub page: i64,
    pub limit: i64,
    pub total: u64,
}

impl VerificationPage {
    pub fn pages(&self) -> i64 {
        (self.total as f64 / self.limit as f64).ceil() as i64
    }
}

/// Submission, document upload, status and review of the embedded verification record.
///
/// Every write is a partial `$set` on `verification.*` paths, so submission and
/// document upload never overwrite each other's fields.
pub struct VerificationService<'a> {
    store: &'a dyn IdentityStore,
}

impl<'a> VerificationService<'a> {
    pub fn new(store: &'a dyn IdentityStore) -> Self {
        VerificationService { store }
    }

    async fn load(&self, id: &ObjectId) -> Result<User> {
        self.store.find_by_id(id).await?.ok_or(AppError::NotFound)
    }

    async fn apply(&self, id: &ObjectId, update: UserUpdate) -> Result<()> {
        if self.store.update(id, update).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    pub async fn submit(&self, id: &ObjectId, details: VerificationDetails) -> Result<Verification> {
        let user = self.load(id).await?;
        let now = DateTime::now();

        let update = UserUpdate::new()
            .set("verification.personal", bson::to_bson(&details.personal)?)
            .set("verification.nextOfKin", bson::to_bson(&details.next_of_kin)?)
            .set("verification.bankDetails", bson::to_bson(&details.bank_details)?)
            .set("verification.status", VerificationStatus::Pending.as_str())
            .set("verification.submittedAt", now);
        self.apply(id, update).await?;

        let mut verification = user.verification;
        verification.personal = details.personal;
        verification.next_of_kin = details.next_of_kin;
        verification.bank_details = details.bank_details;
        verification.status = VerificationStatus::Pending;
        verification.submitted_at = Some(now);

        info!("Verification submitted for user {}", id.to_hex());
        Ok(verification)
    }

    /// Validates the whole set before touching the store or the disk.
    pub async fn upload_documents<D: DocumentSource>(
        &self,
        uploads: &UploadPipeline,
        id: &ObjectId,
        files: DocumentSet<D>,
    ) -> Result<Documents> {
        uploads.validate_set(&files)?;
        self.load(id).await?;

        let documents = uploads.store_set(files, Some(id)).await?;
        self.apply(id, UserUpdate::new().set("verification.documents", bson::to_bson(&documents)?))
            .await?;

        info!("Verification documents uploaded for user {}", id.to_hex());
        Ok(documents)
    }

    pub async fn status(&self, id: &ObjectId) -> Result<VerificationStatusResponse> {
        let user = self.load(id).await?;
        Ok(VerificationStatusResponse::from(&user))
    }

    pub async fn get(&self, id: &ObjectId) -> Result<User> {
        self.load(id).await
    }

    pub async fn review(
        &self,
        target: &ObjectId,
        reviewer: &ObjectId,
        decision: &str,
        reason: Option<String>,
    ) -> Result<Verification> {
        let status = match VerificationStatus::parse(decision) {
            Some(s @ (VerificationStatus::Approved | VerificationStatus::Rejected)) => s,
            _ => {
                return Err(AppError::Validation(
                    "Status must be 'approved' or 'rejected'".to_string(),
                ));
            }
        };

        let user = self.load(target).await?;
        if user.verification.submitted_at.is_none() {
            return Err(AppError::Validation("Verification has not been submitted".to_string()));
        }

        let now = DateTime::now();
        let approved = status == VerificationStatus::Approved;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let mut update = UserUpdate::new()
            .set("verification.status", status.as_str())
            .set("verification.reviewedAt", now)
            .set("verification.reviewedBy", *reviewer)
            .set("isVerified", approved);
        update = match (&reason, approved) {
            (Some(r), false) => update.set("verification.rejectionReason", r.as_str()),
            _ => update.unset("verification.rejectionReason"),
        };
        self.apply(target, update).await?;

        let mut verification = user.verification;
        verification.status = status;
        verification.reviewed_at = Some(now);
        verification.reviewed_by = Some(*reviewer);
        verification.rejection_reason = if approved { None } else { reason };

        info!(
            "Verification for user {} {} by {}",
            target.to_hex(),
            status.as_str(),
            reviewer.to_hex()
        );
        Ok(verification)
    }

    pub async fn list(&self, status: Option<VerificationStatus>, page: Option<i64>, limit: Option<i64>) -> Result<VerificationPage> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let skip = page.saturating_sub(1).saturating_mul(limit) as u64;

        let (users, total) = self.store.list_by_status(status, skip, limit).await?;
        Ok(VerificationPage { users, page, limit, total })
    }
}
