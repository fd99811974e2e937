use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::oid::ObjectId;

use crate::db::Store;
use crate::guards::AdminGuard;
use crate::models::{ReviewVerificationDto, VerificationRecordResponse, VerificationResponse, VerificationStatus};
use crate::services::VerificationService;
use crate::utils::{ApiError, ApiResponse};

fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid user id"))
}

// ==================== VERIFICATION REVIEW ROUTES ====================

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct VerificationListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[openapi(tag = "Admin - Verifications")]
#[get("/admin/verifications?<query..>")]
pub async fn list_verifications(
    store: &State<Store>,
    _admin: AdminGuard,
    query: VerificationListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            VerificationStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request("Status must be pending, approved or rejected"))?,
        ),
        None => None,
    };

    let page = VerificationService::new(store.inner().as_ref())
        .list(status, query.page, query.limit)
        .await
        .map_err(|e| ApiError::from_app(e, "Server error listing verifications"))?;

    let pages = page.pages();
    let verifications: Vec<VerificationRecordResponse> =
        page.users.into_iter().map(VerificationRecordResponse::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "verifications": verifications,
        "pagination": {
            "page": page.page,
            "limit": page.limit,
            "total": page.total,
            "pages": pages,
        }
    }))))
}

#[openapi(tag = "Admin - Verifications")]
#[get("/admin/verifications/<user_id>")]
pub async fn get_verification(
    store: &State<Store>,
    _admin: AdminGuard,
    user_id: String,
) -> Result<Json<ApiResponse<VerificationRecordResponse>>, ApiError> {
    let id = parse_id(&user_id)?;

    let user = VerificationService::new(store.inner().as_ref())
        .get(&id)
        .await
        .map_err(|e| ApiError::from_app(e, "Server error retrieving verification"))?;

    Ok(Json(ApiResponse::success(VerificationRecordResponse::from(user))))
}

#[openapi(tag = "Admin - Verifications")]
#[put("/admin/verifications/<user_id>/review", data = "<dto>")]
pub async fn review_verification(
    store: &State<Store>,
    admin: AdminGuard,
    user_id: String,
    dto: Json<ReviewVerificationDto>,
) -> Result<Json<ApiResponse<VerificationResponse>>, ApiError> {
    let id = parse_id(&user_id)?;
    let dto = dto.into_inner();

    let verification = VerificationService::new(store.inner().as_ref())
        .review(&id, &admin.auth.user_id, &dto.status, dto.rejection_reason)
        .await
        .map_err(|e| ApiError::from_app(e, "Server error reviewing verification"))?;

    Ok(Json(ApiResponse::success_with_message(
        format!("Verification {}", verification.status.as_str()),
        VerificationResponse::from(verification),
    )))
}

#[cfg(test)]
mod tests {
    use crate::db::IdentityStore;
    use crate::routes::testing::*;
    use rocket::http::Status;
    use serde_json::Value;

    async fn submit(app: &TestApp, token: &str) {
        let res = app
            .client
            .post("/api/verification")
            .header(bearer(token))
            .json(&serde_json::json!({ "firstName": "Ada", "bvnNumber": "22212345678" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn test_non_admin_is_forbidden() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ada@example.com").await;

        let res = app
            .client
            .get("/api/admin/verifications")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_queue_lists_submissions_with_pagination() {
        let app = TestApp::new().await;
        let (_, admin) = app.admin("admin@example.com").await;
        let (_, ada) = app.user("ada@example.com").await;
        app.user("idle@example.com").await;
        submit(&app, &ada).await;

        let res = app
            .client
            .get("/api/admin/verifications?status=pending&limit=5")
            .header(bearer(&admin))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["data"]["pagination"]["total"], 1);
        assert_eq!(body["data"]["pagination"]["limit"], 5);
        assert_eq!(body["data"]["verifications"][0]["email"], "ada@example.com");
        assert!(body["data"]["verifications"][0].get("password").is_none());

        let res = app
            .client
            .get("/api/admin/verifications?status=unknown")
            .header(bearer(&admin))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);

        let res = app
            .client
            .get(format!("/api/admin/verifications?page={}&limit=100", i64::MAX))
            .header(bearer(&admin))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["data"]["verifications"].as_array().unwrap().len(), 0);
        assert_eq!(body["data"]["pagination"]["total"], 1);
    }

    #[rocket::async_test]
    async fn test_reject_then_approve() {
        let app = TestApp::new().await;
        let (admin_id, admin) = app.admin("admin@example.com").await;
        let (ada_id, ada) = app.user("ada@example.com").await;
        submit(&app, &ada).await;

        let uri = format!("/api/admin/verifications/{}/review", ada_id.to_hex());
        let res = app
            .client
            .put(uri.clone())
            .header(bearer(&admin))
            .json(&serde_json::json!({ "status": "rejected", "rejectionReason": "Document unreadable" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["data"]["status"], "rejected");
        assert_eq!(body["data"]["rejectionReason"], "Document unreadable");
        assert_eq!(body["data"]["reviewedBy"], admin_id.to_hex());

        let res = app
            .client
            .put(uri)
            .header(bearer(&admin))
            .json(&serde_json::json!({ "status": "approved" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);

        let user = app.store.find_by_id(&ada_id).await.unwrap().unwrap();
        assert!(user.is_verified);
        assert!(user.verification.rejection_reason.is_none());

        let res = app
            .client
            .get("/api/verification/status")
            .header(bearer(&ada))
            .dispatch()
            .await;
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["data"]["status"], "approved");
        assert_eq!(body["data"]["isVerified"], true);
        assert!(body["data"]["reviewedAt"].is_string());
    }

    #[rocket::async_test]
    async fn test_review_validates_input() {
        let app = TestApp::new().await;
        let (_, admin) = app.admin("admin@example.com").await;
        let (ada_id, _) = app.user("ada@example.com").await;

        let res = app
            .client
            .put("/api/admin/verifications/not-an-id/review")
            .header(bearer(&admin))
            .json(&serde_json::json!({ "status": "approved" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);

        // Never submitted.
        let res = app
            .client
            .put(format!("/api/admin/verifications/{}/review", ada_id.to_hex()))
            .header(bearer(&admin))
            .json(&serde_json::json!({ "status": "approved" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);

        let res = app
            .client
            .get(format!("/api/admin/verifications/{}", mongodb::bson::oid::ObjectId::new().to_hex()))
            .header(bearer(&admin))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::NotFound);
    }
}
