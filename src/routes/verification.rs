use rocket::data::Capped;
use rocket::form::{self, DataField, Errors, Form, FromForm, FromFormField, Options, ValueField};
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::Store;
use crate::guards::AuthGuard;
use crate::models::{Documents, SubmitVerificationDto, VerificationResponse, VerificationStatusResponse};
use crate::services::upload::DocumentSet;
use crate::services::{UploadPipeline, VerificationService};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Verification")]
#[post("/verification", data = "<dto>")]
pub async fn submit_verification(
    store: &State<Store>,
    auth: AuthGuard,
    dto: Json<SubmitVerificationDto>,
) -> Result<Json<ApiResponse<VerificationResponse>>, ApiError> {
    const CONTEXT: &str = "Server error during verification submission";

    let details = dto
        .into_inner()
        .into_details()
        .map_err(|e| ApiError::from_app(e, CONTEXT))?;

    let verification = VerificationService::new(store.inner().as_ref())
        .submit(&auth.user_id, details)
        .await
        .map_err(|e| ApiError::from_app(e, CONTEXT))?;

    Ok(Json(ApiResponse::success_with_message(
        "Verification details submitted",
        VerificationResponse::from(verification),
    )))
}

/// Every file part of a multipart body, in arrival order, with its field name.
///
/// Files are captured with `Capped` so a part cut off at the `file` limit still
/// reaches the upload pipeline, which reports it as too large.
pub struct DocumentUploadForm<'r> {
    pub files: Vec<(String, Capped<TempFile<'r>>)>,
}

pub struct DocumentUploadContext<'r> {
    files: Vec<(String, Capped<TempFile<'r>>)>,
    errors: Errors<'r>,
}

#[rocket::async_trait]
impl<'r> FromForm<'r> for DocumentUploadForm<'r> {
    type Context = DocumentUploadContext<'r>;

    fn init(_opts: Options) -> Self::Context {
        DocumentUploadContext {
            files: Vec::new(),
            errors: Errors::new(),
        }
    }

    // Plain text fields carry no document.
    fn push_value(_ctxt: &mut Self::Context, _field: ValueField<'r>) {}

    async fn push_data(ctxt: &mut Self::Context, field: DataField<'r, '_>) {
        let name = field.name.source().to_string();
        match <Capped<TempFile<'r>> as FromFormField<'r>>::from_data(field).await {
            Ok(file) => ctxt.files.push((name, file)),
            Err(e) => ctxt.errors.extend(e),
        }
    }

    fn finalize(ctxt: Self::Context) -> form::Result<'r, Self> {
        if ctxt.errors.is_empty() {
            Ok(DocumentUploadForm { files: ctxt.files })
        } else {
            Err(ctxt.errors)
        }
    }
}

// Mounted with `routes!`: multipart file forms have no OpenAPI schema.
#[post("/verification/documents", data = "<form>")]
pub async fn upload_documents(
    store: &State<Store>,
    uploads: &State<UploadPipeline>,
    auth: AuthGuard,
    form: Form<DocumentUploadForm<'_>>,
) -> Result<Json<ApiResponse<Documents>>, ApiError> {
    const CONTEXT: &str = "Server error during document upload";

    let files = DocumentSet::from_fields(form.into_inner().files)
        .map_err(|e| ApiError::from_app(e, CONTEXT))?;

    let documents = VerificationService::new(store.inner().as_ref())
        .upload_documents(uploads.inner(), &auth.user_id, files)
        .await
        .map_err(|e| ApiError::from_app(e, CONTEXT))?;

    Ok(Json(ApiResponse::success_with_message("Documents uploaded", documents)))
}

#[openapi(tag = "Verification")]
#[get("/verification/status")]
pub async fn get_verification_status(
    store: &State<Store>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<VerificationStatusResponse>>, ApiError> {
    let status = VerificationService::new(store.inner().as_ref())
        .status(&auth.user_id)
        .await
        .map_err(|e| ApiError::from_app(e, "Server error retrieving verification status"))?;

    Ok(Json(ApiResponse::success(status)))
}
