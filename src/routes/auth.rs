use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::DateTime;
use log::info;

use crate::db::{Store, UserUpdate};
use crate::errors::AppError;
use crate::guards::AuthGuard;
use crate::models::{
    AuthResponse, ForgotPasswordDto, LoginDto, RegisterDto, ResetPasswordDto, Role,
    SelectRoleDto, User, UserResponse, VerifyEmailDto,
};
use crate::routes::validated;
use crate::services::otp::{self, CodeCheck, IssuedCode, IssuedResetToken};
use crate::services::{JwtService, MailService};
use crate::utils::{ApiError, ApiResponse};

async fn current_user(store: &Store, auth: &AuthGuard) -> Result<User, ApiError> {
    store
        .find_by_id(&auth.user_id)
        .await
        .map_err(|e| ApiError::from_app(e, "Server error loading user"))?
        .ok_or_else(|| ApiError::not_found(AppError::NotFound.to_string()))
}

/// Stores a fresh code hash and mails the plain code.
async fn issue_code(store: &Store, mail: &MailService, user: &User) -> Result<(), ApiError> {
    let id = user.object_id().map_err(|e| ApiError::from_app(e, "Server error issuing code"))?;
    let issued = IssuedCode::new(DateTime::now());

    store
        .update(&id, issued.update())
        .await
        .map_err(|e| ApiError::from_app(e, "Server error issuing code"))?;

    mail.send_verification_code(&user.email, &issued.code);
    Ok(())
}

/// --------------------
/// Register
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<dto>")]
pub async fn register(
    store: &State<Store>,
    jwt: &State<JwtService>,
    mail: &State<MailService>,
    dto: Json<RegisterDto>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    validated(&*dto)?;

    let role = dto.role.unwrap_or_default();
    if role == Role::Admin {
        return Err(ApiError::bad_request("Role must be investor or startup"));
    }

    let mut user = User::new(&dto.name, &dto.email, &dto.phone, role);
    user.set_password(&dto.password)
        .map_err(|e| ApiError::from_app(e, "Server error during registration"))?;

    let id = store
        .insert(&user)
        .await
        .map_err(|e| ApiError::from_app(e, "Server error during registration"))?;
    user.id = Some(id);

    issue_code(store, mail, &user).await?;

    let token = jwt
        .generate_token(&id)
        .map_err(|e| ApiError::from_app(e, "Server error during registration"))?;

    info!("Registered user {}", user.email);

    Ok(Json(ApiResponse::success_with_message(
        "Registration successful. A verification code has been sent to your email",
        AuthResponse { token, user: UserResponse::from(&user) },
    )))
}

/// --------------------
/// Login
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    store: &State<Store>,
    jwt: &State<JwtService>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    validated(&*dto)?;

    let user = store
        .find_by_email(dto.email.trim())
        .await
        .map_err(|e| ApiError::from_app(e, "Server error during login"))?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let matches = user
        .match_password(&dto.password)
        .map_err(|e| ApiError::from_app(e, "Server error during login"))?;
    if !matches {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let id = user.object_id().map_err(|e| ApiError::from_app(e, "Server error during login"))?;
    let token = jwt
        .generate_token(&id)
        .map_err(|e| ApiError::from_app(e, "Server error during login"))?;

    Ok(Json(ApiResponse::success(AuthResponse {
        token,
        user: UserResponse::from(&user),
    })))
}

#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn me(
    store: &State<Store>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = current_user(store, &auth).await?;
    Ok(Json(ApiResponse::success(UserResponse::from(&user))))
}

/// --------------------
/// Select role
/// --------------------
#[openapi(tag = "Auth")]
#[put("/auth/role", data = "<dto>")]
pub async fn select_role(
    store: &State<Store>,
    auth: AuthGuard,
    dto: Json<SelectRoleDto>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    if !matches!(dto.role, Role::Investor | Role::Startup) {
        return Err(ApiError::bad_request("Role must be investor or startup"));
    }

    let mut user = current_user(store, &auth).await?;
    if user.role == Role::Admin {
        return Err(ApiError::bad_request("Admin accounts cannot change role"));
    }

    store
        .update(&auth.user_id, UserUpdate::new().set("role", dto.role.as_str()))
        .await
        .map_err(|e| ApiError::from_app(e, "Server error updating role"))?;
    user.role = dto.role;

    Ok(Json(ApiResponse::success_with_message("Role updated", UserResponse::from(&user))))
}

/// --------------------
/// Email verification
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/email/send-code")]
pub async fn send_email_code(
    store: &State<Store>,
    mail: &State<MailService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = current_user(store, &auth).await?;
    if user.email_verified {
        return Err(ApiError::bad_request("Email already verified"));
    }

    if let Some(wait) = otp::resend_wait_secs(&user, DateTime::now()) {
        return Err(ApiError::too_many_requests(format!(
            "Please wait {} seconds before requesting another code",
            wait
        )));
    }

    issue_code(store, mail, &user).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Verification code sent",
        serde_json::json!({ "expiresInMinutes": otp::CODE_TTL_MINUTES }),
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/email/verify", data = "<dto>")]
pub async fn verify_email(
    store: &State<Store>,
    mail: &State<MailService>,
    auth: AuthGuard,
    dto: Json<VerifyEmailDto>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    validated(&*dto)?;

    let mut user = current_user(store, &auth).await?;
    if user.email_verified {
        return Err(ApiError::bad_request("Email already verified"));
    }

    let outcome = otp::check_code(&user, &dto.code, DateTime::now());
    if outcome.consumes_code() {
        let mut update = otp::clear_code();
        if outcome == CodeCheck::Valid {
            update = update.set("emailVerified", true);
        }
        store
            .update(&auth.user_id, update)
            .await
            .map_err(|e| ApiError::from_app(e, "Server error verifying email"))?;
    }

    match outcome {
        CodeCheck::Valid => {}
        CodeCheck::Expired => return Err(ApiError::bad_request("Verification code has expired")),
        CodeCheck::Mismatch => return Err(ApiError::bad_request("Invalid verification code")),
        CodeCheck::Missing => return Err(ApiError::bad_request("No verification code requested")),
    }

    user.email_verified = true;
    user.email_verification_code_hash = None;
    user.email_verification_expires = None;
    mail.send_welcome(&user.email, Some(&user.name));

    Ok(Json(ApiResponse::success_with_message("Email verified", UserResponse::from(&user))))
}

/// --------------------
/// Password reset
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/forgot-password", data = "<dto>")]
pub async fn forgot_password(
    store: &State<Store>,
    mail: &State<MailService>,
    dto: Json<ForgotPasswordDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    validated(&*dto)?;

    let user = store
        .find_by_email(dto.email.trim())
        .await
        .map_err(|e| ApiError::from_app(e, "Server error during password reset"))?;

    // Unknown addresses get the same answer.
    if let Some(user) = user {
        let id = user
            .object_id()
            .map_err(|e| ApiError::from_app(e, "Server error during password reset"))?;
        let issued = IssuedResetToken::new(DateTime::now());
        store
            .update(&id, issued.update())
            .await
            .map_err(|e| ApiError::from_app(e, "Server error during password reset"))?;

        mail.send_password_reset(&user.email, &issued.token);
    }

    Ok(Json(ApiResponse::success_with_message(
        "If that email is registered, a reset link has been sent",
        serde_json::json!({}),
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/reset-password", data = "<dto>")]
pub async fn reset_password(
    store: &State<Store>,
    jwt: &State<JwtService>,
    dto: Json<ResetPasswordDto>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    validated(&*dto)?;

    let mut user = store
        .find_by_reset_token(&otp::hash_secret(dto.token.trim()))
        .await
        .map_err(|e| ApiError::from_app(e, "Server error during password reset"))?
        .filter(|user| otp::reset_token_valid(user, DateTime::now()))
        .ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;

    user.set_password(&dto.password)
        .map_err(|e| ApiError::from_app(e, "Server error during password reset"))?;

    let id = user
        .object_id()
        .map_err(|e| ApiError::from_app(e, "Server error during password reset"))?;
    let update = UserUpdate::new()
        .set("password", user.password.as_str())
        .unset("resetPasswordToken")
        .unset("resetPasswordExpire");
    store
        .update(&id, update)
        .await
        .map_err(|e| ApiError::from_app(e, "Server error during password reset"))?;

    let token = jwt
        .generate_token(&id)
        .map_err(|e| ApiError::from_app(e, "Server error during password reset"))?;
    info!("Password reset for {}", user.email);

    Ok(Json(ApiResponse::success_with_message(
        "Password updated",
        AuthResponse { token, user: UserResponse::from(&user) },
    )))
}

#[cfg(test)]
mod tests {
    use crate::db::IdentityStore;
    use crate::routes::testing::*;
    use crate::services::otp::{IssuedCode, IssuedResetToken};
    use mongodb::bson::DateTime;
    use rocket::http::Status;
    use serde_json::Value;

    #[rocket::async_test]
    async fn test_register_stores_hashes_only() {
        let app = TestApp::new().await;
        let res = app
            .client
            .post("/api/auth/register")
            .json(&serde_json::json!({
                "name": "Ada Obi",
                "email": "ada@example.com",
                "phone": "08031234567",
                "password": "password123",
                "role": "investor"
            }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
        let body: Value = res.into_json().await.unwrap();
        assert!(body["data"]["token"].as_str().unwrap().len() > 20);
        assert_eq!(body["data"]["user"]["role"], "investor");
        assert!(body["data"]["user"].get("password").is_none());

        let user = app.store.find_by_email("ada@example.com").await.unwrap().unwrap();
        let raw = app.store.raw(&user.id.unwrap()).unwrap();
        assert!(raw.get_str("password").unwrap().starts_with("$2"));
        assert_eq!(raw.get_str("emailVerificationCodeHash").unwrap().len(), 64);
    }

    #[rocket::async_test]
    async fn test_register_rejects_duplicates_and_admin_role() {
        let app = TestApp::new().await;
        app.user("ada@example.com").await;

        let mut dto = serde_json::json!({
            "name": "Ada",
            "email": "ada@example.com",
            "phone": "08031234567",
            "password": "password123"
        });
        let res = app.client.post("/api/auth/register").json(&dto).dispatch().await;
        assert_eq!(res.status(), Status::BadRequest);

        dto["email"] = Value::from("new@example.com");
        dto["role"] = Value::from("admin");
        let res = app.client.post("/api/auth/register").json(&dto).dispatch().await;
        assert_eq!(res.status(), Status::BadRequest);

        dto["role"] = Value::Null;
        dto["password"] = Value::from("short");
        let res = app.client.post("/api/auth/register").json(&dto).dispatch().await;
        assert_eq!(res.status(), Status::BadRequest);
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["message"], "Password must be at least 8 characters");
    }

    #[rocket::async_test]
    async fn test_login() {
        let app = TestApp::new().await;
        app.user("ada@example.com").await;

        let res = app
            .client
            .post("/api/auth/login")
            .json(&serde_json::json!({ "email": "ada@example.com", "password": "password123" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
        let body: Value = res.into_json().await.unwrap();
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let res = app.client.get("/api/auth/me").header(bearer(&token)).dispatch().await;
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["data"]["email"], "ada@example.com");

        let res = app
            .client
            .post("/api/auth/login")
            .json(&serde_json::json!({ "email": "ada@example.com", "password": "wrong-password" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_select_role() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ada@example.com").await;

        let res = app
            .client
            .put("/api/auth/role")
            .header(bearer(&token))
            .json(&serde_json::json!({ "role": "startup" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["data"]["role"], "startup");

        let res = app
            .client
            .put("/api/auth/role")
            .header(bearer(&token))
            .json(&serde_json::json!({ "role": "admin" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_email_code_is_single_use() {
        let app = TestApp::new().await;
        let (id, token) = app.user("ada@example.com").await;

        let issued = IssuedCode::new(DateTime::now());
        app.store.update(&id, issued.update()).await.unwrap();

        let verify = |code: String| {
            app.client
                .post("/api/auth/email/verify")
                .header(bearer(&token))
                .json(&serde_json::json!({ "code": code }))
                .dispatch()
        };

        assert_eq!(verify("000000".to_string()).await.status(), Status::BadRequest);

        let res = verify(issued.code.clone()).await;
        assert_eq!(res.status(), Status::Ok);
        let user = app.store.find_by_id(&id).await.unwrap().unwrap();
        assert!(user.email_verified);
        assert!(user.email_verification_code_hash.is_none());

        // Same code again, on an account whose email is now verified.
        assert_eq!(verify(issued.code.clone()).await.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_expired_code_is_cleared() {
        let app = TestApp::new().await;
        let (id, token) = app.user("ada@example.com").await;

        let issued = IssuedCode::new(DateTime::from_millis(DateTime::now().timestamp_millis() - 11 * 60 * 1000));
        app.store.update(&id, issued.update()).await.unwrap();

        let res = app
            .client
            .post("/api/auth/email/verify")
            .header(bearer(&token))
            .json(&serde_json::json!({ "code": issued.code }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["message"], "Verification code has expired");

        let user = app.store.find_by_id(&id).await.unwrap().unwrap();
        assert!(!user.email_verified);
        assert!(user.email_verification_code_hash.is_none());
    }

    #[rocket::async_test]
    async fn test_send_code_is_throttled() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ada@example.com").await;

        let send = || app.client.post("/api/auth/email/send-code").header(bearer(&token)).dispatch();
        assert_eq!(send().await.status(), Status::Ok);
        assert_eq!(send().await.status(), Status::TooManyRequests);
    }

    #[rocket::async_test]
    async fn test_password_reset_flow() {
        let app = TestApp::new().await;
        let (id, _) = app.user("ada@example.com").await;

        let res = app
            .client
            .post("/api/auth/forgot-password")
            .json(&serde_json::json!({ "email": "nobody@example.com" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);

        let issued = IssuedResetToken::new(DateTime::now());
        app.store.update(&id, issued.update()).await.unwrap();

        let reset = |token: String| {
            app.client
                .post("/api/auth/reset-password")
                .json(&serde_json::json!({ "token": token, "password": "new-password-1" }))
                .dispatch()
        };
        assert_eq!(reset(issued.token.clone()).await.status(), Status::Ok);
        assert_eq!(reset(issued.token.clone()).await.status(), Status::BadRequest);

        let user = app.store.find_by_id(&id).await.unwrap().unwrap();
        assert!(user.match_password("new-password-1").unwrap());
        assert!(user.reset_password_token.is_none());
    }
}
