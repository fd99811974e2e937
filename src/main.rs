#[macro_use]
extern crate rocket;

mod config;
mod db;
mod errors;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use dotenvy::dotenv;
use log::{error, info};
use rocket::fairing::{AdHoc, Fairing, Info, Kind};
use rocket::fs::{FileServer, Options};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

use crate::config::AppConfig;
use crate::services::{JwtService, MailService, UploadPipeline};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

fn error_body(message: &str) -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": message
    })
}

#[catch(400)]
fn bad_request() -> rocket::serde::json::Value {
    error_body("Bad request")
}

#[catch(401)]
fn unauthorized() -> rocket::serde::json::Value {
    error_body("Not authorized to access this route")
}

#[catch(403)]
fn forbidden() -> rocket::serde::json::Value {
    error_body("Admin access required")
}

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    error_body("Resource not found (check /api prefix)")
}

#[catch(413)]
fn payload_too_large() -> rocket::serde::json::Value {
    error_body("Request body too large")
}

#[catch(422)]
fn unprocessable() -> rocket::serde::json::Value {
    error_body("Malformed request body")
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    error_body("Internal server error")
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- SERVER ----------------------------- */

/// Everything except the database: managed services, routes and catchers.
pub(crate) fn server(config: AppConfig) -> Rocket<Build> {
    let jwt = JwtService::from_config(&config);
    let mail = MailService::from_config(&config);
    let uploads = UploadPipeline::new(config.verification_upload_root());
    let upload_dir = config.upload_dir.clone();

    rocket::custom(AppConfig::rocket_figment())
        .manage(config)
        .manage(jwt)
        .manage(mail)
        .manage(uploads)
        .attach(AdHoc::try_on_ignite("Upload directory", |rocket| async {
            let Some(uploads) = rocket.state::<UploadPipeline>() else {
                return Err(rocket);
            };
            let ready = uploads.ensure_root().await;
            match ready {
                Ok(()) => {
                    info!("✓ Upload directory ready: {}", uploads.root().display());
                    Ok(rocket)
                }
                Err(e) => {
                    error!("✗ Cannot create upload directory: {}", e);
                    Err(rocket)
                }
            }
        }))
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api",
            openapi_get_routes![
                // Auth
                routes::auth::register,
                routes::auth::login,
                routes::auth::me,
                routes::auth::select_role,
                routes::auth::send_email_code,
                routes::auth::verify_email,
                routes::auth::forgot_password,
                routes::auth::reset_password,
                // Verification
                routes::verification::submit_verification,
                routes::verification::get_verification_status,
                // Admin
                routes::admin::list_verifications,
                routes::admin::get_verification,
                routes::admin::review_verification,
            ],
        )
        .mount("/api", routes![routes::verification::upload_documents])
        .mount("/uploads", FileServer::new(upload_dir, Options::Missing))
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                payload_too_large,
                unprocessable,
                internal_error
            ],
        )
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    build_rocket()
}

fn build_rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            let reason = e.to_string();
            return rocket::custom(AppConfig::rocket_figment()).attach(AdHoc::try_on_ignite(
                "Configuration",
                |rocket| async move {
                    error!("✗ Invalid configuration: {}", reason);
                    Err(rocket)
                },
            ));
        }
    };

    info!("🚀 Finance Teque API starting");
    if AppConfig::is_development() {
        info!("📚 Swagger UI → {}/api/docs", config.app_url.trim_end_matches('/'));
    }

    server(config).attach(db::init())
}
