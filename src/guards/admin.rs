use rocket::request::{self, Request, FromRequest, Outcome};
use rocket::http::Status;
use rocket::State;
use log::{error, warn};
use rocket_okapi::request::OpenApiFromRequest;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::RequestHeaderInput;

use crate::db::Store;
use crate::guards::AuthGuard;
use crate::models::Role;

/// An authenticated caller whose stored role is `admin`.
pub struct AdminGuard {
    pub auth: AuthGuard,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let auth = match req.guard::<AuthGuard>().await {
            Outcome::Success(auth) => auth,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let store = match req.guard::<&State<Store>>().await {
            Outcome::Success(store) => store,
            _ => return Outcome::Error((Status::InternalServerError, ())),
        };

        match store.find_by_id(&auth.user_id).await {
            Ok(Some(user)) if user.role == Role::Admin => Outcome::Success(AdminGuard { auth }),
            Ok(Some(user)) => {
                warn!("Admin guard rejected {} with role {}", user.email, user.role.as_str());
                Outcome::Error((Status::Forbidden, ()))
            }
            Ok(None) => Outcome::Error((Status::Forbidden, ())),
            Err(e) => {
                error!("Admin guard lookup failed: {}", e);
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for AdminGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
