use actix_web::http::header::Header;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use serde::Deserialize;

use crate::{
    auth::{authenticate_credentials, clear_logout_cookie, logout_cookie, AuthUser, AUTH_REALM},
    routes::see_other,
    state::AppState,
};

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/login").route(web::get().to(login)))
        .service(web::resource("/logout").route(web::get().to(logout)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn home() -> HttpResponse {
    see_other("/admin/dashboard")
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn logout(req: HttpRequest) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/login"))
        .cookie(logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

/// Challenges for Basic credentials, then clears the logout marker and sends
/// the user to `next` when it is inside their own area.
async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LoginQuery>,
) -> HttpResponse {
    let auth = match Authorization::<Basic>::parse(&req) {
        Ok(auth) => auth,
        Err(_) => return auth_challenge(),
    };
    let credentials = auth.into_scheme();
    let username = credentials.user_id();
    let password = credentials.password().unwrap_or_default();

    let Some(user) = authenticate_credentials(&state.db, username, password).await else {
        return auth_challenge();
    };

    log::info!("{} logged in", user.display_name);
    let redirect = login_redirect(&user, query.next.as_deref().unwrap_or_default());
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, redirect))
        .cookie(clear_logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

fn login_redirect<'a>(user: &AuthUser, requested: &'a str) -> &'a str {
    let area = if user.is_staff() { "/admin" } else { "/cleaner" };
    if requested.starts_with(area) {
        requested
    } else {
        user.home_path()
    }
}

fn auth_challenge() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((header::WWW_AUTHENTICATE, format!("Basic realm=\"{AUTH_REALM}\"")))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}
