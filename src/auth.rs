use actix_web::{
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    error::ErrorUnauthorized,
    http::header,
    middleware::Next,
    web, Error, HttpMessage, HttpRequest, HttpResponse,
};
use actix_web::cookie::{Cookie, SameSite, time::Duration};
use actix_web_httpauth::extractors::basic::BasicAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    models::{UserRow, ROLE_ADMIN, ROLE_CLEANER, ROLE_MANAGER},
    state::AppState,
};

pub const AUTH_REALM: &str = "PoolService";
const LOGOUT_COOKIE: &str = "pool_logged_out";

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub display_name: String,
    pub role: String,
}

impl AuthUser {
    /// Office staff may use the admin area.
    pub fn is_staff(&self) -> bool {
        self.role == ROLE_ADMIN || self.role == ROLE_MANAGER
    }

    /// Where this user lands after logging in.
    pub fn home_path(&self) -> &'static str {
        if self.is_staff() {
            "/admin/dashboard"
        } else {
            "/cleaner/dashboard"
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

async fn authenticate(req: &ServiceRequest, credentials: &BasicAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))?;
    let username = credentials.user_id();
    let password = credentials.password().unwrap_or_default();
    authenticate_credentials(&state.db, username, password)
        .await
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))
}

/// Looks up an active account and checks its password.
pub async fn authenticate_credentials(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Option<AuthUser> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, username, display_name, role, password_hash, active, created_at
           FROM users
           WHERE username = ? AND active = 1
           LIMIT 1"#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(|err| log::warn!("Login lookup failed: {err}"))
    .ok()??;

    if !verify_password(password, &user.password_hash) {
        return None;
    }

    Some(AuthUser {
        id: user.id,
        display_name: user.display_name,
        role: user.role,
    })
}

async fn validate_role(
    req: ServiceRequest,
    credentials: BasicAuth,
    allowed: fn(&AuthUser) -> bool,
    denied: &'static str,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            if !allowed(&user) {
                return Err((ErrorUnauthorized(denied), req));
            }
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

/// Any active account.
pub async fn basic_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    validate_role(req, credentials, |_| true, "Unauthorized").await
}

pub async fn staff_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    validate_role(req, credentials, AuthUser::is_staff, "Office access required").await
}

pub async fn cleaner_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    validate_role(
        req,
        credentials,
        |user| user.role == ROLE_CLEANER,
        "Cleaner access required",
    )
    .await
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn logout_cookie(req: &HttpRequest) -> Cookie<'static> {
    let mut builder = Cookie::build(LOGOUT_COOKIE, "1")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(365));
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn clear_logout_cookie(req: &HttpRequest) -> Cookie<'static> {
    let mut builder = Cookie::build(LOGOUT_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(0));
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn is_logged_out(req: &HttpRequest) -> bool {
    req.cookie(LOGOUT_COOKIE).is_some()
}

/// Browsers keep sending Basic credentials after logout, so guarded scopes
/// check the logout cookie first and show a page with a way back in.
pub async fn logout_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: actix_web::body::MessageBody + 'static,
{
    if is_logged_out(req.request()) {
        let login_target = if req.path().starts_with("/cleaner") {
            "/cleaner/dashboard"
        } else {
            "/admin/dashboard"
        };
        let login_url = format!("/login?next={login_target}");
        let body = format!(
            r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Logged out</title>
    <link rel="stylesheet" href="/static/app.css" />
  </head>
  <body class="plain">
    <div class="card narrow">
      <h1>You're logged out</h1>
      <p>Your session has been closed.</p>
      <p><a href="{login_url}">Log in again</a></p>
    </div>
  </body>
</html>"#
        );
        let response = HttpResponse::Unauthorized()
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .content_type("text/html; charset=utf-8")
            .body(body);
        return Ok(req.into_response(response));
    }

    let res = next.call(req).await?;
    Ok(res.map_into_boxed_body())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn user(role: &str) -> AuthUser {
        AuthUser {
            id: new_id(),
            display_name: "Test".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn staff_roles_land_in_the_office() {
        assert!(user(ROLE_ADMIN).is_staff());
        assert!(user(ROLE_MANAGER).is_staff());
        assert!(!user(ROLE_CLEANER).is_staff());
        assert_eq!(user(ROLE_MANAGER).home_path(), "/admin/dashboard");
        assert_eq!(user(ROLE_CLEANER).home_path(), "/cleaner/dashboard");
    }

    #[test]
    fn hashed_passwords_verify() {
        let hash = hash_password("piscina123").expect("hash");
        assert!(verify_password("piscina123", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("piscina123", "not-a-hash"));
    }

    #[actix_web::test]
    async fn inactive_accounts_cannot_log_in() {
        let pool = testing::pool().await;
        let mut input = testing::cleaner_input("Lia", "lia@pool.com");
        input.password = Some("piscina123".to_string());
        input.active = false;
        crate::db::cleaners::create_cleaner(&pool, &input)
            .await
            .expect("cleaner");

        assert!(authenticate_credentials(&pool, "lia@pool.com", "piscina123")
            .await
            .is_none());
    }
}
