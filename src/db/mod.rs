pub mod appointments;
pub mod catalog;
pub mod cleaners;
pub mod clients;

use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{
    auth::{hash_password, new_id},
    models::{ActivityRow, ROLE_ADMIN},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("E-mail already registered")]
    DuplicateEmail,
    #[error("{}", .0.join(" "))]
    Invalid(Vec<String>),
    #[error("password hash failed")]
    PasswordHash,
}

impl StoreError {
    /// Messages to show back on a form, `None` for failures the user cannot fix.
    pub fn form_errors(&self) -> Option<Vec<String>> {
        match self {
            StoreError::DuplicateEmail => Some(vec![self.to_string()]),
            StoreError::Invalid(errors) => Some(errors.clone()),
            _ => None,
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    catalog::seed_catalog(pool).await?;
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    appointment_id: Option<&str>,
) {
    let result = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, appointment_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(now_rfc3339())
    .bind(user_id)
    .bind(appointment_id)
    .execute(pool)
    .await;

    if let Err(err) = result {
        log::warn!("Could not record activity {kind}: {err}");
    }
}

pub async fn recent_activity(pool: &SqlitePool, limit: i64) -> Result<Vec<ActivityRow>, sqlx::Error> {
    sqlx::query_as::<_, ActivityRow>(
        "SELECT message, created_at FROM activities ORDER BY created_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>(
        "SELECT id FROM users WHERE role = ? LIMIT 1",
    )
    .bind(ROLE_ADMIN)
    .fetch_optional(pool)
    .await?;

    if existing.is_some() {
        return Ok(());
    }

    let username = env::var("ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let display_name = env::var("ADMIN_DISPLAY_NAME").unwrap_or_else(|_| "Office Admin".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash = hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (id, username, display_name, role, password_hash, active, created_at)
           VALUES (?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(username)
    .bind(display_name)
    .bind(ROLE_ADMIN)
    .bind(password_hash)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::str::FromStr;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::SqlitePool;

    use crate::{
        models::SERVICE_AREAS,
        validation::{CleanerInput, ClientInput, LocationInput},
    };

    /// A single-connection in-memory database with the schema applied.
    pub async fn pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("memory url")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .expect("memory pool");
        super::run_migrations(&pool).await.expect("migrations");
        pool
    }

    pub fn client_input(name: &str) -> ClientInput {
        ClientInput {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: "11987654321".to_string(),
            cleaning_frequency: "weekly".to_string(),
            referral_source: "google".to_string(),
            active: true,
            location: LocationInput {
                street: "Rua Augusta".to_string(),
                street_number: "1500".to_string(),
                neighborhood: "Consolação".to_string(),
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
                postal_code: "01304-001".to_string(),
                pool_type: "fiberglass".to_string(),
                latitude: Some(-23.5558),
                longitude: Some(-46.6622),
                address_validated: true,
                ..LocationInput::default()
            },
        }
    }

    pub fn cleaner_input(name: &str, email: &str) -> CleanerInput {
        CleanerInput {
            name: name.to_string(),
            email: email.to_string(),
            personal_phone: "11912345678".to_string(),
            active: true,
            available_days: vec!["monday".to_string(), "thursday".to_string()],
            service_areas: vec![SERVICE_AREAS[0].to_string()],
            hire_date: "2026-01-05".to_string(),
            role: "cleaner".to_string(),
            ..CleanerInput::default()
        }
    }

    /// Creates a client with its primary location, returns `(client_id, location_id)`.
    pub async fn client(pool: &SqlitePool, name: &str) -> (String, String) {
        let client_id = super::clients::create_client(pool, &client_input(name))
            .await
            .expect("client created");
        let location = super::clients::primary_location(pool, &client_id)
            .await
            .expect("location query")
            .expect("primary location");
        (client_id, location.id)
    }

    pub async fn cleaner(pool: &SqlitePool, name: &str, email: &str) -> String {
        super::cleaners::create_cleaner(pool, &cleaner_input(name, email))
            .await
            .expect("cleaner created")
    }
}
