use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    db::{is_unique_violation, now_rfc3339, StoreError},
    models::{join_list, CleanerRow},
    schedule::{format_timestamp, now_local},
    validation::CleanerInput,
};

const CLEANER_COLUMNS: &str = r#"id, user_id, name, email, personal_phone, company_phone, active,
    available_days, work_start_time, work_end_time, service_areas, has_vehicle, vehicle_type,
    address, emergency_contact_name, emergency_contact_phone, employee_code, hire_date, role,
    last_latitude, last_longitude, last_seen_at, created_at"#;

pub async fn list_cleaners(pool: &SqlitePool, active_only: bool) -> Result<Vec<CleanerRow>, sqlx::Error> {
    let filter = if active_only { "WHERE active = 1" } else { "" };
    sqlx::query_as::<_, CleanerRow>(&format!(
        "SELECT {CLEANER_COLUMNS} FROM cleaners {filter} ORDER BY name"
    ))
    .fetch_all(pool)
    .await
}

pub async fn find_cleaner(pool: &SqlitePool, cleaner_id: &str) -> Result<Option<CleanerRow>, sqlx::Error> {
    sqlx::query_as::<_, CleanerRow>(&format!(
        "SELECT {CLEANER_COLUMNS} FROM cleaners WHERE id = ? LIMIT 1"
    ))
    .bind(cleaner_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_cleaner_by_user(pool: &SqlitePool, user_id: &str) -> Result<Option<CleanerRow>, sqlx::Error> {
    sqlx::query_as::<_, CleanerRow>(&format!(
        "SELECT {CLEANER_COLUMNS} FROM cleaners WHERE user_id = ? LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Creates the profile and, when a password is given, a login account whose
/// username is the cleaner's e-mail.
pub async fn create_cleaner(pool: &SqlitePool, input: &CleanerInput) -> Result<String, StoreError> {
    let cleaner_id = new_id();
    let now = now_rfc3339();
    let mut tx = pool.begin().await?;

    let user_id = match input.password.as_deref() {
        Some(password) => {
            let password_hash = hash_password(password).map_err(|_| StoreError::PasswordHash)?;
            let user_id = new_id();
            sqlx::query(
                r#"INSERT INTO users (id, username, display_name, role, password_hash, active, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&user_id)
            .bind(&input.email)
            .bind(&input.name)
            .bind(&input.role)
            .bind(password_hash)
            .bind(input.active)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(duplicate_email)?;
            Some(user_id)
        }
        None => None,
    };

    sqlx::query(
        r#"INSERT INTO cleaners
           (id, user_id, name, email, personal_phone, company_phone, active, available_days,
            work_start_time, work_end_time, service_areas, has_vehicle, vehicle_type, address,
            emergency_contact_name, emergency_contact_phone, employee_code, hire_date, role,
            created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&cleaner_id)
    .bind(user_id)
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.personal_phone)
    .bind(&input.company_phone)
    .bind(input.active)
    .bind(join_list(&input.available_days))
    .bind(&input.work_start_time)
    .bind(&input.work_end_time)
    .bind(join_list(&input.service_areas))
    .bind(input.has_vehicle)
    .bind(&input.vehicle_type)
    .bind(&input.address)
    .bind(&input.emergency_contact_name)
    .bind(&input.emergency_contact_phone)
    .bind(&input.employee_code)
    .bind(&input.hire_date)
    .bind(&input.role)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(duplicate_email)?;

    tx.commit().await?;
    log::info!("Created cleaner {cleaner_id}");
    Ok(cleaner_id)
}

/// Updates the profile and keeps the linked login account in step. A
/// password on edit replaces the current one, or creates the account when
/// the cleaner had none.
pub async fn update_cleaner(
    pool: &SqlitePool,
    cleaner_id: &str,
    input: &CleanerInput,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, (Option<String>,)>("SELECT user_id FROM cleaners WHERE id = ?")
        .bind(cleaner_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some((user_id,)) = existing else {
        return Err(StoreError::NotFound("cleaner"));
    };

    let password_hash = match input.password.as_deref() {
        Some(password) => Some(hash_password(password).map_err(|_| StoreError::PasswordHash)?),
        None => None,
    };

    let user_id = match (user_id, password_hash) {
        (Some(user_id), password_hash) => {
            sqlx::query(
                r#"UPDATE users
                   SET username = ?, display_name = ?, role = ?, active = ?,
                       password_hash = COALESCE(?, password_hash)
                   WHERE id = ?"#,
            )
            .bind(&input.email)
            .bind(&input.name)
            .bind(&input.role)
            .bind(input.active)
            .bind(password_hash)
            .bind(&user_id)
            .execute(&mut *tx)
            .await
            .map_err(duplicate_email)?;
            Some(user_id)
        }
        (None, Some(password_hash)) => {
            let user_id = new_id();
            sqlx::query(
                r#"INSERT INTO users (id, username, display_name, role, password_hash, active, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&user_id)
            .bind(&input.email)
            .bind(&input.name)
            .bind(&input.role)
            .bind(password_hash)
            .bind(input.active)
            .bind(now_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(duplicate_email)?;
            Some(user_id)
        }
        (None, None) => None,
    };

    sqlx::query(
        r#"UPDATE cleaners
           SET user_id = ?, name = ?, email = ?, personal_phone = ?, company_phone = ?, active = ?,
               available_days = ?, work_start_time = ?, work_end_time = ?, service_areas = ?,
               has_vehicle = ?, vehicle_type = ?, address = ?, emergency_contact_name = ?,
               emergency_contact_phone = ?, employee_code = ?, hire_date = ?, role = ?
           WHERE id = ?"#,
    )
    .bind(user_id)
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.personal_phone)
    .bind(&input.company_phone)
    .bind(input.active)
    .bind(join_list(&input.available_days))
    .bind(&input.work_start_time)
    .bind(&input.work_end_time)
    .bind(join_list(&input.service_areas))
    .bind(input.has_vehicle)
    .bind(&input.vehicle_type)
    .bind(&input.address)
    .bind(&input.emergency_contact_name)
    .bind(&input.emergency_contact_phone)
    .bind(&input.employee_code)
    .bind(&input.hire_date)
    .bind(&input.role)
    .bind(cleaner_id)
    .execute(&mut *tx)
    .await
    .map_err(duplicate_email)?;

    tx.commit().await?;
    log::info!("Updated cleaner {cleaner_id}");
    Ok(())
}

/// Stores the last position a cleaner reported.
pub async fn record_position(
    pool: &SqlitePool,
    cleaner_id: &str,
    latitude: f64,
    longitude: f64,
) -> Result<(), StoreError> {
    let updated = sqlx::query(
        "UPDATE cleaners SET last_latitude = ?, last_longitude = ?, last_seen_at = ? WHERE id = ?",
    )
    .bind(latitude)
    .bind(longitude)
    .bind(format_timestamp(now_local()))
    .bind(cleaner_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound("cleaner"));
    }
    Ok(())
}

fn duplicate_email(err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::DuplicateEmail
    } else {
        StoreError::Database(err)
    }
}
