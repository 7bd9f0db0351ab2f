use chrono::NaiveDateTime;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};

use crate::{
    auth::new_id,
    db::{now_rfc3339, StoreError},
    models::{AppointmentRow, TodayMetrics, STATUS_COMPLETED, STATUS_IN_PROGRESS},
    schedule::{format_timestamp, now_local, Window},
    validation::AppointmentInput,
};

const APPOINTMENT_SELECT: &str = r#"SELECT a.id, a.client_id, c.name AS client_name,
           a.cleaner_id, cl.name AS cleaner_name, a.service_location_id,
           l.street, l.street_number, l.neighborhood, l.city, l.latitude, l.longitude,
           a.service_type_id, st.name AS service_type_name,
           a.scheduled_at, a.status, a.description, a.additional_notes, a.frequency,
           a.started_at, a.completed_at, a.created_at, a.updated_at
    FROM appointments a
    JOIN clients c ON c.id = a.client_id
    JOIN cleaners cl ON cl.id = a.cleaner_id
    JOIN service_locations l ON l.id = a.service_location_id
    LEFT JOIN service_types st ON st.id = a.service_type_id"#;

/// Narrows the appointment list. Empty fields apply no condition.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub window: Option<Window>,
    pub cleaner_id: Option<String>,
    pub client_id: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

/// Completed work, optionally bounded by completion date.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub window: Option<Window>,
    pub cleaner_id: Option<String>,
    pub client_id: Option<String>,
}

pub async fn list_appointments(
    pool: &SqlitePool,
    filter: &AppointmentFilter,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(APPOINTMENT_SELECT);
    query.push(" WHERE 1 = 1");

    if let Some(window) = &filter.window {
        query
            .push(" AND a.scheduled_at >= ")
            .push_bind(window.start_bound())
            .push(" AND a.scheduled_at <= ")
            .push_bind(window.end_bound());
    }
    if let Some(cleaner_id) = &filter.cleaner_id {
        query.push(" AND a.cleaner_id = ").push_bind(cleaner_id.clone());
    }
    if let Some(client_id) = &filter.client_id {
        query.push(" AND a.client_id = ").push_bind(client_id.clone());
    }
    if let Some(status) = &filter.status {
        query.push(" AND a.status = ").push_bind(status.clone());
    }

    query.push(" ORDER BY a.scheduled_at ASC");
    let rows = query.build_query_as::<AppointmentRow>().fetch_all(pool).await?;

    // SQLite's LOWER and LIKE only fold ASCII, so accented names are matched here.
    Ok(match filter.search.as_deref() {
        Some(search) => {
            let needle = search.to_lowercase();
            rows.into_iter().filter(|row| matches_search(row, &needle)).collect()
        }
        None => rows,
    })
}

fn matches_search(row: &AppointmentRow, needle: &str) -> bool {
    [&row.client_name, &row.cleaner_name, &row.street, &row.city]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}

pub async fn find_appointment(
    pool: &SqlitePool,
    appointment_id: &str,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentRow>(&format!("{APPOINTMENT_SELECT} WHERE a.id = ? LIMIT 1"))
        .bind(appointment_id)
        .fetch_optional(pool)
        .await
}

pub async fn task_ids_for(pool: &SqlitePool, appointment_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT task_id FROM appointment_tasks WHERE appointment_id = ? ORDER BY task_id",
    )
    .bind(appointment_id)
    .fetch_all(pool)
    .await
}

/// Inserts the appointment and its task links. Past schedules are accepted.
pub async fn create_appointment(
    pool: &SqlitePool,
    input: &AppointmentInput,
) -> Result<String, StoreError> {
    let appointment_id = new_id();
    let now = now_rfc3339();
    let stamp = format_timestamp(now_local());
    let started_at = (input.status == STATUS_IN_PROGRESS).then(|| stamp.clone());
    let completed_at = (input.status == STATUS_COMPLETED).then(|| stamp.clone());

    let mut tx = pool.begin().await?;
    ensure_location_belongs(&mut tx, input).await?;

    sqlx::query(
        r#"INSERT INTO appointments
           (id, client_id, cleaner_id, service_location_id, service_type_id, scheduled_at, status,
            description, additional_notes, frequency, started_at, completed_at, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&appointment_id)
    .bind(&input.client_id)
    .bind(&input.cleaner_id)
    .bind(&input.service_location_id)
    .bind(&input.service_type_id)
    .bind(&input.scheduled_at)
    .bind(&input.status)
    .bind(&input.description)
    .bind(&input.additional_notes)
    .bind(&input.frequency)
    .bind(started_at)
    .bind(completed_at)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    replace_tasks(&mut tx, &appointment_id, &input.task_ids).await?;
    tx.commit().await?;

    log::info!("Created appointment {appointment_id}");
    Ok(appointment_id)
}

pub async fn update_appointment(
    pool: &SqlitePool,
    appointment_id: &str,
    input: &AppointmentInput,
) -> Result<(), StoreError> {
    let stamp = format_timestamp(now_local());
    let mut tx = pool.begin().await?;
    ensure_location_belongs(&mut tx, input).await?;

    let updated = sqlx::query(
        r#"UPDATE appointments
           SET client_id = ?1, cleaner_id = ?2, service_location_id = ?3, service_type_id = ?4,
               scheduled_at = ?5, status = ?6, description = ?7, additional_notes = ?8,
               frequency = ?9,
               started_at = CASE
                   WHEN ?6 = 'in_progress' AND started_at IS NULL THEN ?10
                   ELSE started_at END,
               completed_at = CASE
                   WHEN ?6 = 'in_progress' THEN NULL
                   WHEN ?6 = 'completed' AND completed_at IS NULL THEN ?10
                   ELSE completed_at END,
               updated_at = ?11
           WHERE id = ?12"#,
    )
    .bind(&input.client_id)
    .bind(&input.cleaner_id)
    .bind(&input.service_location_id)
    .bind(&input.service_type_id)
    .bind(&input.scheduled_at)
    .bind(&input.status)
    .bind(&input.description)
    .bind(&input.additional_notes)
    .bind(&input.frequency)
    .bind(&stamp)
    .bind(now_rfc3339())
    .bind(appointment_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound("appointment"));
    }

    replace_tasks(&mut tx, appointment_id, &input.task_ids).await?;
    tx.commit().await?;

    log::info!("Updated appointment {appointment_id}");
    Ok(())
}

/// Moves an appointment to any status. The first move into `in_progress`
/// stamps `started_at`, the first move into `completed` stamps
/// `completed_at`. Going back to `in_progress` reopens the job and clears
/// `completed_at`, so the next completion is stamped after the start.
pub async fn set_status(pool: &SqlitePool, appointment_id: &str, status: &str) -> Result<(), StoreError> {
    let stamp = format_timestamp(now_local());
    let updated = sqlx::query(
        r#"UPDATE appointments
           SET status = ?1,
               started_at = CASE
                   WHEN ?1 = 'in_progress' AND started_at IS NULL THEN ?2
                   ELSE started_at END,
               completed_at = CASE
                   WHEN ?1 = 'in_progress' THEN NULL
                   WHEN ?1 = 'completed' AND completed_at IS NULL THEN ?2
                   ELSE completed_at END,
               updated_at = ?3
           WHERE id = ?4"#,
    )
    .bind(status)
    .bind(&stamp)
    .bind(now_rfc3339())
    .bind(appointment_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound("appointment"));
    }
    log::info!("Appointment {appointment_id} moved to {status}");
    Ok(())
}

pub async fn delete_appointment(pool: &SqlitePool, appointment_id: &str) -> Result<(), StoreError> {
    let deleted = sqlx::query("DELETE FROM appointments WHERE id = ?")
        .bind(appointment_id)
        .execute(pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(StoreError::NotFound("appointment"));
    }
    log::info!("Deleted appointment {appointment_id}");
    Ok(())
}

/// In-progress appointments, oldest start first.
pub async fn list_active(
    pool: &SqlitePool,
    cleaner_id: Option<&str>,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(APPOINTMENT_SELECT);
    query.push(" WHERE a.status = ").push_bind(STATUS_IN_PROGRESS);
    if let Some(cleaner_id) = cleaner_id {
        query.push(" AND a.cleaner_id = ").push_bind(cleaner_id.to_string());
    }
    query.push(" ORDER BY a.started_at ASC, a.scheduled_at ASC");
    query.build_query_as::<AppointmentRow>().fetch_all(pool).await
}

pub async fn list_completed(
    pool: &SqlitePool,
    filter: &HistoryFilter,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(APPOINTMENT_SELECT);
    query.push(" WHERE a.status = ").push_bind(STATUS_COMPLETED);

    if let Some(window) = &filter.window {
        query
            .push(" AND a.completed_at >= ")
            .push_bind(window.start_bound())
            .push(" AND a.completed_at <= ")
            .push_bind(window.end_bound());
    }
    if let Some(cleaner_id) = &filter.cleaner_id {
        query.push(" AND a.cleaner_id = ").push_bind(cleaner_id.clone());
    }
    if let Some(client_id) = &filter.client_id {
        query.push(" AND a.client_id = ").push_bind(client_id.clone());
    }

    query.push(" ORDER BY a.completed_at DESC");
    query.build_query_as::<AppointmentRow>().fetch_all(pool).await
}

/// Status counts for the appointments scheduled on the day of `now`.
pub async fn today_metrics(pool: &SqlitePool, now: NaiveDateTime) -> Result<TodayMetrics, sqlx::Error> {
    let today = now.date();
    let Some(window) = Window::days(today, today) else {
        return Ok(TodayMetrics::default());
    };

    let counts = sqlx::query_as::<_, (String, i64)>(
        r#"SELECT status, COUNT(*) FROM appointments
           WHERE scheduled_at >= ? AND scheduled_at <= ?
           GROUP BY status"#,
    )
    .bind(window.start_bound())
    .bind(window.end_bound())
    .fetch_all(pool)
    .await?;

    let mut metrics = TodayMetrics::default();
    for (status, count) in counts {
        match status.as_str() {
            "scheduled" => metrics.scheduled = count,
            "in_progress" => metrics.in_progress = count,
            "completed" => metrics.completed = count,
            _ => {}
        }
        metrics.total += count;
    }
    Ok(metrics)
}

async fn ensure_location_belongs(
    tx: &mut Transaction<'_, Sqlite>,
    input: &AppointmentInput,
) -> Result<(), StoreError> {
    let owner = sqlx::query_scalar::<_, String>("SELECT client_id FROM service_locations WHERE id = ?")
        .bind(&input.service_location_id)
        .fetch_optional(&mut **tx)
        .await?;
    match owner {
        Some(owner) if owner == input.client_id => Ok(()),
        _ => Err(StoreError::Invalid(vec![
            "Service location does not belong to the selected client.".to_string(),
        ])),
    }
}

async fn replace_tasks(
    tx: &mut Transaction<'_, Sqlite>,
    appointment_id: &str,
    task_ids: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM appointment_tasks WHERE appointment_id = ?")
        .bind(appointment_id)
        .execute(&mut **tx)
        .await?;
    for task_id in task_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO appointment_tasks (appointment_id, task_id) VALUES (?, ?)",
        )
        .bind(appointment_id)
        .bind(task_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
