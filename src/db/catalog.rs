use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    db::now_rfc3339,
    models::{ServiceTaskRow, ServiceTypeRow},
};

pub async fn list_service_types(pool: &SqlitePool) -> Result<Vec<ServiceTypeRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceTypeRow>(
        r#"SELECT id, name, description, duration_minutes, price, frequency, created_at
           FROM service_types
           ORDER BY name"#,
    )
    .fetch_all(pool)
    .await
}

pub async fn list_service_tasks(pool: &SqlitePool) -> Result<Vec<ServiceTaskRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceTaskRow>(
        r#"SELECT id, name, description, duration_minutes, price, created_at
           FROM service_tasks
           ORDER BY name"#,
    )
    .fetch_all(pool)
    .await
}

pub(crate) async fn seed_catalog(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let types = [
        ("Standard cleaning", "Skim, brush, vacuum and chemical check.", 60, 150.0, "weekly"),
        ("Maintenance visit", "Equipment check and water balance.", 45, 120.0, "bi_weekly"),
        ("Deep cleaning", "Full scrub of walls, tiles and filter.", 120, 320.0, "monthly"),
        ("Green pool recovery", "Shock treatment and repeated vacuuming.", 180, 480.0, "one_time"),
    ];

    for (name, description, duration, price, frequency) in types {
        sqlx::query(
            r#"INSERT INTO service_types (id, name, description, duration_minutes, price, frequency, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(name) DO NOTHING"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(duration)
        .bind(price)
        .bind(frequency)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
    }

    let tasks = [
        ("Skimming", "Remove leaves and floating debris.", 10, 20.0),
        ("Brushing", "Brush walls, steps and waterline.", 15, 30.0),
        ("Vacuuming", "Vacuum the pool floor.", 20, 40.0),
        ("Filter backwash", "Backwash and rinse the filter.", 10, 25.0),
        ("Chemical balance", "Test and adjust pH, chlorine and alkalinity.", 10, 35.0),
        ("Tile cleaning", "Remove scale from the tile line.", 20, 45.0),
    ];

    for (name, description, duration, price) in tasks {
        sqlx::query(
            r#"INSERT INTO service_tasks (id, name, description, duration_minutes, price, created_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(name) DO NOTHING"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(duration)
        .bind(price)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[actix_web::test]
    async fn catalog_is_seeded_once() {
        let pool = testing::pool().await;
        seed_catalog(&pool).await.expect("seed");
        seed_catalog(&pool).await.expect("reseed");

        let types = list_service_types(&pool).await.expect("types");
        assert_eq!(types.len(), 4);
        assert_eq!(types[0].name, "Deep cleaning");

        let tasks = list_service_tasks(&pool).await.expect("tasks");
        assert_eq!(tasks.len(), 6);
        assert!(tasks.iter().any(|task| task.name == "Vacuuming"));
    }
}
