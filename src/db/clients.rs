use std::collections::HashMap;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{
    auth::new_id,
    db::{now_rfc3339, StoreError},
    models::{ClientRow, ServiceLocationRow},
    validation::{ClientInput, LocationInput},
};

const CLIENT_COLUMNS: &str =
    "id, name, email, phone, cleaning_frequency, referral_source, active, created_at, updated_at";

const LOCATION_COLUMNS: &str = r#"id, client_id, street, street_number, neighborhood, city, state,
    postal_code, complement, reference_point, access_instructions, pool_type, pool_size,
    products_used, equipment, preferred_time, notes, latitude, longitude, address_validated,
    is_primary, created_at, updated_at"#;

pub async fn list_clients(pool: &SqlitePool) -> Result<Vec<ClientRow>, sqlx::Error> {
    sqlx::query_as::<_, ClientRow>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY name"
    ))
    .fetch_all(pool)
    .await
}

/// Clients ordered by name, each with its locations (primary first).
pub async fn list_clients_with_locations(
    pool: &SqlitePool,
) -> Result<Vec<(ClientRow, Vec<ServiceLocationRow>)>, sqlx::Error> {
    let clients = list_clients(pool).await?;
    let locations = sqlx::query_as::<_, ServiceLocationRow>(&format!(
        "SELECT {LOCATION_COLUMNS} FROM service_locations ORDER BY is_primary DESC, created_at"
    ))
    .fetch_all(pool)
    .await?;

    let mut by_client: HashMap<String, Vec<ServiceLocationRow>> = HashMap::new();
    for location in locations {
        by_client
            .entry(location.client_id.clone())
            .or_default()
            .push(location);
    }

    Ok(clients
        .into_iter()
        .map(|client| {
            let locations = by_client.remove(&client.id).unwrap_or_default();
            (client, locations)
        })
        .collect())
}

pub async fn find_client(pool: &SqlitePool, client_id: &str) -> Result<Option<ClientRow>, sqlx::Error> {
    sqlx::query_as::<_, ClientRow>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ? LIMIT 1"
    ))
    .bind(client_id)
    .fetch_optional(pool)
    .await
}

pub async fn primary_location(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<Option<ServiceLocationRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceLocationRow>(&format!(
        r#"SELECT {LOCATION_COLUMNS} FROM service_locations
           WHERE client_id = ?
           ORDER BY is_primary DESC, created_at
           LIMIT 1"#
    ))
    .bind(client_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_locations(pool: &SqlitePool) -> Result<Vec<ServiceLocationRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceLocationRow>(&format!(
        "SELECT {LOCATION_COLUMNS} FROM service_locations ORDER BY city, street"
    ))
    .fetch_all(pool)
    .await
}

/// Inserts the client and its primary location together.
pub async fn create_client(pool: &SqlitePool, input: &ClientInput) -> Result<String, StoreError> {
    let client_id = new_id();
    let now = now_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"INSERT INTO clients
           (id, name, email, phone, cleaning_frequency, referral_source, active, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&client_id)
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.cleaning_frequency)
    .bind(&input.referral_source)
    .bind(input.active)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    insert_location(&mut tx, &client_id, &input.location, &now).await?;
    tx.commit().await?;

    log::info!("Created client {client_id}");
    Ok(client_id)
}

/// Updates the client and upserts its primary location.
pub async fn update_client(
    pool: &SqlitePool,
    client_id: &str,
    input: &ClientInput,
) -> Result<(), StoreError> {
    let now = now_rfc3339();
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"UPDATE clients
           SET name = ?, email = ?, phone = ?, cleaning_frequency = ?, referral_source = ?,
               active = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.cleaning_frequency)
    .bind(&input.referral_source)
    .bind(input.active)
    .bind(&now)
    .bind(client_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound("client"));
    }

    let existing = sqlx::query_as::<_, (String,)>(
        r#"SELECT id FROM service_locations
           WHERE client_id = ?
           ORDER BY is_primary DESC, created_at
           LIMIT 1"#,
    )
    .bind(client_id)
    .fetch_optional(&mut *tx)
    .await?;

    match existing {
        Some((location_id,)) => update_location(&mut tx, &location_id, &input.location, &now).await?,
        None => insert_location(&mut tx, client_id, &input.location, &now).await?,
    }

    tx.commit().await?;
    log::info!("Updated client {client_id}");
    Ok(())
}

async fn insert_location(
    tx: &mut Transaction<'_, Sqlite>,
    client_id: &str,
    location: &LocationInput,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO service_locations
           (id, client_id, street, street_number, neighborhood, city, state, postal_code,
            complement, reference_point, access_instructions, pool_type, pool_size,
            products_used, equipment, preferred_time, notes, latitude, longitude,
            address_validated, is_primary, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)"#,
    )
    .bind(new_id())
    .bind(client_id)
    .bind(&location.street)
    .bind(&location.street_number)
    .bind(&location.neighborhood)
    .bind(&location.city)
    .bind(&location.state)
    .bind(&location.postal_code)
    .bind(&location.complement)
    .bind(&location.reference_point)
    .bind(&location.access_instructions)
    .bind(&location.pool_type)
    .bind(&location.pool_size)
    .bind(&location.products_used)
    .bind(&location.equipment)
    .bind(&location.preferred_time)
    .bind(&location.notes)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(location.address_validated)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn update_location(
    tx: &mut Transaction<'_, Sqlite>,
    location_id: &str,
    location: &LocationInput,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE service_locations
           SET street = ?, street_number = ?, neighborhood = ?, city = ?, state = ?,
               postal_code = ?, complement = ?, reference_point = ?, access_instructions = ?,
               pool_type = ?, pool_size = ?, products_used = ?, equipment = ?,
               preferred_time = ?, notes = ?, latitude = ?, longitude = ?,
               address_validated = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&location.street)
    .bind(&location.street_number)
    .bind(&location.neighborhood)
    .bind(&location.city)
    .bind(&location.state)
    .bind(&location.postal_code)
    .bind(&location.complement)
    .bind(&location.reference_point)
    .bind(&location.access_instructions)
    .bind(&location.pool_type)
    .bind(&location.pool_size)
    .bind(&location.products_used)
    .bind(&location.equipment)
    .bind(&location.preferred_time)
    .bind(&location.notes)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(location.address_validated)
    .bind(now)
    .bind(location_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[actix_web::test]
    async fn create_client_with_primary_location() {
        let pool = testing::pool().await;
        let (client_id, location_id) = testing::client(&pool, "Ana Souza").await;

        let client = find_client(&pool, &client_id)
            .await
            .expect("query")
            .expect("client");
        assert_eq!(client.name, "Ana Souza");
        assert!(client.active);

        let location = primary_location(&pool, &client_id)
            .await
            .expect("query")
            .expect("location");
        assert_eq!(location.id, location_id);
        assert!(location.is_primary);
        assert_eq!(location.address_line(), "Rua Augusta, 1500, Consolação, São Paulo");
        assert_eq!(location.latitude, Some(-23.5558));
    }

    #[actix_web::test]
    async fn update_replaces_primary_location_fields() {
        let pool = testing::pool().await;
        let (client_id, location_id) = testing::client(&pool, "Bruno").await;

        let mut input = testing::client_input("Bruno Dias");
        input.active = false;
        input.location.street = "Avenida Paulista".to_string();
        input.location.pool_size = "8x4m".to_string();
        update_client(&pool, &client_id, &input).await.expect("update");

        let clients = list_clients_with_locations(&pool).await.expect("list");
        assert_eq!(clients.len(), 1);
        let (client, locations) = &clients[0];
        assert_eq!(client.name, "Bruno Dias");
        assert!(!client.active);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].id, location_id);
        assert_eq!(locations[0].street, "Avenida Paulista");
        assert_eq!(locations[0].pool_size, "8x4m");
    }

    #[actix_web::test]
    async fn updating_a_missing_client_fails() {
        let pool = testing::pool().await;
        let err = update_client(&pool, "missing", &testing::client_input("Nobody"))
            .await
            .expect_err("missing client");
        assert!(matches!(err, StoreError::NotFound("client")));
    }

    #[actix_web::test]
    async fn clients_are_sorted_by_name() {
        let pool = testing::pool().await;
        testing::client(&pool, "Carla").await;
        testing::client(&pool, "Alice").await;

        let names: Vec<_> = list_clients(&pool)
            .await
            .expect("list")
            .into_iter()
            .map(|client| client.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Carla"]);
    }
}
