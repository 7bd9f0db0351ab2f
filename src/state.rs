use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::{config::AppConfig, geocode::NominatimClient, models::AppointmentRow};

pub const EVENT_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
    pub geocoder: NominatimClient,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: SqlitePool, geocoder: NominatimClient, config: AppConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            events,
            geocoder,
            config,
        }
    }

    /// Nobody listening is not an error.
    pub fn publish(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub appointment_id: Option<String>,
    pub status: Option<String>,
    pub client_name: Option<String>,
    pub cleaner_id: Option<String>,
    pub cleaner_name: Option<String>,
    pub address: Option<String>,
    pub scheduled_at: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ServerEvent {
    pub fn from_row(kind: &str, row: AppointmentRow) -> Self {
        let address = row.address_line();
        Self {
            kind: kind.to_string(),
            appointment_id: Some(row.id),
            status: Some(row.status),
            client_name: Some(row.client_name),
            cleaner_id: Some(row.cleaner_id),
            cleaner_name: Some(row.cleaner_name),
            address: Some(address),
            scheduled_at: Some(row.scheduled_at),
            latitude: row.latitude,
            longitude: row.longitude,
        }
    }

    pub fn appointment_deleted(appointment_id: &str) -> Self {
        Self {
            kind: "appointment_deleted".to_string(),
            appointment_id: Some(appointment_id.to_string()),
            ..Self::default()
        }
    }

    pub fn cleaner_location(cleaner_id: &str, cleaner_name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            kind: "cleaner_location".to_string(),
            cleaner_id: Some(cleaner_id.to_string()),
            cleaner_name: Some(cleaner_name.to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::default()
        }
    }
}
