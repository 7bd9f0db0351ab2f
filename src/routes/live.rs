use std::collections::HashMap;

use actix_web::{web, HttpResponse, Result};
use askama::Template;
use serde::{Deserialize, Serialize};

use crate::{
    db,
    models::{AppointmentRow, CleanerRow},
    routes::{non_empty, Choice},
    schedule::{format_timestamp, minutes_between, now_local},
    state::AppState,
    templates::render,
};

/// São Paulo city centre.
const DEFAULT_CENTER: (f64, f64) = (-23.5505, -46.6333);
const DEFAULT_ZOOM: u8 = 11;

#[derive(Template)]
#[template(path = "live.html")]
struct LiveTemplate {
    cleaners: Vec<Choice>,
    tile_url: String,
    refresh_seconds: u64,
    center_lat: f64,
    center_lon: f64,
    zoom: u8,
}

#[derive(Deserialize)]
struct ActiveQuery {
    cleaner_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSource {
    Cleaner,
    Location,
}

/// One in-progress job on the map.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveMarker {
    pub appointment_id: String,
    pub cleaner_id: String,
    pub cleaner_name: String,
    pub client_name: String,
    pub address: String,
    pub started_at: Option<String>,
    pub minutes_elapsed: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub position_source: Option<PositionSource>,
}

impl ActiveMarker {
    /// The cleaner's last report wins over the service location. Jobs with
    /// neither stay in the table without a map position.
    fn build(row: AppointmentRow, cleaner: Option<&CleanerRow>, now: &str) -> Self {
        let reported = cleaner.and_then(|cleaner| cleaner.last_latitude.zip(cleaner.last_longitude));
        let (position, position_source) = match (reported, row.latitude.zip(row.longitude)) {
            (Some(position), _) => (Some(position), Some(PositionSource::Cleaner)),
            (None, Some(position)) => (Some(position), Some(PositionSource::Location)),
            (None, None) => (None, None),
        };
        let address = row.address_line();
        Self {
            minutes_elapsed: minutes_between(row.started_at.as_deref(), Some(now)),
            appointment_id: row.id,
            cleaner_id: row.cleaner_id,
            cleaner_name: row.cleaner_name,
            client_name: row.client_name,
            address,
            started_at: row.started_at,
            latitude: position.map(|(lat, _)| lat),
            longitude: position.map(|(_, lon)| lon),
            position_source,
        }
    }
}

#[derive(Serialize)]
struct ActiveResponse {
    appointments: Vec<ActiveMarker>,
    refreshed_at: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/live").route(web::get().to(live_page)))
        .service(web::resource("/live/active").route(web::get().to(active)));
}

async fn live_page(state: web::Data<AppState>) -> Result<HttpResponse> {
    let cleaners = db::cleaners::list_cleaners(&state.db, true)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load cleaners: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|cleaner| Choice::new(cleaner.id, cleaner.name, false))
        .collect();

    Ok(render(LiveTemplate {
        cleaners,
        tile_url: state.config.map_tile_url.clone(),
        refresh_seconds: state.config.live_refresh_seconds,
        center_lat: DEFAULT_CENTER.0,
        center_lon: DEFAULT_CENTER.1,
        zoom: DEFAULT_ZOOM,
    }))
}

async fn active(state: web::Data<AppState>, query: web::Query<ActiveQuery>) -> Result<HttpResponse> {
    let cleaner_id = non_empty(&query.cleaner_id);
    let rows = db::appointments::list_active(&state.db, cleaner_id.as_deref())
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load active appointments: {err}");
            Vec::new()
        });
    let cleaners: HashMap<String, CleanerRow> = db::cleaners::list_cleaners(&state.db, false)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load cleaners: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|cleaner| (cleaner.id.clone(), cleaner))
        .collect();

    let now = format_timestamp(now_local());
    let appointments = rows
        .into_iter()
        .map(|row| {
            let cleaner = cleaners.get(&row.cleaner_id);
            ActiveMarker::build(row, cleaner, &now)
        })
        .collect();

    Ok(HttpResponse::Ok().json(ActiveResponse {
        appointments,
        refreshed_at: now,
    }))
}
