pub mod admin;
pub mod appointments;
pub mod cleaner;
pub mod cleaners;
pub mod clients;
pub mod events;
pub mod geocode;
pub mod history;
pub mod live;
pub mod public;

use actix_web::{http::header, web, HttpResponse};

use crate::{
    models::{AppointmentRow, STATUSES},
    schedule::minutes_between,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(public::configure)
        .configure(admin::configure)
        .configure(cleaner::configure)
        .configure(events::configure);
}

/// One `<option>` or checkbox.
#[derive(Clone, Debug)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            selected,
        }
    }

    /// Choices whose label is the value itself.
    pub fn plain(values: &[&str], selected: &[String]) -> Vec<Self> {
        values
            .iter()
            .map(|value| Self::new(*value, *value, selected.iter().any(|item| item.as_str() == *value)))
            .collect()
    }

    pub fn statuses(selected: &str) -> Vec<Self> {
        STATUSES
            .iter()
            .map(|status| Self::new(*status, *status, *status == selected))
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct StatCard {
    pub label: String,
    pub value: i64,
}

impl StatCard {
    pub fn new(label: &str, value: i64) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

/// An appointment as the list and detail pages show it.
#[derive(Clone, Debug)]
pub struct AppointmentView {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub cleaner_name: String,
    pub address: String,
    pub service_type: String,
    pub scheduled_at: String,
    pub status: String,
    pub description: String,
    pub notes: String,
    pub started_at: String,
    pub completed_at: String,
    pub duration_minutes: i64,
}

impl From<AppointmentRow> for AppointmentView {
    fn from(row: AppointmentRow) -> Self {
        let address = row.address_line();
        let duration_minutes = minutes_between(row.started_at.as_deref(), row.completed_at.as_deref());
        Self {
            id: row.id,
            client_id: row.client_id,
            client_name: row.client_name,
            cleaner_name: row.cleaner_name,
            address,
            service_type: row.service_type_name.unwrap_or_default(),
            scheduled_at: row.scheduled_at,
            status: row.status,
            description: row.description,
            notes: row.additional_notes,
            started_at: row.started_at.unwrap_or_default(),
            completed_at: row.completed_at.unwrap_or_default(),
            duration_minutes,
        }
    }
}

pub fn see_other(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location.as_ref()))
        .finish()
}

/// Blank query values mean "no filter".
pub fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != "all")
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) mod testing {
    use actix_web::{
        body::MessageBody,
        dev::{Service, ServiceResponse},
        http::{header, StatusCode},
        test, web,
    };
    use base64::{engine::general_purpose::STANDARD, Engine};

    use crate::{config::AppConfig, db, geocode::NominatimClient, state::AppState};

    /// State over a fresh in-memory database with the default admin seeded.
    pub async fn state() -> web::Data<AppState> {
        let pool = db::testing::pool().await;
        db::seed_defaults(&pool).await.expect("seed");
        let geocoder = NominatimClient::new("http://127.0.0.1:9/search", "tests").expect("client");
        web::Data::new(AppState::new(pool, geocoder, AppConfig::default()))
    }

    pub fn basic(user: &str, password: &str) -> (header::HeaderName, String) {
        let token = STANDARD.encode(format!("{user}:{password}"));
        (header::AUTHORIZATION, format!("Basic {token}"))
    }

    pub fn admin() -> (header::HeaderName, String) {
        basic("admin", "admin")
    }

    /// Status of a call, including rejections raised by the auth middleware.
    pub async fn status<S, R, B>(app: &S, req: R) -> StatusCode
    where
        S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    {
        match test::try_call_service(app, req).await {
            Ok(res) => res.status(),
            Err(err) => err.as_response_error().status_code(),
        }
    }

    pub async fn body_text<B: MessageBody>(res: ServiceResponse<B>) -> String {
        String::from_utf8(test::read_body(res).await.to_vec()).expect("utf8")
    }
}
