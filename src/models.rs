use serde::Serialize;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_CLEANER: &str = "cleaner";

pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";

pub const STATUSES: [&str; 4] = [
    STATUS_SCHEDULED,
    STATUS_IN_PROGRESS,
    STATUS_COMPLETED,
    STATUS_CANCELLED,
];

pub const SERVICE_FREQUENCIES: [&str; 4] = ["weekly", "bi_weekly", "monthly", "one_time"];

pub const CLEANING_FREQUENCIES: [&str; 3] = ["weekly", "bi_weekly", "monthly"];

pub const REFERRAL_SOURCES: [&str; 5] = ["referral", "google", "instagram", "facebook", "other"];

pub const WEEKDAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

pub const SERVICE_AREAS: [&str; 5] = ["South Zone", "North Zone", "East Zone", "West Zone", "Downtown"];

pub fn is_valid_status(status: &str) -> bool {
    STATUSES.contains(&status)
}

/// Joins the non-empty address parts with `", "`.
pub fn format_address(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub password_hash: String,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub cleaning_frequency: String,
    pub referral_source: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct ServiceLocationRow {
    pub id: String,
    pub client_id: String,
    pub street: String,
    pub street_number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub complement: String,
    pub reference_point: String,
    pub access_instructions: String,
    pub pool_type: String,
    pub pool_size: String,
    pub products_used: String,
    pub equipment: String,
    pub preferred_time: String,
    pub notes: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address_validated: bool,
    pub is_primary: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ServiceLocationRow {
    pub fn address_line(&self) -> String {
        format_address(&[&self.street, &self.street_number, &self.neighborhood, &self.city])
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CleanerRow {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub email: String,
    pub personal_phone: String,
    pub company_phone: String,
    pub active: bool,
    pub available_days: String,
    pub work_start_time: Option<String>,
    pub work_end_time: Option<String>,
    pub service_areas: String,
    pub has_vehicle: bool,
    pub vehicle_type: String,
    pub address: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub employee_code: String,
    pub hire_date: String,
    pub role: String,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_seen_at: Option<String>,
    pub created_at: String,
}

impl CleanerRow {
    pub fn available_day_list(&self) -> Vec<String> {
        split_list(&self.available_days)
    }

    pub fn service_area_list(&self) -> Vec<String> {
        split_list(&self.service_areas)
    }
}

/// Sets are stored as comma separated text.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceTypeRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub duration_minutes: i64,
    pub price: f64,
    pub frequency: String,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceTaskRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub duration_minutes: i64,
    pub price: f64,
    pub created_at: String,
}

/// An appointment joined with the names and address it points at.
#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub cleaner_id: String,
    pub cleaner_name: String,
    pub service_location_id: String,
    pub street: String,
    pub street_number: String,
    pub neighborhood: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub service_type_id: Option<String>,
    pub service_type_name: Option<String>,
    pub scheduled_at: String,
    pub status: String,
    pub description: String,
    pub additional_notes: String,
    pub frequency: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AppointmentRow {
    pub fn address_line(&self) -> String {
        format_address(&[&self.street, &self.street_number, &self.neighborhood, &self.city])
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodayMetrics {
    pub scheduled: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_address_skips_blank_parts() {
        let line = format_address(&["Rua Augusta", "", " Consolação ", "São Paulo"]);
        assert_eq!(line, "Rua Augusta, Consolação, São Paulo");
    }

    #[test]
    fn list_columns_ignore_empty_entries() {
        assert_eq!(split_list("monday, ,friday,"), vec!["monday", "friday"]);
        assert_eq!(
            join_list(&["monday".to_string(), " ".to_string(), "friday".to_string()]),
            "monday,friday"
        );
    }

    #[test]
    fn cancelled_is_a_known_status() {
        assert!(is_valid_status(STATUS_CANCELLED));
        assert!(!is_valid_status("pending"));
    }
}
