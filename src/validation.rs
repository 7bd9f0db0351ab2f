//! Form parsing and required-field checks.
//!
//! Forms arrive as raw `name=value` pairs so multi-valued checkboxes survive
//! url decoding. Each `from_form` either returns a clean input or the list
//! of messages to show above the form.

use crate::{
    geocode::normalize_postal_code,
    models::{
        is_valid_status, CLEANING_FREQUENCIES, REFERRAL_SOURCES, ROLE_CLEANER, ROLE_MANAGER,
        SERVICE_AREAS, SERVICE_FREQUENCIES, STATUS_SCHEDULED, WEEKDAYS,
    },
    schedule::{format_timestamp, parse_timestamp},
};

pub const MIN_PASSWORD_LEN: usize = 8;
const PHONE_DIGITS: usize = 11;

#[derive(Debug, Clone, Default)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// Trimmed value of the first field with this name, empty when missing.
    pub fn text(&self, name: &str) -> String {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default()
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        Some(self.text(name)).filter(|value| !value.is_empty())
    }

    pub fn values(&self, name: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Checkboxes post `on` when ticked and nothing otherwise.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.text(name).as_str(), "on" | "true" | "1")
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.optional(name).and_then(|value| value.replace(',', ".").parse().ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentInput {
    pub client_id: String,
    pub cleaner_id: String,
    pub service_location_id: String,
    pub service_type_id: Option<String>,
    pub task_ids: Vec<String>,
    pub scheduled_at: String,
    pub status: String,
    pub description: String,
    pub additional_notes: String,
    pub frequency: Option<String>,
}

impl AppointmentInput {
    pub fn from_form(fields: &FormFields) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();
        let input = Self {
            client_id: fields.text("client_id"),
            cleaner_id: fields.text("cleaner_id"),
            service_location_id: fields.text("service_location_id"),
            service_type_id: fields.optional("service_type_id"),
            task_ids: fields.values("task_ids"),
            scheduled_at: fields.text("scheduled_at"),
            status: fields
                .optional("status")
                .unwrap_or_else(|| STATUS_SCHEDULED.to_string()),
            description: fields.text("description"),
            additional_notes: fields.text("additional_notes"),
            frequency: fields.optional("frequency"),
        };

        if input.client_id.is_empty() {
            errors.push("Client is required.".to_string());
        }
        if input.cleaner_id.is_empty() {
            errors.push("Cleaner is required.".to_string());
        }
        if input.service_location_id.is_empty() {
            errors.push("Service location is required.".to_string());
        }
        if !is_valid_status(&input.status) {
            errors.push(format!("Unknown status '{}'.", input.status));
        }
        if let Some(frequency) = input.frequency.as_deref() {
            if !SERVICE_FREQUENCIES.contains(&frequency) {
                errors.push(format!("Unknown frequency '{frequency}'."));
            }
        }

        let scheduled_at = if input.scheduled_at.is_empty() {
            errors.push("Please pick a date and time.".to_string());
            None
        } else {
            let parsed = parse_timestamp(&input.scheduled_at);
            if parsed.is_none() {
                errors.push("Schedule must be a valid date and time.".to_string());
            }
            parsed
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            scheduled_at: scheduled_at.map(format_timestamp).unwrap_or_default(),
            ..input
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationInput {
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
}

impl LocationInput {
    pub fn from_form(fields: &FormFields) -> Self {
        let postal_code = fields.text("postal_code");
        let latitude = fields.number("latitude");
        let longitude = fields.number("longitude");
        Self {
            street: fields.text("street"),
            street_number: fields.text("street_number"),
            neighborhood: fields.text("neighborhood"),
            city: fields.text("city"),
            state: fields.text("state"),
            postal_code: normalize_postal_code(&postal_code).unwrap_or(postal_code),
            complement: fields.text("complement"),
            reference_point: fields.text("reference_point"),
            access_instructions: fields.text("access_instructions"),
            pool_type: fields.text("pool_type"),
            pool_size: fields.text("pool_size"),
            products_used: fields.text("products_used"),
            equipment: fields.text("equipment"),
            preferred_time: fields.text("preferred_time"),
            notes: fields.text("location_notes"),
            latitude,
            longitude,
            address_validated: fields.flag("address_validated")
                && latitude.is_some()
                && longitude.is_some(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub cleaning_frequency: String,
    pub referral_source: String,
    pub active: bool,
    pub location: LocationInput,
}

impl ClientInput {
    pub fn from_form(fields: &FormFields) -> Result<Self, Vec<String>> {
        let input = Self {
            name: fields.text("name"),
            email: fields.text("email"),
            phone: fields.text("phone"),
            cleaning_frequency: fields.text("cleaning_frequency"),
            referral_source: fields.text("referral_source"),
            active: fields.flag("active"),
            location: LocationInput::from_form(fields),
        };

        let mut errors = Vec::new();
        if input.name.is_empty() {
            errors.push("Name is required.".to_string());
        }
        if input.email.is_empty() {
            errors.push("E-mail is required.".to_string());
        }
        if input.phone.is_empty() {
            errors.push("Phone is required.".to_string());
        }
        if !input.cleaning_frequency.is_empty()
            && !CLEANING_FREQUENCIES.contains(&input.cleaning_frequency.as_str())
        {
            errors.push("Unknown cleaning frequency.".to_string());
        }
        if !input.referral_source.is_empty()
            && !REFERRAL_SOURCES.contains(&input.referral_source.as_str())
        {
            errors.push("Unknown referral source.".to_string());
        }

        if errors.is_empty() {
            Ok(input)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanerInput {
    pub name: String,
    pub email: String,
    pub personal_phone: String,
    pub company_phone: String,
    pub active: bool,
    pub available_days: Vec<String>,
    pub work_start_time: Option<String>,
    pub work_end_time: Option<String>,
    pub service_areas: Vec<String>,
    pub has_vehicle: bool,
    pub vehicle_type: String,
    pub address: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub employee_code: String,
    pub hire_date: String,
    pub role: String,
    pub password: Option<String>,
}

impl CleanerInput {
    /// A password is mandatory when `creating`; on edit an empty password
    /// keeps the current one.
    pub fn from_form(fields: &FormFields, creating: bool) -> Result<Self, Vec<String>> {
        let has_vehicle = fields.flag("has_vehicle");
        let input = Self {
            name: fields.text("name"),
            email: fields.text("email").to_lowercase(),
            personal_phone: fields.text("personal_phone"),
            company_phone: fields.text("company_phone"),
            active: fields.flag("active"),
            available_days: fields
                .values("available_days")
                .into_iter()
                .filter(|day| WEEKDAYS.contains(&day.as_str()))
                .collect(),
            work_start_time: fields.optional("work_start_time"),
            work_end_time: fields.optional("work_end_time"),
            service_areas: fields
                .values("service_areas")
                .into_iter()
                .filter(|area| SERVICE_AREAS.contains(&area.as_str()))
                .collect(),
            has_vehicle,
            vehicle_type: if has_vehicle {
                fields.text("vehicle_type")
            } else {
                String::new()
            },
            address: fields.text("address"),
            emergency_contact_name: fields.text("emergency_contact_name"),
            emergency_contact_phone: fields.text("emergency_contact_phone"),
            employee_code: fields.text("employee_code"),
            hire_date: fields.text("hire_date"),
            role: fields
                .optional("role")
                .unwrap_or_else(|| ROLE_CLEANER.to_string()),
            password: fields.optional("password"),
        };

        let mut errors = Vec::new();
        if input.name.is_empty() {
            errors.push("Name is required.".to_string());
        }
        if let Some(message) = email_error(&input.email) {
            errors.push(message.to_string());
        }
        for (label, phone) in [
            ("Personal phone", &input.personal_phone),
            ("Company phone", &input.company_phone),
            ("Emergency contact phone", &input.emergency_contact_phone),
        ] {
            if !phone_is_valid(phone) {
                errors.push(format!("{label} must have {PHONE_DIGITS} digits."));
            }
        }
        if input.role != ROLE_CLEANER && input.role != ROLE_MANAGER {
            errors.push(format!("Unknown role '{}'.", input.role));
        }
        if let Some(message) =
            password_error(input.password.as_deref(), &fields.text("confirm_password"), creating)
        {
            errors.push(message.to_string());
        }

        if errors.is_empty() {
            Ok(input)
        } else {
            Err(errors)
        }
    }
}

pub fn email_error(email: &str) -> Option<&'static str> {
    if email.is_empty() {
        return Some("E-mail is required.");
    }
    if !email_is_valid(email) {
        return Some("Invalid e-mail.");
    }
    None
}

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn email_is_valid(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain
            .char_indices()
            .any(|(index, ch)| ch == '.' && index > 0 && index + 1 < domain.len())
}

/// Empty phones are allowed; otherwise exactly 11 digits once formatting is stripped.
pub fn phone_is_valid(phone: &str) -> bool {
    phone.is_empty() || phone.chars().filter(char::is_ascii_digit).count() == PHONE_DIGITS
}

fn password_error(password: Option<&str>, confirmation: &str, creating: bool) -> Option<&'static str> {
    let Some(password) = password else {
        return creating.then_some("Password is required.");
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters.");
    }
    if password != confirmation {
        return Some("Passwords do not match.");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::new(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }

    #[test]
    fn appointment_requires_links_and_schedule() {
        let errors = AppointmentInput::from_form(&fields(&[("description", "x")]))
            .expect_err("missing fields");
        assert_eq!(
            errors,
            vec![
                "Client is required.",
                "Cleaner is required.",
                "Service location is required.",
                "Please pick a date and time.",
            ]
        );
    }

    #[test]
    fn appointment_in_the_past_is_accepted() {
        let input = AppointmentInput::from_form(&fields(&[
            ("client_id", "c1"),
            ("cleaner_id", "k1"),
            ("service_location_id", "l1"),
            ("scheduled_at", "2001-01-01T08:00"),
            ("task_ids", "t1"),
            ("task_ids", "t2"),
            ("service_type_id", ""),
        ]))
        .expect("valid");
        assert_eq!(input.scheduled_at, "2001-01-01T08:00:00");
        assert_eq!(input.status, STATUS_SCHEDULED);
        assert_eq!(input.task_ids, vec!["t1", "t2"]);
        assert_eq!(input.service_type_id, None);
    }

    #[test]
    fn appointment_rejects_unknown_status_and_bad_dates() {
        let errors = AppointmentInput::from_form(&fields(&[
            ("client_id", "c1"),
            ("cleaner_id", "k1"),
            ("service_location_id", "l1"),
            ("scheduled_at", "tomorrow"),
            ("status", "pending"),
        ]))
        .expect_err("invalid");
        assert_eq!(
            errors,
            vec![
                "Unknown status 'pending'.",
                "Schedule must be a valid date and time.",
            ]
        );
    }

    #[test]
    fn client_location_is_normalized() {
        let input = ClientInput::from_form(&fields(&[
            ("name", "Ana Souza"),
            ("email", "ana@example.com"),
            ("phone", "(11) 98765-4321"),
            ("active", "on"),
            ("postal_code", "01310100"),
            ("latitude", "-23.56"),
            ("longitude", "-46.65"),
            ("address_validated", "true"),
        ]))
        .expect("valid");
        assert!(input.active);
        assert_eq!(input.location.postal_code, "01310-100");
        assert!(input.location.address_validated);
    }

    #[test]
    fn unvalidated_address_without_coordinates() {
        let input = ClientInput::from_form(&fields(&[
            ("name", "Ana"),
            ("email", "ana@example.com"),
            ("phone", "11987654321"),
            ("address_validated", "true"),
        ]))
        .expect("valid");
        assert!(!input.location.address_validated);
        assert!(!input.active);
    }

    #[test]
    fn client_requires_contact_fields() {
        let errors = ClientInput::from_form(&fields(&[])).expect_err("empty");
        assert_eq!(
            errors,
            vec!["Name is required.", "E-mail is required.", "Phone is required."]
        );
    }

    #[test]
    fn email_shapes() {
        assert!(email_is_valid("joao@pool.com.br"));
        assert!(!email_is_valid("joao@pool"));
        assert!(!email_is_valid("joao@.com"));
        assert!(!email_is_valid("jo ao@pool.com"));
        assert!(!email_is_valid("a@b@c.com"));
        assert!(!email_is_valid("@pool.com"));
    }

    #[test]
    fn phones_need_eleven_digits() {
        assert!(phone_is_valid(""));
        assert!(phone_is_valid("(11) 98765-4321"));
        assert!(!phone_is_valid("9876-4321"));
    }

    #[test]
    fn new_cleaner_needs_matching_password() {
        let base = [
            ("name", "João Lima"),
            ("email", "Joao@Pool.com"),
            ("personal_phone", "11987654321"),
        ];

        let errors = CleanerInput::from_form(&fields(&base), true).expect_err("no password");
        assert_eq!(errors, vec!["Password is required."]);

        let mut short = base.to_vec();
        short.extend([("password", "abc"), ("confirm_password", "abc")]);
        let errors = CleanerInput::from_form(&fields(&short), true).expect_err("short");
        assert_eq!(errors, vec!["Password must be at least 8 characters."]);

        let mut mismatch = base.to_vec();
        mismatch.extend([("password", "abcdefgh"), ("confirm_password", "abcdefgx")]);
        let errors = CleanerInput::from_form(&fields(&mismatch), true).expect_err("mismatch");
        assert_eq!(errors, vec!["Passwords do not match."]);

        let mut ok = base.to_vec();
        ok.extend([
            ("password", "abcdefgh"),
            ("confirm_password", "abcdefgh"),
            ("available_days", "monday"),
            ("available_days", "funday"),
            ("vehicle_type", "van"),
        ]);
        let input = CleanerInput::from_form(&fields(&ok), true).expect("valid");
        assert_eq!(input.email, "joao@pool.com");
        assert_eq!(input.available_days, vec!["monday"]);
        assert_eq!(input.role, ROLE_CLEANER);
        assert_eq!(input.vehicle_type, "");
    }

    #[test]
    fn editing_a_cleaner_keeps_the_password_optional() {
        let input = CleanerInput::from_form(
            &fields(&[("name", "João"), ("email", "joao@pool.com"), ("active", "on")]),
            false,
        )
        .expect("valid");
        assert_eq!(input.password, None);
        assert!(input.active);
    }

    #[test]
    fn cleaner_phone_errors_are_labelled() {
        let errors = CleanerInput::from_form(
            &fields(&[
                ("name", "João"),
                ("email", "joao@pool.com"),
                ("company_phone", "1234"),
                ("role", "admin"),
            ]),
            false,
        )
        .expect_err("invalid");
        assert_eq!(
            errors,
            vec!["Company phone must have 11 digits.", "Unknown role 'admin'."]
        );
    }
}
