use actix_web::{error::ErrorInternalServerError, web, HttpResponse, Result};
use askama::Template;

use crate::{
    auth::AuthUser,
    db::{self, appointments::AppointmentFilter, log_activity, StoreError},
    filters,
    models::{CleanerRow, ROLE_CLEANER, ROLE_MANAGER, SERVICE_AREAS, WEEKDAYS},
    routes::{see_other, AppointmentView, Choice},
    schedule::now_local,
    state::AppState,
    templates::render,
    validation::{CleanerInput, FormFields, MIN_PASSWORD_LEN},
};

#[derive(Clone, Debug)]
struct CleanerSummary {
    id: String,
    name: String,
    email: String,
    personal_phone: String,
    role: String,
    active: bool,
    available_days: String,
    service_areas: String,
    has_login: bool,
}

impl From<CleanerRow> for CleanerSummary {
    fn from(row: CleanerRow) -> Self {
        Self {
            available_days: row.available_day_list().join(", "),
            service_areas: row.service_area_list().join(", "),
            has_login: row.user_id.is_some(),
            id: row.id,
            name: row.name,
            email: row.email,
            personal_phone: row.personal_phone,
            role: row.role,
            active: row.active,
        }
    }
}

#[derive(Template)]
#[template(path = "cleaners.html")]
struct CleanersTemplate {
    cleaners: Vec<CleanerSummary>,
}

#[derive(Clone, Debug, Default)]
struct CleanerForm {
    name: String,
    email: String,
    personal_phone: String,
    company_phone: String,
    active: bool,
    work_start_time: String,
    work_end_time: String,
    has_vehicle: bool,
    vehicle_type: String,
    address: String,
    emergency_contact_name: String,
    emergency_contact_phone: String,
    employee_code: String,
    hire_date: String,
    available_days: Vec<String>,
    service_areas: Vec<String>,
    role: String,
    has_login: bool,
}

impl CleanerForm {
    fn from_fields(fields: &FormFields, has_login: bool) -> Self {
        Self {
            name: fields.text("name"),
            email: fields.text("email"),
            personal_phone: fields.text("personal_phone"),
            company_phone: fields.text("company_phone"),
            active: fields.flag("active"),
            work_start_time: fields.text("work_start_time"),
            work_end_time: fields.text("work_end_time"),
            has_vehicle: fields.flag("has_vehicle"),
            vehicle_type: fields.text("vehicle_type"),
            address: fields.text("address"),
            emergency_contact_name: fields.text("emergency_contact_name"),
            emergency_contact_phone: fields.text("emergency_contact_phone"),
            employee_code: fields.text("employee_code"),
            hire_date: fields.text("hire_date"),
            available_days: fields.values("available_days"),
            service_areas: fields.values("service_areas"),
            role: fields.text("role"),
            has_login,
        }
    }

    fn from_row(row: CleanerRow) -> Self {
        Self {
            available_days: row.available_day_list(),
            service_areas: row.service_area_list(),
            has_login: row.user_id.is_some(),
            name: row.name,
            email: row.email,
            personal_phone: row.personal_phone,
            company_phone: row.company_phone,
            active: row.active,
            work_start_time: row.work_start_time.unwrap_or_default(),
            work_end_time: row.work_end_time.unwrap_or_default(),
            has_vehicle: row.has_vehicle,
            vehicle_type: row.vehicle_type,
            address: row.address,
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_phone: row.emergency_contact_phone,
            employee_code: row.employee_code,
            hire_date: row.hire_date,
            role: row.role,
        }
    }
}

#[derive(Template)]
#[template(path = "cleaner_form.html")]
struct CleanerFormTemplate {
    cleaner_id: String,
    form: CleanerForm,
    errors: Vec<String>,
    weekdays: Vec<Choice>,
    areas: Vec<Choice>,
    roles: Vec<Choice>,
    min_password: usize,
    recent: Vec<AppointmentView>,
}

impl CleanerFormTemplate {
    fn new(cleaner_id: String, form: CleanerForm, errors: Vec<String>, recent: Vec<AppointmentView>) -> Self {
        Self {
            cleaner_id,
            weekdays: Choice::plain(&WEEKDAYS, &form.available_days),
            areas: Choice::plain(&SERVICE_AREAS, &form.service_areas),
            roles: Choice::plain(&[ROLE_CLEANER, ROLE_MANAGER], &[form.role.clone()]),
            min_password: MIN_PASSWORD_LEN,
            form,
            errors,
            recent,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/cleaners")
            .route(web::get().to(list_cleaners))
            .route(web::post().to(create_cleaner)),
    )
    .service(web::resource("/cleaners/new").route(web::get().to(new_cleaner)))
    .service(
        web::resource("/cleaners/{id}")
            .route(web::get().to(edit_cleaner))
            .route(web::post().to(update_cleaner)),
    );
}

async fn list_cleaners(state: web::Data<AppState>) -> Result<HttpResponse> {
    let cleaners = db::cleaners::list_cleaners(&state.db, false)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not list cleaners: {err}");
            Vec::new()
        })
        .into_iter()
        .map(CleanerSummary::from)
        .collect();
    Ok(render(CleanersTemplate { cleaners }))
}

async fn new_cleaner() -> Result<HttpResponse> {
    let form = CleanerForm {
        active: true,
        role: ROLE_CLEANER.to_string(),
        ..CleanerForm::default()
    };
    Ok(render(CleanerFormTemplate::new(String::new(), form, Vec::new(), Vec::new())))
}

async fn create_cleaner(
    state: web::Data<AppState>,
    form: web::Form<Vec<(String, String)>>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let fields = FormFields::new(form.into_inner());
    let rerender = |errors: Vec<String>| {
        let view = CleanerForm::from_fields(&fields, false);
        render(CleanerFormTemplate::new(String::new(), view, errors, Vec::new()))
    };

    let input = match CleanerInput::from_form(&fields, true) {
        Ok(input) => input,
        Err(errors) => return Ok(rerender(errors)),
    };

    let cleaner_id = match db::cleaners::create_cleaner(&state.db, &input).await {
        Ok(id) => id,
        Err(err) => match err.form_errors() {
            Some(errors) => return Ok(rerender(errors)),
            None => return Err(ErrorInternalServerError(err)),
        },
    };

    log_activity(
        &state.db,
        "cleaner_created",
        &format!("{} added cleaner {}.", auth.display_name, input.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(see_other(format!("/admin/cleaners/{cleaner_id}")))
}

async fn edit_cleaner(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let cleaner_id = path.into_inner();
    let cleaner = db::cleaners::find_cleaner(&state.db, &cleaner_id)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load cleaner {cleaner_id}: {err}");
            None
        });
    let Some(cleaner) = cleaner else {
        return Ok(HttpResponse::NotFound().body("Cleaner not found"));
    };

    let recent = recent_work(&state, &cleaner_id).await;
    Ok(render(CleanerFormTemplate::new(
        cleaner_id,
        CleanerForm::from_row(cleaner),
        Vec::new(),
        recent,
    )))
}

async fn update_cleaner(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<Vec<(String, String)>>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let cleaner_id = path.into_inner();
    let existing = db::cleaners::find_cleaner(&state.db, &cleaner_id)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load cleaner {cleaner_id}: {err}");
            None
        });
    let Some(existing) = existing else {
        return Ok(HttpResponse::NotFound().body("Cleaner not found"));
    };

    let fields = FormFields::new(form.into_inner());
    let has_login = existing.user_id.is_some();
    let errors = match CleanerInput::from_form(&fields, false) {
        Ok(input) => match db::cleaners::update_cleaner(&state.db, &cleaner_id, &input).await {
            Ok(()) => {
                log_activity(
                    &state.db,
                    "cleaner_updated",
                    &format!("{} updated cleaner {}.", auth.display_name, input.name),
                    Some(&auth.id),
                    None,
                )
                .await;
                return Ok(see_other(format!("/admin/cleaners/{cleaner_id}")));
            }
            Err(StoreError::NotFound(_)) => {
                return Ok(HttpResponse::NotFound().body("Cleaner not found"));
            }
            Err(err) => err.form_errors().ok_or_else(|| ErrorInternalServerError(err))?,
        },
        Err(errors) => errors,
    };

    let recent = recent_work(&state, &cleaner_id).await;
    let view = CleanerForm::from_fields(&fields, has_login);
    Ok(render(CleanerFormTemplate::new(cleaner_id, view, errors, recent)))
}

/// The cleaner's appointments up to today, latest first.
async fn recent_work(state: &AppState, cleaner_id: &str) -> Vec<AppointmentView> {
    let filter = AppointmentFilter {
        cleaner_id: Some(cleaner_id.to_string()),
        ..AppointmentFilter::default()
    };
    let today_end = format!("{}T23:59:59", now_local().date());
    db::appointments::list_appointments(&state.db, &filter)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load work for cleaner {cleaner_id}: {err}");
            Vec::new()
        })
        .into_iter()
        .rev()
        .filter(|row| row.scheduled_at <= today_end)
        .take(10)
        .map(AppointmentView::from)
        .collect()
}
