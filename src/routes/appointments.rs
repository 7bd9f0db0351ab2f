use actix_web::{error::ErrorInternalServerError, web, HttpResponse, Result};
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::AuthUser,
    db::{
        self,
        appointments::AppointmentFilter,
        log_activity, StoreError,
    },
    filters,
    models::{is_valid_status, AppointmentRow, SERVICE_FREQUENCIES},
    routes::{non_empty, see_other, AppointmentView, Choice},
    schedule::{input_timestamp, now_local, parse_date, resolve_window, DateRange},
    state::{AppState, ServerEvent},
    templates::render,
    validation::{AppointmentInput, FormFields},
};

#[derive(Deserialize, Default)]
struct ListQuery {
    range: Option<String>,
    start: Option<String>,
    end: Option<String>,
    cleaner_id: Option<String>,
    client_id: Option<String>,
    status: Option<String>,
    search: Option<String>,
}

#[derive(Template)]
#[template(path = "appointments.html")]
struct AppointmentsTemplate {
    appointments: Vec<AppointmentView>,
    ranges: Vec<Choice>,
    range: String,
    start: String,
    end: String,
    cleaners: Vec<Choice>,
    clients: Vec<Choice>,
    statuses: Vec<Choice>,
    search: String,
}

/// A service location offered in the form, tagged with its owner so the
/// page can hide the ones that do not belong to the chosen client.
#[derive(Clone, Debug)]
struct LocationChoice {
    id: String,
    client_id: String,
    label: String,
    selected: bool,
}

/// Submitted or stored values, as strings for the inputs.
#[derive(Clone, Debug, Default)]
struct AppointmentForm {
    client_id: String,
    cleaner_id: String,
    service_location_id: String,
    service_type_id: String,
    task_ids: Vec<String>,
    scheduled_at: String,
    status: String,
    description: String,
    additional_notes: String,
    frequency: String,
}

impl AppointmentForm {
    fn from_fields(fields: &FormFields) -> Self {
        Self {
            client_id: fields.text("client_id"),
            cleaner_id: fields.text("cleaner_id"),
            service_location_id: fields.text("service_location_id"),
            service_type_id: fields.text("service_type_id"),
            task_ids: fields.values("task_ids"),
            scheduled_at: fields.text("scheduled_at"),
            status: fields.text("status"),
            description: fields.text("description"),
            additional_notes: fields.text("additional_notes"),
            frequency: fields.text("frequency"),
        }
    }

    fn from_row(row: AppointmentRow, task_ids: Vec<String>) -> Self {
        Self {
            scheduled_at: input_timestamp(&row.scheduled_at),
            client_id: row.client_id,
            cleaner_id: row.cleaner_id,
            service_location_id: row.service_location_id,
            service_type_id: row.service_type_id.unwrap_or_default(),
            task_ids,
            status: row.status,
            description: row.description,
            additional_notes: row.additional_notes,
            frequency: row.frequency.unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "appointment_form.html")]
struct AppointmentFormTemplate {
    /// Empty when creating.
    appointment_id: String,
    form: AppointmentForm,
    errors: Vec<String>,
    clients: Vec<Choice>,
    locations: Vec<LocationChoice>,
    cleaners: Vec<Choice>,
    service_types: Vec<Choice>,
    tasks: Vec<Choice>,
    statuses: Vec<Choice>,
    frequencies: Vec<Choice>,
}

#[derive(Deserialize)]
struct NewQuery {
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusForm {
    status: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/appointments")
            .route(web::get().to(list_appointments))
            .route(web::post().to(create_appointment)),
    )
    .service(web::resource("/appointments/new").route(web::get().to(new_appointment)))
    .service(
        web::resource("/appointments/{id}")
            .route(web::get().to(edit_appointment))
            .route(web::post().to(update_appointment)),
    )
    .service(web::resource("/appointments/{id}/status").route(web::post().to(update_status)))
    .service(web::resource("/appointments/{id}/delete").route(web::post().to(delete_appointment)));
}

async fn list_appointments(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let range = DateRange::parse(query.range.as_deref().unwrap_or_default());
    let start = query.start.clone().unwrap_or_default();
    let end = query.end.clone().unwrap_or_default();
    let filter = AppointmentFilter {
        window: resolve_window(range, parse_date(&start), parse_date(&end), now_local()),
        cleaner_id: non_empty(&query.cleaner_id),
        client_id: non_empty(&query.client_id),
        status: non_empty(&query.status),
        search: non_empty(&query.search),
    };

    let appointments = db::appointments::list_appointments(&state.db, &filter)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not list appointments: {err}");
            Vec::new()
        })
        .into_iter()
        .map(AppointmentView::from)
        .collect();

    let selected_status = filter.status.clone().unwrap_or_default();
    Ok(render(AppointmentsTemplate {
        appointments,
        ranges: DateRange::ALL
            .iter()
            .map(|option| Choice::new(option.as_str(), option.label(), *option == range))
            .collect(),
        range: range.as_str().to_string(),
        start,
        end,
        cleaners: cleaner_choices(&state, filter.cleaner_id.as_deref().unwrap_or_default(), false).await,
        clients: client_choices(&state, filter.client_id.as_deref().unwrap_or_default()).await,
        statuses: Choice::statuses(&selected_status),
        search: filter.search.unwrap_or_default(),
    }))
}

async fn new_appointment(
    state: web::Data<AppState>,
    query: web::Query<NewQuery>,
) -> Result<HttpResponse> {
    let form = AppointmentForm {
        client_id: query.client_id.clone().unwrap_or_default(),
        status: crate::models::STATUS_SCHEDULED.to_string(),
        ..AppointmentForm::default()
    };
    Ok(render(form_template(&state, String::new(), form, Vec::new()).await))
}

async fn create_appointment(
    state: web::Data<AppState>,
    form: web::Form<Vec<(String, String)>>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let fields = FormFields::new(form.into_inner());
    let input = match AppointmentInput::from_form(&fields) {
        Ok(input) => input,
        Err(errors) => {
            let view = AppointmentForm::from_fields(&fields);
            return Ok(render(form_template(&state, String::new(), view, errors).await));
        }
    };

    let appointment_id = match db::appointments::create_appointment(&state.db, &input).await {
        Ok(id) => id,
        Err(err) => match err.form_errors() {
            Some(errors) => {
                let view = AppointmentForm::from_fields(&fields);
                return Ok(render(form_template(&state, String::new(), view, errors).await));
            }
            None => return Err(ErrorInternalServerError(err)),
        },
    };

    after_change(&state, &auth, &appointment_id, "appointment_created", "scheduled").await;
    Ok(see_other("/admin/appointments"))
}

async fn edit_appointment(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let row = db::appointments::find_appointment(&state.db, &appointment_id)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load appointment {appointment_id}: {err}");
            None
        });
    let Some(row) = row else {
        return Ok(HttpResponse::NotFound().body("Appointment not found"));
    };
    let task_ids = db::appointments::task_ids_for(&state.db, &appointment_id)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load tasks for appointment {appointment_id}: {err}");
            Vec::new()
        });

    let form = AppointmentForm::from_row(row, task_ids);
    Ok(render(form_template(&state, appointment_id, form, Vec::new()).await))
}

async fn update_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<Vec<(String, String)>>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let fields = FormFields::new(form.into_inner());
    let input = match AppointmentInput::from_form(&fields) {
        Ok(input) => input,
        Err(errors) => {
            let view = AppointmentForm::from_fields(&fields);
            return Ok(render(form_template(&state, appointment_id, view, errors).await));
        }
    };

    match db::appointments::update_appointment(&state.db, &appointment_id, &input).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return Ok(HttpResponse::NotFound().body("Appointment not found"));
        }
        Err(err) => match err.form_errors() {
            Some(errors) => {
                let view = AppointmentForm::from_fields(&fields);
                return Ok(render(form_template(&state, appointment_id, view, errors).await));
            }
            None => return Err(ErrorInternalServerError(err)),
        },
    }

    after_change(&state, &auth, &appointment_id, "appointment_updated", "updated").await;
    Ok(see_other("/admin/appointments"))
}

async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<StatusForm>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let status = form.into_inner().status;
    if !is_valid_status(&status) {
        return Ok(HttpResponse::BadRequest().body("Invalid status"));
    }

    match db::appointments::set_status(&state.db, &appointment_id, &status).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return Ok(HttpResponse::NotFound().body("Appointment not found"));
        }
        Err(err) => return Err(ErrorInternalServerError(err)),
    }

    let verb = format!("moved to {status}");
    after_change(&state, &auth, &appointment_id, "appointment_status", &verb).await;
    Ok(see_other("/admin/appointments"))
}

async fn delete_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    match db::appointments::delete_appointment(&state.db, &appointment_id).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return Ok(HttpResponse::NotFound().body("Appointment not found"));
        }
        Err(err) => return Err(ErrorInternalServerError(err)),
    }

    log_activity(
        &state.db,
        "appointment_deleted",
        &format!("{} deleted an appointment.", auth.display_name),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;
    state.publish(ServerEvent::appointment_deleted(&appointment_id));

    Ok(see_other("/admin/appointments"))
}

/// Activity entry plus a live event for the changed appointment.
async fn after_change(state: &AppState, auth: &AuthUser, appointment_id: &str, kind: &str, verb: &str) {
    let row = db::appointments::find_appointment(&state.db, appointment_id)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not reload appointment {appointment_id}: {err}");
            None
        });
    let client = row
        .as_ref()
        .map(|row| row.client_name.clone())
        .unwrap_or_default();
    log_activity(
        &state.db,
        kind,
        &format!("{} {verb} an appointment for {client}.", auth.display_name),
        Some(&auth.id),
        Some(appointment_id),
    )
    .await;
    if let Some(row) = row {
        state.publish(ServerEvent::from_row(kind, row));
    }
}

async fn form_template(
    state: &AppState,
    appointment_id: String,
    form: AppointmentForm,
    errors: Vec<String>,
) -> AppointmentFormTemplate {
    let locations = db::clients::list_clients_with_locations(&state.db)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load clients: {err}");
            Vec::new()
        });

    let clients = locations
        .iter()
        .filter(|(client, _)| client.active || client.id == form.client_id)
        .map(|(client, _)| Choice::new(&client.id, &client.name, client.id == form.client_id))
        .collect();
    let location_choices = locations
        .iter()
        .flat_map(|(_, locations)| locations.iter())
        .map(|location| LocationChoice {
            id: location.id.clone(),
            client_id: location.client_id.clone(),
            label: location.address_line(),
            selected: location.id == form.service_location_id,
        })
        .collect();

    let service_types = db::catalog::list_service_types(&state.db)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load service types: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|kind| {
            let selected = kind.id == form.service_type_id;
            Choice::new(kind.id, kind.name, selected)
        })
        .collect();
    let tasks = db::catalog::list_service_tasks(&state.db)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load service tasks: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|task| {
            let selected = form.task_ids.contains(&task.id);
            Choice::new(task.id, task.name, selected)
        })
        .collect();

    AppointmentFormTemplate {
        appointment_id,
        errors,
        clients,
        locations: location_choices,
        cleaners: cleaner_choices(state, &form.cleaner_id, true).await,
        service_types,
        tasks,
        statuses: Choice::statuses(&form.status),
        frequencies: Choice::plain(&SERVICE_FREQUENCIES, &[form.frequency.clone()]),
        form,
    }
}

/// Active cleaners, plus the selected one even when deactivated.
async fn cleaner_choices(state: &AppState, selected: &str, active_only: bool) -> Vec<Choice> {
    db::cleaners::list_cleaners(&state.db, false)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load cleaners: {err}");
            Vec::new()
        })
        .into_iter()
        .filter(|cleaner| !active_only || cleaner.active || cleaner.id == selected)
        .map(|cleaner| {
            let is_selected = cleaner.id == selected;
            Choice::new(cleaner.id, cleaner.name, is_selected)
        })
        .collect()
}

async fn client_choices(state: &AppState, selected: &str) -> Vec<Choice> {
    db::clients::list_clients(&state.db)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load clients: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|client| {
            let is_selected = client.id == selected;
            Choice::new(client.id, client.name, is_selected)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};

    use crate::{
        db,
        routes::{self, testing},
    };

    #[actix_web::test]
    async fn create_then_list_an_appointment() {
        let state = testing::state().await;
        let (client_id, location_id) = db::testing::client(&state.db, "Ana Souza").await;
        let cleaner_id = db::testing::cleaner(&state.db, "João Lima", "joao@pool.com").await;
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

        let req = test::TestRequest::post()
            .uri("/admin/appointments")
            .insert_header(testing::admin())
            .set_form([
                ("client_id", client_id.as_str()),
                ("cleaner_id", cleaner_id.as_str()),
                ("service_location_id", location_id.as_str()),
                ("scheduled_at", "2019-03-01T09:00"),
                ("status", "scheduled"),
                ("description", "Opening visit"),
            ])
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);

        let req = test::TestRequest::get()
            .uri("/admin/appointments?range=all")
            .insert_header(testing::admin())
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = testing::body_text(res).await;
        assert!(body.contains("Ana Souza"));
        assert!(body.contains("01/03/2019 09:00"));
    }

    #[actix_web::test]
    async fn missing_fields_rerender_the_form() {
        let app = test::init_service(
            App::new()
                .app_data(testing::state().await)
                .configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/appointments")
            .insert_header(testing::admin())
            .set_form([("description", "No client")])
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = testing::body_text(res).await;
        assert!(body.contains("Client is required."));
        assert!(body.contains("No client"));
    }

    #[actix_web::test]
    async fn status_changes_and_deletion() {
        let state = testing::state().await;
        let (client_id, location_id) = db::testing::client(&state.db, "Ana Souza").await;
        let cleaner_id = db::testing::cleaner(&state.db, "João Lima", "joao@pool.com").await;
        let input = db::appointments::tests::input(&client_id, &location_id, &cleaner_id, "2026-10-14T09:00:00");
        let id = db::appointments::create_appointment(&state.db, &input)
            .await
            .expect("created");
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/admin/appointments/{id}/status"))
            .insert_header(testing::admin())
            .set_form([("status", "paused")])
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!("/admin/appointments/{id}/status"))
            .insert_header(testing::admin())
            .set_form([("status", "completed")])
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::SEE_OTHER);

        let req = test::TestRequest::post()
            .uri(&format!("/admin/appointments/{id}/delete"))
            .insert_header(testing::admin())
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::SEE_OTHER);

        let req = test::TestRequest::get()
            .uri(&format!("/admin/appointments/{id}"))
            .insert_header(testing::admin())
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn edit_page_and_live_event_carry_the_stored_appointment() {
        let state = testing::state().await;
        let (client_id, location_id) = db::testing::client(&state.db, "Ana Souza").await;
        let cleaner_id = db::testing::cleaner(&state.db, "João Lima", "joao@pool.com").await;
        let input = db::appointments::tests::input(&client_id, &location_id, &cleaner_id, "2026-10-14T09:00:00");
        let id = db::appointments::create_appointment(&state.db, &input)
            .await
            .expect("created");
        let mut events = state.events.subscribe();
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/admin/appointments/{id}"))
            .insert_header(testing::admin())
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(testing::body_text(res).await.contains("Weekly visit"));

        let req = test::TestRequest::post()
            .uri(&format!("/admin/appointments/{id}/status"))
            .insert_header(testing::admin())
            .set_form([("status", "in_progress")])
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::SEE_OTHER);

        let event = events.try_recv().expect("event published");
        assert_eq!(event.kind, "appointment_status");
        assert_eq!(event.appointment_id.as_deref(), Some(id.as_str()));
        assert_eq!(event.client_name.as_deref(), Some("Ana Souza"));
        assert_eq!(event.status.as_deref(), Some("in_progress"));

        let req = test::TestRequest::get()
            .uri("/admin/appointments/missing")
            .insert_header(testing::admin())
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::NOT_FOUND);
    }
}
