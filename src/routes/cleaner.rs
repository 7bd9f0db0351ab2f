use actix_web::{error::ErrorInternalServerError, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{cleaner_validator, logout_guard, AuthUser},
    db::{self, appointments::AppointmentFilter, log_activity, StoreError},
    filters,
    models::{is_valid_status, CleanerRow},
    routes::{see_other, AppointmentView, StatCard},
    schedule::{now_local, Window},
    state::{AppState, ServerEvent},
    templates::render,
};

const UPCOMING_DAYS: i64 = 14;

#[derive(Template)]
#[template(path = "cleaner_dashboard.html")]
struct CleanerDashboardTemplate {
    cleaner_name: String,
    stats: Vec<StatCard>,
    today: Vec<AppointmentView>,
    upcoming: Vec<AppointmentView>,
    last_seen_at: String,
}

#[derive(Deserialize)]
struct StatusForm {
    status: String,
}

#[derive(Deserialize)]
struct PositionReport {
    latitude: f64,
    longitude: f64,
}

impl PositionReport {
    fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cleaner")
            .wrap(HttpAuthentication::basic(cleaner_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(
                web::resource("/appointments/{id}/status").route(web::post().to(update_status)),
            )
            .service(web::resource("/location").route(web::post().to(report_location))),
    );
}

async fn index() -> HttpResponse {
    see_other("/cleaner/dashboard")
}

/// The cleaner profile linked to the logged-in account.
async fn profile(state: &AppState, auth: &AuthUser) -> Result<Option<CleanerRow>> {
    db::cleaners::find_cleaner_by_user(&state.db, &auth.id)
        .await
        .map_err(ErrorInternalServerError)
}

fn no_profile() -> HttpResponse {
    HttpResponse::Forbidden().body("No cleaner profile is linked to this account")
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(cleaner) = profile(&state, &auth).await? else {
        return Ok(no_profile());
    };

    let today = now_local().date();
    let todays = own_schedule(&state, &cleaner.id, Window::days(today, today)).await;
    let upcoming = match today.succ_opt() {
        Some(tomorrow) => {
            let window = Window::days(tomorrow, today + Duration::days(UPCOMING_DAYS));
            own_schedule(&state, &cleaner.id, window).await
        }
        None => Vec::new(),
    };

    let count = |status: &str| todays.iter().filter(|item| item.status == status).count() as i64;
    let stats = vec![
        StatCard::new("Today", todays.len() as i64),
        StatCard::new("In progress", count("in_progress")),
        StatCard::new("Completed", count("completed")),
        StatCard::new("Upcoming", upcoming.len() as i64),
    ];

    Ok(render(CleanerDashboardTemplate {
        cleaner_name: cleaner.name,
        stats,
        today: todays,
        upcoming,
        last_seen_at: cleaner.last_seen_at.unwrap_or_default(),
    }))
}

async fn own_schedule(state: &AppState, cleaner_id: &str, window: Option<Window>) -> Vec<AppointmentView> {
    let filter = AppointmentFilter {
        window,
        cleaner_id: Some(cleaner_id.to_string()),
        ..AppointmentFilter::default()
    };
    db::appointments::list_appointments(&state.db, &filter)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load schedule for cleaner {cleaner_id}: {err}");
            Vec::new()
        })
        .into_iter()
        .map(AppointmentView::from)
        .collect()
}

async fn update_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<StatusForm>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let status = form.into_inner().status;
    if !is_valid_status(&status) {
        return Ok(HttpResponse::BadRequest().body("Invalid status"));
    }
    let Some(cleaner) = profile(&state, &auth).await? else {
        return Ok(no_profile());
    };

    let current = db::appointments::find_appointment(&state.db, &appointment_id)
        .await
        .map_err(ErrorInternalServerError)?;
    let Some(current) = current else {
        return Ok(HttpResponse::NotFound().body("Appointment not found"));
    };
    if current.cleaner_id != cleaner.id {
        return Ok(HttpResponse::Forbidden().body("Not your appointment"));
    }

    match db::appointments::set_status(&state.db, &appointment_id, &status).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return Ok(HttpResponse::NotFound().body("Appointment not found"));
        }
        Err(err) => return Err(ErrorInternalServerError(err)),
    }

    log_activity(
        &state.db,
        "cleaner_status_update",
        &format!(
            "{} moved the appointment for {} to {status}.",
            cleaner.name, current.client_name
        ),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;

    if let Ok(Some(row)) = db::appointments::find_appointment(&state.db, &appointment_id).await {
        state.publish(ServerEvent::from_row("appointment_status", row));
    }

    Ok(see_other("/cleaner/dashboard"))
}

async fn report_location(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    report: web::Json<PositionReport>,
) -> Result<HttpResponse> {
    let report = report.into_inner();
    if !report.is_valid() {
        return Ok(HttpResponse::BadRequest().json(json!({ "error": "Coordinates out of range" })));
    }
    let Some(cleaner) = profile(&state, &auth).await? else {
        return Ok(no_profile());
    };

    match db::cleaners::record_position(&state.db, &cleaner.id, report.latitude, report.longitude).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => return Ok(HttpResponse::NotFound().finish()),
        Err(err) => return Err(ErrorInternalServerError(err)),
    }

    state.publish(ServerEvent::cleaner_location(
        &cleaner.id,
        &cleaner.name,
        report.latitude,
        report.longitude,
    ));

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};

    use crate::{
        db,
        models::STATUS_IN_PROGRESS,
        routes::{self, testing},
        schedule::{format_timestamp, now_local},
        validation::CleanerInput,
    };

    const PASSWORD: &str = "piscina123";

    async fn cleaner_with_login(pool: &sqlx::SqlitePool, name: &str, email: &str) -> String {
        let input = CleanerInput {
            password: Some(PASSWORD.to_string()),
            ..db::testing::cleaner_input(name, email)
        };
        db::cleaners::create_cleaner(pool, &input)
            .await
            .expect("cleaner created")
    }

    #[actix_web::test]
    async fn cleaner_moves_own_appointment_only() {
        let state = testing::state().await;
        let (client_id, location_id) = db::testing::client(&state.db, "Ana Souza").await;
        let joao = cleaner_with_login(&state.db, "João Lima", "joao@pool.com").await;
        let maria = cleaner_with_login(&state.db, "Maria Dias", "maria@pool.com").await;
        let at = format_timestamp(now_local());
        let own = db::appointments::create_appointment(
            &state.db,
            &db::appointments::tests::input(&client_id, &location_id, &joao, &at),
        )
        .await
        .expect("own");
        let other = db::appointments::create_appointment(
            &state.db,
            &db::appointments::tests::input(&client_id, &location_id, &maria, &at),
        )
        .await
        .expect("other");

        let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;
        let login = testing::basic("joao@pool.com", PASSWORD);

        let req = test::TestRequest::get()
            .uri("/cleaner/dashboard")
            .insert_header(login.clone())
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(testing::body_text(res).await.contains("Ana Souza"));

        let req = test::TestRequest::post()
            .uri(&format!("/cleaner/appointments/{own}/status"))
            .insert_header(login.clone())
            .set_form([("status", STATUS_IN_PROGRESS)])
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::SEE_OTHER);
        let row = db::appointments::find_appointment(&state.db, &own)
            .await
            .expect("query")
            .expect("row");
        assert_eq!(row.status, STATUS_IN_PROGRESS);
        assert!(row.started_at.is_some());

        let req = test::TestRequest::post()
            .uri(&format!("/cleaner/appointments/{other}/status"))
            .insert_header(login.clone())
            .set_form([("status", STATUS_IN_PROGRESS)])
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/cleaner/appointments/missing/status")
            .insert_header(login)
            .set_form([("status", STATUS_IN_PROGRESS)])
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn position_reports_are_stored() {
        let state = testing::state().await;
        let cleaner_id = cleaner_with_login(&state.db, "João Lima", "joao@pool.com").await;
        let mut events = state.events.subscribe();
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

        let req = test::TestRequest::post()
            .uri("/cleaner/location")
            .insert_header(testing::basic("joao@pool.com", PASSWORD))
            .set_json(serde_json::json!({ "latitude": 123.0, "longitude": -46.6 }))
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/cleaner/location")
            .insert_header(testing::basic("joao@pool.com", PASSWORD))
            .set_json(serde_json::json!({ "latitude": -23.56, "longitude": -46.65 }))
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::OK);

        let cleaner = db::cleaners::find_cleaner(&state.db, &cleaner_id)
            .await
            .expect("query")
            .expect("cleaner");
        assert_eq!(cleaner.last_latitude, Some(-23.56));
        assert!(cleaner.last_seen_at.is_some());

        let event = events.try_recv().expect("event published");
        assert_eq!(event.kind, "cleaner_location");
        assert_eq!(event.cleaner_id.as_deref(), Some(cleaner_id.as_str()));
    }

    #[actix_web::test]
    async fn office_accounts_cannot_use_cleaner_area() {
        let app = test::init_service(
            App::new()
                .app_data(testing::state().await)
                .configure(routes::configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/cleaner/dashboard")
            .insert_header(testing::admin())
            .to_request();
        assert_eq!(testing::status(&app, req).await, StatusCode::UNAUTHORIZED);
    }
}
