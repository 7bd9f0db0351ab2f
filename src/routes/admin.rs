use actix_web::{middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;

use crate::{
    auth::{logout_guard, staff_validator, AuthUser},
    db::{self, appointments::AppointmentFilter},
    filters,
    routes::{
        appointments, cleaners, clients, geocode, history, live, see_other, AppointmentView,
        StatCard,
    },
    schedule::{now_local, Window},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct ActivityView {
    message: String,
    created_at: String,
}

/// An active cleaner and the client they are working for, if any.
#[derive(Clone, Debug)]
struct CleanerStatusView {
    name: String,
    busy_with: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    user_name: String,
    stats: Vec<StatCard>,
    today: Vec<AppointmentView>,
    cleaner_status: Vec<CleanerStatusView>,
    activities: Vec<ActivityView>,
}

/// Every office page lives under one scope so the auth middleware runs once.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(HttpAuthentication::basic(staff_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .configure(appointments::configure)
            .configure(clients::configure)
            .configure(cleaners::configure)
            .configure(history::configure)
            .configure(live::configure)
            .configure(geocode::configure),
    );
}

async fn index() -> HttpResponse {
    see_other("/admin/dashboard")
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let now = now_local();
    let metrics = db::appointments::today_metrics(&state.db, now)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load today's metrics: {err}");
            Default::default()
        });
    let cleaners = db::cleaners::list_cleaners(&state.db, true)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load active cleaners: {err}");
            Vec::new()
        });
    let active_cleaners = cleaners.len() as i64;
    let running = db::appointments::list_active(&state.db, None)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load jobs in progress: {err}");
            Vec::new()
        });
    let cleaner_status = cleaners
        .into_iter()
        .map(|cleaner| CleanerStatusView {
            busy_with: running
                .iter()
                .find(|job| job.cleaner_id == cleaner.id)
                .map(|job| job.client_name.clone()),
            name: cleaner.name,
        })
        .collect();

    let stats = vec![
        StatCard::new("Scheduled today", metrics.scheduled),
        StatCard::new("In progress", metrics.in_progress),
        StatCard::new("Completed today", metrics.completed),
        StatCard::new("Total today", metrics.total),
        StatCard::new("Active cleaners", active_cleaners),
    ];

    let filter = AppointmentFilter {
        window: Window::days(now.date(), now.date()),
        ..AppointmentFilter::default()
    };
    let today = db::appointments::list_appointments(&state.db, &filter)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load today's appointments: {err}");
            Vec::new()
        })
        .into_iter()
        .map(AppointmentView::from)
        .collect();

    let activities = db::recent_activity(&state.db, 10)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load recent activity: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|row| ActivityView {
            message: row.message,
            created_at: row.created_at,
        })
        .collect();

    Ok(render(DashboardTemplate {
        user_name: auth.display_name.clone(),
        stats,
        today,
        cleaner_status,
        activities,
    }))
}
