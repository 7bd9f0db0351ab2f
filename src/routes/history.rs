use actix_web::{web, HttpResponse, Result};
use askama::Template;
use serde::Deserialize;

use crate::{
    db::{self, appointments::HistoryFilter},
    filters,
    routes::{non_empty, AppointmentView, Choice},
    schedule::{parse_date, Window},
    state::AppState,
    templates::render,
};

#[derive(Deserialize)]
struct HistoryQuery {
    start: Option<String>,
    end: Option<String>,
    cleaner_id: Option<String>,
    client_id: Option<String>,
}

#[derive(Template)]
#[template(path = "history.html")]
struct HistoryTemplate {
    appointments: Vec<AppointmentView>,
    start: String,
    end: String,
    cleaners: Vec<Choice>,
    clients: Vec<Choice>,
    total_minutes: i64,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/history").route(web::get().to(history)));
}

/// Either date bound may be left open.
fn completion_window(start: &str, end: &str) -> Option<Window> {
    match (parse_date(start), parse_date(end)) {
        (None, None) => None,
        (first, last) => {
            let first = first.or(chrono::NaiveDate::from_ymd_opt(1970, 1, 1))?;
            let last = last.or(chrono::NaiveDate::from_ymd_opt(9999, 12, 31))?;
            Window::days(first, last)
        }
    }
}

async fn history(state: web::Data<AppState>, query: web::Query<HistoryQuery>) -> Result<HttpResponse> {
    let query = query.into_inner();
    let start = query.start.clone().unwrap_or_default();
    let end = query.end.clone().unwrap_or_default();
    let filter = HistoryFilter {
        window: completion_window(&start, &end),
        cleaner_id: non_empty(&query.cleaner_id),
        client_id: non_empty(&query.client_id),
    };

    let appointments: Vec<AppointmentView> = db::appointments::list_completed(&state.db, &filter)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load history: {err}");
            Vec::new()
        })
        .into_iter()
        .map(AppointmentView::from)
        .collect();
    let total_minutes = appointments.iter().map(|item| item.duration_minutes).sum();

    let selected_cleaner = filter.cleaner_id.unwrap_or_default();
    let cleaners = db::cleaners::list_cleaners(&state.db, false)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load cleaners: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|cleaner| {
            let selected = cleaner.id == selected_cleaner;
            Choice::new(cleaner.id, cleaner.name, selected)
        })
        .collect();
    let selected_client = filter.client_id.unwrap_or_default();
    let clients = db::clients::list_clients(&state.db)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load clients: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|client| {
            let selected = client.id == selected_client;
            Choice::new(client.id, client.name, selected)
        })
        .collect();

    Ok(render(HistoryTemplate {
        appointments,
        start,
        end,
        cleaners,
        clients,
        total_minutes,
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};

    use super::*;
    use crate::{
        models::{STATUS_COMPLETED, STATUS_IN_PROGRESS},
        routes::{self, testing},
    };

    #[::core::prelude::v1::test]
    fn open_ended_windows() {
        assert!(completion_window("", "").is_none());
        let window = completion_window("2026-10-01", "").expect("window");
        assert_eq!(window.start_bound(), "2026-10-01T00:00:00");
        assert_eq!(window.end_bound(), "9999-12-31T23:59:59");
        let window = completion_window("", "2026-10-31").expect("window");
        assert_eq!(window.start_bound(), "1970-01-01T00:00:00");
    }

    #[actix_web::test]
    async fn history_shows_duration_in_minutes() {
        let state = testing::state().await;
        let (client_id, location_id) = db::testing::client(&state.db, "Ana Souza").await;
        let cleaner_id = db::testing::cleaner(&state.db, "João Lima", "joao@pool.com").await;
        let input = db::appointments::tests::input(&client_id, &location_id, &cleaner_id, "2026-10-01T09:00:00");
        let id = db::appointments::create_appointment(&state.db, &input)
            .await
            .expect("created");
        sqlx::query(
            "UPDATE appointments SET status = 'completed', started_at = ?, completed_at = ? WHERE id = ?",
        )
        .bind("2026-10-01T09:10:00")
        .bind("2026-10-01T10:25:00")
        .bind(&id)
        .execute(&state.db)
        .await
        .expect("complete");

        let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;
        let req = test::TestRequest::get()
            .uri("/admin/history?start=2026-10-01&end=2026-10-01")
            .insert_header(testing::admin())
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = testing::body_text(res).await;
        assert!(body.contains("Ana Souza"));
        assert!(body.contains("75 min"));
    }

    #[actix_web::test]
    async fn reopened_job_never_subtracts_from_the_total() {
        let state = testing::state().await;
        let (client_id, location_id) = db::testing::client(&state.db, "Ana Souza").await;
        let cleaner_id = db::testing::cleaner(&state.db, "João Lima", "joao@pool.com").await;
        let timed = db::appointments::create_appointment(
            &state.db,
            &db::appointments::tests::input(&client_id, &location_id, &cleaner_id, "2026-10-01T09:00:00"),
        )
        .await
        .expect("timed");
        sqlx::query(
            "UPDATE appointments SET status = 'completed', started_at = ?, completed_at = ? WHERE id = ?",
        )
        .bind("2026-10-01T09:10:00")
        .bind("2026-10-01T10:25:00")
        .bind(&timed)
        .execute(&state.db)
        .await
        .expect("timed complete");

        let reopened = db::appointments::create_appointment(
            &state.db,
            &db::appointments::tests::input(&client_id, &location_id, &cleaner_id, "2026-10-02T09:00:00"),
        )
        .await
        .expect("reopened");
        sqlx::query("UPDATE appointments SET status = 'completed', completed_at = ? WHERE id = ?")
            .bind("2026-10-02T09:00:00")
            .bind(&reopened)
            .execute(&state.db)
            .await
            .expect("closed without a start");
        db::appointments::set_status(&state.db, &reopened, STATUS_IN_PROGRESS)
            .await
            .expect("back in progress");
        db::appointments::set_status(&state.db, &reopened, STATUS_COMPLETED)
            .await
            .expect("completed again");

        let row = db::appointments::find_appointment(&state.db, &reopened)
            .await
            .expect("query")
            .expect("row");
        assert!(row.completed_at >= row.started_at);

        let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;
        let req = test::TestRequest::get()
            .uri("/admin/history")
            .insert_header(testing::admin())
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = testing::body_text(res).await;
        assert!(body.contains("2 visits, 75 minutes of work."));
        assert!(!body.contains("<td>-"));
    }
}
