use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::{
    geocode::{AddressSuggestion, Lookup},
    state::AppState,
};

#[derive(Deserialize)]
struct GeocodeQuery {
    q: Option<String>,
}

#[derive(Serialize)]
struct GeocodeResponse {
    suggestions: Vec<AddressSuggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/geocode").route(web::get().to(geocode)));
}

/// Lookup failures are reported in the body so the form keeps working.
async fn geocode(state: web::Data<AppState>, query: web::Query<GeocodeQuery>) -> HttpResponse {
    let Some(lookup) = Lookup::from_query(query.q.as_deref().unwrap_or_default()) else {
        return HttpResponse::Ok().json(GeocodeResponse {
            suggestions: Vec::new(),
            error: None,
        });
    };

    let response = match state.geocoder.search(&lookup).await {
        Ok(suggestions) => GeocodeResponse {
            suggestions,
            error: None,
        },
        Err(err) => {
            log::warn!("Address lookup for {lookup:?} failed: {err}");
            GeocodeResponse {
                suggestions: Vec::new(),
                error: Some(err.user_message(&lookup)),
            }
        }
    };
    HttpResponse::Ok().json(response)
}
