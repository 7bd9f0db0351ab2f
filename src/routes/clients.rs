use actix_web::{error::ErrorInternalServerError, web, HttpResponse, Result};
use askama::Template;

use crate::{
    auth::AuthUser,
    db::{self, appointments::AppointmentFilter, log_activity, StoreError},
    filters,
    models::{ClientRow, ServiceLocationRow, CLEANING_FREQUENCIES, REFERRAL_SOURCES},
    routes::{see_other, AppointmentView, Choice},
    state::AppState,
    templates::render,
    validation::{ClientInput, FormFields},
};

#[derive(Clone, Debug)]
struct ClientSummary {
    id: String,
    name: String,
    email: String,
    phone: String,
    cleaning_frequency: String,
    active: bool,
    address: String,
    location_count: usize,
}

#[derive(Template)]
#[template(path = "clients.html")]
struct ClientsTemplate {
    clients: Vec<ClientSummary>,
}

#[derive(Clone, Debug, Default)]
struct ClientForm {
    name: String,
    email: String,
    phone: String,
    cleaning_frequency: String,
    referral_source: String,
    active: bool,
    street: String,
    street_number: String,
    neighborhood: String,
    city: String,
    state: String,
    postal_code: String,
    complement: String,
    reference_point: String,
    access_instructions: String,
    pool_type: String,
    pool_size: String,
    products_used: String,
    equipment: String,
    preferred_time: String,
    location_notes: String,
    latitude: String,
    longitude: String,
    address_validated: bool,
}

impl ClientForm {
    fn from_fields(fields: &FormFields) -> Self {
        Self {
            name: fields.text("name"),
            email: fields.text("email"),
            phone: fields.text("phone"),
            cleaning_frequency: fields.text("cleaning_frequency"),
            referral_source: fields.text("referral_source"),
            active: fields.flag("active"),
            street: fields.text("street"),
            street_number: fields.text("street_number"),
            neighborhood: fields.text("neighborhood"),
            city: fields.text("city"),
            state: fields.text("state"),
            postal_code: fields.text("postal_code"),
            complement: fields.text("complement"),
            reference_point: fields.text("reference_point"),
            access_instructions: fields.text("access_instructions"),
            pool_type: fields.text("pool_type"),
            pool_size: fields.text("pool_size"),
            products_used: fields.text("products_used"),
            equipment: fields.text("equipment"),
            preferred_time: fields.text("preferred_time"),
            location_notes: fields.text("location_notes"),
            latitude: fields.text("latitude"),
            longitude: fields.text("longitude"),
            address_validated: fields.flag("address_validated"),
        }
    }

    fn from_rows(client: ClientRow, location: Option<ServiceLocationRow>) -> Self {
        let location = location.unwrap_or_default();
        Self {
            name: client.name,
            email: client.email,
            phone: client.phone,
            cleaning_frequency: client.cleaning_frequency,
            referral_source: client.referral_source,
            active: client.active,
            street: location.street,
            street_number: location.street_number,
            neighborhood: location.neighborhood,
            city: location.city,
            state: location.state,
            postal_code: location.postal_code,
            complement: location.complement,
            reference_point: location.reference_point,
            access_instructions: location.access_instructions,
            pool_type: location.pool_type,
            pool_size: location.pool_size,
            products_used: location.products_used,
            equipment: location.equipment,
            preferred_time: location.preferred_time,
            location_notes: location.notes,
            latitude: location.latitude.map(|value| value.to_string()).unwrap_or_default(),
            longitude: location.longitude.map(|value| value.to_string()).unwrap_or_default(),
            address_validated: location.address_validated,
        }
    }
}

#[derive(Template)]
#[template(path = "client_form.html")]
struct ClientFormTemplate {
    client_id: String,
    form: ClientForm,
    errors: Vec<String>,
    frequencies: Vec<Choice>,
    referral_sources: Vec<Choice>,
    history: Vec<AppointmentView>,
}

impl ClientFormTemplate {
    fn new(client_id: String, form: ClientForm, errors: Vec<String>, history: Vec<AppointmentView>) -> Self {
        Self {
            client_id,
            frequencies: Choice::plain(&CLEANING_FREQUENCIES, &[form.cleaning_frequency.clone()]),
            referral_sources: Choice::plain(&REFERRAL_SOURCES, &[form.referral_source.clone()]),
            form,
            errors,
            history,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/clients")
            .route(web::get().to(list_clients))
            .route(web::post().to(create_client)),
    )
    .service(web::resource("/clients/new").route(web::get().to(new_client)))
    .service(
        web::resource("/clients/{id}")
            .route(web::get().to(edit_client))
            .route(web::post().to(update_client)),
    );
}

async fn list_clients(state: web::Data<AppState>) -> Result<HttpResponse> {
    let clients = db::clients::list_clients_with_locations(&state.db)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not list clients: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|(client, locations)| ClientSummary {
            address: locations
                .first()
                .map(ServiceLocationRow::address_line)
                .unwrap_or_default(),
            location_count: locations.len(),
            id: client.id,
            name: client.name,
            email: client.email,
            phone: client.phone,
            cleaning_frequency: client.cleaning_frequency,
            active: client.active,
        })
        .collect();

    Ok(render(ClientsTemplate { clients }))
}

async fn new_client() -> Result<HttpResponse> {
    let form = ClientForm {
        active: true,
        ..ClientForm::default()
    };
    Ok(render(ClientFormTemplate::new(String::new(), form, Vec::new(), Vec::new())))
}

async fn create_client(
    state: web::Data<AppState>,
    form: web::Form<Vec<(String, String)>>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let fields = FormFields::new(form.into_inner());
    let input = match ClientInput::from_form(&fields) {
        Ok(input) => input,
        Err(errors) => {
            let view = ClientForm::from_fields(&fields);
            return Ok(render(ClientFormTemplate::new(String::new(), view, errors, Vec::new())));
        }
    };

    let client_id = db::clients::create_client(&state.db, &input)
        .await
        .map_err(ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "client_created",
        &format!("{} registered client {}.", auth.display_name, input.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(see_other(format!("/admin/clients/{client_id}")))
}

async fn edit_client(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let client = db::clients::find_client(&state.db, &client_id)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load client {client_id}: {err}");
            None
        });
    let Some(client) = client else {
        return Ok(HttpResponse::NotFound().body("Client not found"));
    };
    let location = db::clients::primary_location(&state.db, &client_id)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load the location of client {client_id}: {err}");
            None
        });

    let history = client_history(&state, &client_id).await;
    let form = ClientForm::from_rows(client, location);
    Ok(render(ClientFormTemplate::new(client_id, form, Vec::new(), history)))
}

async fn update_client(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<Vec<(String, String)>>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let fields = FormFields::new(form.into_inner());
    let input = match ClientInput::from_form(&fields) {
        Ok(input) => input,
        Err(errors) => {
            let history = client_history(&state, &client_id).await;
            let view = ClientForm::from_fields(&fields);
            return Ok(render(ClientFormTemplate::new(client_id, view, errors, history)));
        }
    };

    match db::clients::update_client(&state.db, &client_id, &input).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => return Ok(HttpResponse::NotFound().body("Client not found")),
        Err(err) => return Err(ErrorInternalServerError(err)),
    }

    log_activity(
        &state.db,
        "client_updated",
        &format!("{} updated client {}.", auth.display_name, input.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(see_other(format!("/admin/clients/{client_id}")))
}

/// Every appointment of the client, most recent schedule first.
async fn client_history(state: &AppState, client_id: &str) -> Vec<AppointmentView> {
    let filter = AppointmentFilter {
        client_id: Some(client_id.to_string()),
        ..AppointmentFilter::default()
    };
    let mut rows = db::appointments::list_appointments(&state.db, &filter)
        .await
        .unwrap_or_else(|err| {
            log::warn!("Could not load appointments for client {client_id}: {err}");
            Vec::new()
        });
    rows.reverse();
    rows.into_iter().map(AppointmentView::from).collect()
}
