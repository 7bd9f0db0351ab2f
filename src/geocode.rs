//! Address lookup against a Nominatim-compatible search endpoint.
//!
//! Queries whose digits form an 8 digit CEP are treated as postal code
//! lookups and resolve to the first result only. Everything else is a
//! free-text search restricted to Brazil.

use std::time::Duration;

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SUGGESTION_LIMIT: &str = "5";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Invalid CEP. Please enter a CEP with 8 digits.")]
    InvalidPostalCode,
    #[error("No address found for this CEP.")]
    NotFound,
    #[error("geocoder request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geocoder returned http {0}")]
    Http(u16),
    #[error("could not read geocoder response: {0}")]
    Decode(String),
}

impl GeocodeError {
    /// Inline message shown next to the address field.
    pub fn user_message(&self, lookup: &Lookup) -> String {
        match self {
            GeocodeError::InvalidPostalCode | GeocodeError::NotFound => self.to_string(),
            _ => match lookup {
                Lookup::PostalCode(_) => "Error looking up the CEP. Please try again.".to_string(),
                Lookup::FreeText(_) => "Error searching addresses. Please try again.".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    PostalCode(String),
    FreeText(String),
}

impl Lookup {
    /// `None` for a blank query.
    pub fn from_query(query: &str) -> Option<Self> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let digits = digits_only(query);
        if digits.len() == 8 {
            Some(Lookup::PostalCode(digits))
        } else {
            Some(Lookup::FreeText(query.to_string()))
        }
    }

    fn params(&self) -> Result<Vec<(&'static str, String)>, GeocodeError> {
        let mut params = match self {
            Lookup::PostalCode(input) => {
                let postal_code =
                    normalize_postal_code(input).ok_or(GeocodeError::InvalidPostalCode)?;
                vec![
                    ("postalcode", postal_code),
                    ("country", "brazil".to_string()),
                    ("limit", "1".to_string()),
                ]
            }
            Lookup::FreeText(query) => vec![
                ("q", format!("{query}, Brasil")),
                ("countrycodes", "br".to_string()),
                ("limit", SUGGESTION_LIMIT.to_string()),
            ],
        };
        params.push(("format", "json".to_string()));
        params.push(("addressdetails", "1".to_string()));
        Ok(params)
    }
}

fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// `01310100` and `01310-100` both become `01310-100`.
pub fn normalize_postal_code(input: &str) -> Option<String> {
    let digits = digits_only(input);
    if digits.len() != 8 {
        return None;
    }
    Some(format!("{}-{}", &digits[..5], &digits[5..]))
}

#[derive(Debug, Default, Deserialize)]
struct RawAddress {
    road: Option<String>,
    street: Option<String>,
    residential: Option<String>,
    path: Option<String>,
    pedestrian: Option<String>,
    house_number: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    subdistrict: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    city_district: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    #[serde(default)]
    place_id: serde_json::Value,
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    address: RawAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressSuggestion {
    pub place_id: String,
    pub display_name: String,
    pub kind: String,
    pub street: String,
    pub street_number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AddressSuggestion {
    fn from_place(place: RawPlace, postal_code: Option<&str>) -> Self {
        let address = place.address;
        let place_id = match place.place_id {
            serde_json::Value::String(value) => value,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        Self {
            place_id,
            display_name: place.display_name,
            kind: place.kind,
            street: first_of([
                &address.road,
                &address.street,
                &address.residential,
                &address.path,
                &address.pedestrian,
            ]),
            street_number: first_of([&address.house_number]),
            neighborhood: first_of([
                &address.suburb,
                &address.neighbourhood,
                &address.subdistrict,
            ]),
            city: first_of([
                &address.city,
                &address.town,
                &address.village,
                &address.city_district,
            ]),
            state: first_of([&address.state]),
            postal_code: match postal_code {
                Some(code) => code.to_string(),
                None => first_of([&address.postcode]),
            },
            latitude: place.lat.trim().parse().ok(),
            longitude: place.lon.trim().parse().ok(),
        }
    }
}

fn first_of<const N: usize>(candidates: [&Option<String>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .cloned()
        .unwrap_or_default()
}

#[derive(Clone, Debug)]
pub struct NominatimClient {
    http: Client,
    base_url: String,
}

impl NominatimClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, GeocodeError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub async fn search(&self, lookup: &Lookup) -> Result<Vec<AddressSuggestion>, GeocodeError> {
        let places = self.fetch(lookup.params()?).await?;
        match lookup {
            Lookup::PostalCode(input) => {
                let postal_code = normalize_postal_code(input);
                let place = places.into_iter().next().ok_or(GeocodeError::NotFound)?;
                Ok(vec![AddressSuggestion::from_place(
                    place,
                    postal_code.as_deref(),
                )])
            }
            Lookup::FreeText(_) => Ok(places
                .into_iter()
                .map(|place| AddressSuggestion::from_place(place, None))
                .collect()),
        }
    }

    async fn fetch(&self, params: Vec<(&'static str, String)>) -> Result<Vec<RawPlace>, GeocodeError> {
        let response = self
            .http
            .get(&self.base_url)
            .header(header::ACCEPT_LANGUAGE, "pt-BR")
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Http(status.as_u16()));
        }

        response
            .json::<Vec<RawPlace>>()
            .await
            .map_err(|err| GeocodeError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(value: serde_json::Value) -> RawPlace {
        serde_json::from_value(value).expect("fixture parses")
    }

    #[test]
    fn eight_digits_switch_to_postal_lookup() {
        assert_eq!(
            Lookup::from_query("01310-100"),
            Some(Lookup::PostalCode("01310100".to_string()))
        );
        assert_eq!(
            Lookup::from_query(" Avenida Paulista 1000 "),
            Some(Lookup::FreeText("Avenida Paulista 1000".to_string()))
        );
        assert_eq!(Lookup::from_query("   "), None);
    }

    #[test]
    fn postal_codes_need_eight_digits() {
        assert_eq!(normalize_postal_code("01310100").as_deref(), Some("01310-100"));
        assert_eq!(normalize_postal_code("01310-100").as_deref(), Some("01310-100"));
        assert_eq!(normalize_postal_code("1310-100"), None);
        assert_eq!(normalize_postal_code("013101000"), None);
    }

    #[test]
    fn postal_lookup_parameters() {
        let params = Lookup::PostalCode("01310100".to_string())
            .params()
            .expect("valid lookup");
        assert!(params.contains(&("postalcode", "01310-100".to_string())));
        assert!(params.contains(&("country", "brazil".to_string())));
        assert!(params.contains(&("limit", "1".to_string())));
        assert!(params.contains(&("addressdetails", "1".to_string())));
    }

    #[test]
    fn free_text_parameters_are_restricted_to_brazil() {
        let params = Lookup::FreeText("Rua Augusta".to_string())
            .params()
            .expect("valid lookup");
        assert!(params.contains(&("q", "Rua Augusta, Brasil".to_string())));
        assert!(params.contains(&("countrycodes", "br".to_string())));
        assert!(params.contains(&("limit", "5".to_string())));
        assert!(params.contains(&("format", "json".to_string())));
    }

    #[test]
    fn postal_result_maps_address_fields() {
        let raw = place(serde_json::json!({
            "place_id": 123456,
            "lat": "-23.5613",
            "lon": "-46.6565",
            "display_name": "Avenida Paulista, Bela Vista, São Paulo",
            "type": "postcode",
            "address": {
                "road": "Avenida Paulista",
                "suburb": "Bela Vista",
                "city": "São Paulo",
                "state": "São Paulo",
                "postcode": "01310-000"
            }
        }));
        let suggestion = AddressSuggestion::from_place(raw, Some("01310-100"));
        assert_eq!(suggestion.place_id, "123456");
        assert_eq!(suggestion.street, "Avenida Paulista");
        assert_eq!(suggestion.neighborhood, "Bela Vista");
        assert_eq!(suggestion.city, "São Paulo");
        assert_eq!(suggestion.state, "São Paulo");
        assert_eq!(suggestion.postal_code, "01310-100");
        assert_eq!(suggestion.latitude, Some(-23.5613));
        assert_eq!(suggestion.longitude, Some(-46.6565));
    }

    #[test]
    fn fallback_fields_fill_gaps() {
        let raw = place(serde_json::json!({
            "place_id": "abc",
            "lat": "not-a-number",
            "lon": "-47.06",
            "address": {
                "pedestrian": "Calçadão",
                "house_number": "12",
                "subdistrict": "Centro",
                "town": "Campinas",
                "postcode": "13010-000"
            }
        }));
        let suggestion = AddressSuggestion::from_place(raw, None);
        assert_eq!(suggestion.street, "Calçadão");
        assert_eq!(suggestion.street_number, "12");
        assert_eq!(suggestion.neighborhood, "Centro");
        assert_eq!(suggestion.city, "Campinas");
        assert_eq!(suggestion.postal_code, "13010-000");
        assert_eq!(suggestion.latitude, None);
        assert_eq!(suggestion.state, "");
    }

    #[test]
    fn transport_failures_get_a_generic_message() {
        let lookup = Lookup::PostalCode("01310100".to_string());
        assert_eq!(
            GeocodeError::Http(503).user_message(&lookup),
            "Error looking up the CEP. Please try again."
        );
        assert_eq!(
            GeocodeError::NotFound.user_message(&lookup),
            "No address found for this CEP."
        );
    }
}
