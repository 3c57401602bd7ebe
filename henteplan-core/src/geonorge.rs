//! Client for the national address register (Geonorge `adresser/v1`).
//!
//! Used by providers whose own backends have no free-text address search.

use reqwest::Client;
use serde::Deserialize;

use crate::decode::{empty_if_null, string_or_number};
use crate::http::fetch_json;
use crate::model::ProviderId;
use crate::ports::PortError;

/// Public Geonorge address API root.
pub const GEONORGE_URL: &str = "https://ws.geonorge.no/adresser/v1";

const FIELDS: &str = "adresser.kommunenummer,adresser.adressenavn,adresser.adressekode,\
adresser.nummer,adresser.bokstav,adresser.kommunenavn,adresser.postnummer,adresser.poststed";

/// One address from the register, reduced to the fields providers need.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeonorgeAddress {
    /// Street name.
    #[serde(rename = "adressenavn")]
    pub street: String,
    /// Municipal street code.
    #[serde(rename = "adressekode", deserialize_with = "string_or_number")]
    pub street_code: String,
    /// House number.
    #[serde(rename = "nummer", deserialize_with = "string_or_number")]
    pub number: String,
    /// House letter, empty when absent.
    #[serde(rename = "bokstav", default, deserialize_with = "empty_if_null")]
    pub letter: String,
    /// Municipality number, e.g. `0301`.
    #[serde(rename = "kommunenummer")]
    pub municipality_number: String,
    /// Municipality name as registered.
    #[serde(rename = "kommunenavn")]
    pub municipality: String,
    /// Postal code.
    #[serde(rename = "postnummer")]
    pub postal_code: String,
    /// Postal place.
    #[serde(rename = "poststed")]
    pub postal_place: String,
}

impl GeonorgeAddress {
    /// House number followed by its letter, e.g. `12B`.
    #[must_use]
    pub fn house(&self) -> String {
        format!("{}{}", self.number, self.letter)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "adresser")]
    addresses: Vec<GeonorgeAddress>,
}

/// Search the register, optionally restricted to one municipality number.
///
/// # Errors
///
/// Returns a [`PortError`] attributed to `provider` when the call fails.
pub async fn search_addresses(
    client: &Client,
    base_url: &str,
    provider: &ProviderId,
    query: &str,
    municipality_number: Option<&str>,
) -> Result<Vec<GeonorgeAddress>, PortError> {
    let mut req = client
        .get(format!("{base_url}/sok"))
        .query(&[("sok", query), ("filtrer", FIELDS)]);
    if let Some(number) = municipality_number {
        req = req.query(&[("kommunenummer", number)]);
    }
    Ok(fetch_json::<SearchResponse>(provider, req).await?.addresses)
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    #[tokio::test]
    async fn decodes_numeric_fields_and_missing_letter() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/sok")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("sok".into(), "Karl Johans gate 1".into()),
                Matcher::UrlEncoded("kommunenummer".into(), "0301".into()),
            ]))
            .with_body(
                r#"{"adresser": [
                    {"adressenavn": "Karl Johans gate", "adressekode": 13100, "nummer": 1,
                     "kommunenummer": "0301", "kommunenavn": "OSLO", "postnummer": "0154", "poststed": "OSLO"},
                    {"adressenavn": "Karl Johans gate", "adressekode": 13100, "nummer": 1, "bokstav": "B",
                     "kommunenummer": "0301", "kommunenavn": "OSLO", "postnummer": "0154", "poststed": "OSLO"}
                ]}"#,
            )
            .create_async()
            .await;

        let found = search_addresses(
            &Client::new(),
            &server.url(),
            &ProviderId::from("oslo"),
            "Karl Johans gate 1",
            Some("0301"),
        )
        .await
        .expect("search");

        let houses: Vec<String> = found.iter().map(GeonorgeAddress::house).collect();
        assert_eq!(houses, ["1", "1B"], "letter appended when present");
        assert_eq!(found.first().map(|address| address.street_code.as_str()), Some("13100"), "code as text");
    }
}
