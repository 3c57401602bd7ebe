//! Provider implementation for Oslo kommune.
//!
//! Addresses come from Geonorge restricted to municipality 0301. The waste
//! service only reports the next pickup per fraction plus a frequency text, so
//! the remaining dates are synthesized up to the schedule horizon.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use henteplan_core::{
    decode::{norwegian_date, string_or_number},
    geonorge::{GEONORGE_URL, search_addresses},
    http::fetch_json,
    location::{decode_fields, encode_location},
    model::{AddressMatch, LocationId, ProviderId, ProviderMeta, Providers, RawPickup, today},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
    recurrence::{horizon, interval_weeks, recurring_dates},
};

const WASTE_URL: &str = "https://www.oslo.kommune.no/actions/snap-lib-waste-complaint";
const MUNICIPALITY_NUMBER: &str = "0301";

/// Upstream roots used by the Oslo provider.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Geonorge address API.
    pub geonorge: String,
    /// Oslo kommune waste service.
    pub waste: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            geonorge: GEONORGE_URL.to_owned(),
            waste: WASTE_URL.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WasteResponse {
    #[serde(default)]
    result: Vec<WasteResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WasteResult {
    #[serde(default)]
    hente_punkts: Vec<PickupPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PickupPoint {
    #[serde(default)]
    tjenester: Vec<Service>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Service {
    fraksjon: Fraction,
    hyppighet: Frequency,
    tomme_dato: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Fraction {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    tekst: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Frequency {
    #[serde(default)]
    tekst: String,
}

/// Address search implementation for Oslo.
pub struct OsloAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl OsloAddressPort {
    /// Create a new address port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, geonorge_url: &str) -> Self {
        Self {
            client,
            base_url: geonorge_url.to_owned(),
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl AddressPort for OsloAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let addresses = search_addresses(
            &self.client,
            &self.base_url,
            &self.meta.id,
            query,
            Some(MUNICIPALITY_NUMBER),
        )
        .await?;

        Ok(addresses
            .into_iter()
            .map(|address| AddressMatch {
                provider: self.meta.id.clone(),
                label: format!(
                    "{} {}, {} {}",
                    address.street,
                    address.house(),
                    address.postal_code,
                    address.postal_place
                ),
                location_id: encode_location([
                    &address.street,
                    &address.street_code,
                    &address.number,
                    &address.letter,
                ]),
            })
            .collect())
    }
}

/// Pickup schedule implementation for Oslo.
pub struct OsloSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl OsloSchedulePort {
    /// Create a new schedule port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, waste_url: &str) -> Self {
        Self {
            client,
            base_url: waste_url.to_owned(),
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl SchedulePort for OsloSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let [street, street_id, number, letter] = decode_fields::<4>(provider, location_id)?;

        let req = self
            .client
            .get(format!("{}/search-by-address", self.base_url))
            .query(&[
                ("street", street.as_str()),
                ("number", number.as_str()),
                ("letter", letter.as_str()),
                ("street_id", street_id.as_str()),
            ]);
        let response = fetch_json::<WasteResponse>(provider, req).await?;

        let until = horizon(today());
        let mut pickups = Vec::new();
        let services = response
            .result
            .iter()
            .flat_map(|result| &result.hente_punkts)
            .flat_map(|point| &point.tjenester);
        for service in services {
            pickups.extend(expand_service(provider, service, until)?);
        }
        Ok(pickups)
    }
}

/// Every pickup of one service from its next date up to `until`.
fn expand_service(
    provider: &ProviderId,
    service: &Service,
    until: NaiveDate,
) -> Result<Vec<RawPickup>, PortError> {
    let next = norwegian_date(provider, &service.tomme_dato)?;
    let weeks = interval_weeks(&service.hyppighet.tekst);
    Ok(recurring_dates(next, weeks, until)
        .into_iter()
        .map(|date| RawPickup::new(date, service.fraksjon.tekst.clone(), service.fraksjon.id.clone()))
        .collect())
}

/// Build the plugin bundle for Oslo kommune.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with(client, &Endpoints::default())
}

/// Build the plugin against custom upstream roots.
#[must_use]
pub fn plugin_with(client: Client, endpoints: &Endpoints) -> ProviderPlugin {
    let address_port = Arc::new(OsloAddressPort::new(client.clone(), &endpoints.geonorge));
    let schedule_port = Arc::new(OsloSchedulePort::new(client, &endpoints.waste));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Oslo,
        "Oslo Kommune",
        "https://oslo.kommune.no",
        &["Oslo"],
        &[(1, 1299)],
    )
}

#[cfg(test)]
mod tests {
    use chrono::Days;
    use mockito::Matcher;

    use super::*;

    fn endpoints(server: &mockito::Server) -> Endpoints {
        Endpoints {
            geonorge: format!("{}/geo", server.url()),
            waste: format!("{}/waste", server.url()),
        }
    }

    #[tokio::test]
    async fn search_builds_composite_keys() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/geo/sok")
            .match_query(Matcher::UrlEncoded("kommunenummer".into(), "0301".into()))
            .with_body(
                r#"{"adresser": [{"adressenavn": "Trondheimsveien", "adressekode": 18700, "nummer": 12,
                    "bokstav": "B", "kommunenummer": "0301", "kommunenavn": "OSLO",
                    "postnummer": "0560", "poststed": "OSLO"}]}"#,
            )
            .create_async()
            .await;

        let port = OsloAddressPort::new(Client::new(), &endpoints(&server).geonorge);
        let matches = port.search("Trondheimsveien 12").await.expect("search");
        let hit = matches.first().expect("one hit");

        assert_eq!(hit.label, "Trondheimsveien 12B, 0560 OSLO", "label");
        assert_eq!(hit.location_id.as_str(), "Trondheimsveien|18700|12|B", "composite key");
    }

    #[tokio::test]
    async fn schedule_synthesizes_recurring_dates() {
        let mut server = mockito::Server::new_async().await;
        let next = today().checked_add_days(Days::new(3)).expect("date in range");
        let body = format!(
            r#"{{"result": [{{"HentePunkts": [{{"Tjenester": [
                {{"Fraksjon": {{"Id": 1, "Tekst": "Restavfall"}}, "Hyppighet": {{"Tekst": "Hver 2. uke"}},
                  "TommeDato": "{next}"}},
                {{"Fraksjon": {{"Id": 2, "Tekst": "Matavfall"}}, "Hyppighet": {{"Tekst": "Hver uke"}},
                  "TommeDato": "{next}"}}
            ]}}]}}]}}"#,
            next = next.format("%d.%m.%Y"),
        );
        let _mock = server
            .mock("GET", "/waste/search-by-address")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("street".into(), "Trondheimsveien".into()),
                Matcher::UrlEncoded("street_id".into(), "18700".into()),
                Matcher::UrlEncoded("number".into(), "12".into()),
                Matcher::UrlEncoded("letter".into(), "B".into()),
            ]))
            .with_body(body)
            .create_async()
            .await;

        let port = OsloSchedulePort::new(Client::new(), &endpoints(&server).waste);
        let pickups = port
            .fetch(&LocationId::from("Trondheimsveien|18700|12|B"))
            .await
            .expect("schedule");

        let residual: Vec<_> = pickups.iter().filter(|pickup| pickup.fraction_id == "1").collect();
        let food: Vec<_> = pickups.iter().filter(|pickup| pickup.fraction_id == "2").collect();
        assert_eq!(residual.len(), 13, "biweekly over the horizon");
        assert_eq!(food.len(), 26, "weekly over the horizon");
        assert_eq!(residual.first().map(|pickup| pickup.date), Some(next), "starts at next date");
        assert_eq!(
            residual.get(1).map(|pickup| pickup.date),
            next.checked_add_days(Days::new(14)),
            "second pickup two weeks later"
        );
        let until = horizon(today());
        assert!(pickups.iter().all(|pickup| pickup.date <= until), "within horizon");
    }

    #[tokio::test]
    async fn malformed_key_is_rejected() {
        let port = OsloSchedulePort::new(Client::new(), "http://127.0.0.1:9");
        let err = port.fetch(&LocationId::from("only|two")).await.expect_err("bad key");
        assert!(matches!(err, PortError::InvalidLocationId { .. }), "invalid key");
    }
}
