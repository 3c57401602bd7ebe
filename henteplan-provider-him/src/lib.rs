//! Provider implementation for the Haugesund region using the HIM API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use henteplan_core::{
    decode::{iso_date, string_or_number},
    http::fetch_json,
    model::{AddressMatch, LocationId, ProviderMeta, Providers, RawPickup, today},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
    recurrence::horizon,
};

const BASE_URL: &str = "https://him.as/wp-json/him";

#[derive(Debug, Deserialize)]
struct Property {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    adresse: String,
    #[serde(default)]
    kommune: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PickupEntry {
    dato: String,
    fraksjon: String,
    #[serde(deserialize_with = "string_or_number")]
    fraksjon_id: String,
}

/// Address search implementation for HIM.
pub struct HimAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl HimAddressPort {
    /// Create a new address port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_owned(),
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl AddressPort for HimAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let req = self
            .client
            .get(format!("{}/eiendommer", self.base_url))
            .query(&[("adresse", query)]);
        let properties = fetch_json::<Vec<Property>>(&self.meta.id, req).await?;

        Ok(properties
            .into_iter()
            .map(|property| AddressMatch {
                provider: self.meta.id.clone(),
                label: format!("{}, {}", property.adresse, property.kommune),
                location_id: LocationId(property.id),
            })
            .collect())
    }
}

/// Pickup schedule implementation for HIM.
pub struct HimSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl HimSchedulePort {
    /// Create a new schedule port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_owned(),
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl SchedulePort for HimSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let from = today();
        let date_from = from.to_string();
        let date_to = horizon(from).to_string();
        let req = self
            .client
            .get(format!("{}/tomminger", self.base_url))
            .query(&[
                ("eiendomId", location_id.as_str()),
                ("datoFra", date_from.as_str()),
                ("datoTil", date_to.as_str()),
            ]);
        let entries = fetch_json::<Vec<PickupEntry>>(provider, req).await?;

        entries
            .into_iter()
            .map(|entry| {
                Ok(RawPickup::new(
                    iso_date(provider, &entry.dato)?,
                    entry.fraksjon,
                    entry.fraksjon_id,
                ))
            })
            .collect()
    }
}

/// Build the plugin bundle for HIM.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with_base_url(client, BASE_URL)
}

/// Build the plugin against a different API root.
#[must_use]
pub fn plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    let address_port = Arc::new(HimAddressPort::new(client.clone(), base_url));
    let schedule_port = Arc::new(HimSchedulePort::new(client, base_url));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Him,
        "HIM",
        "https://him.as",
        &["Haugesund", "Karmøy", "Tysvær", "Bokn", "Vindafjord", "Etne"],
        &[(5500, 5599)],
    )
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    #[tokio::test]
    async fn search_labels_with_municipality() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/eiendommer")
            .match_query(Matcher::UrlEncoded("adresse".into(), "Smedasundet 1".into()))
            .with_body(
                r#"[{"id": "e-17", "adresse": "Smedasundet 1", "kommune": "Haugesund", "kommuneNr": "1106",
                     "gNr": 1, "bNr": 2, "fNr": 0, "sNr": 0}]"#,
            )
            .create_async()
            .await;

        let port = HimAddressPort::new(Client::new(), &server.url());
        let matches = port.search("Smedasundet 1").await.expect("search");

        let labels: Vec<&str> = matches.iter().map(|found| found.label.as_str()).collect();
        assert_eq!(labels, ["Smedasundet 1, Haugesund"], "label");
        assert_eq!(matches.first().map(|found| found.location_id.as_str()), Some("e-17"), "id");
    }

    #[tokio::test]
    async fn schedule_requests_horizon_window() {
        let mut server = mockito::Server::new_async().await;
        let from = today();
        let mock = server
            .mock("GET", "/tomminger")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("eiendomId".into(), "e-17".into()),
                Matcher::UrlEncoded("datoFra".into(), from.to_string()),
                Matcher::UrlEncoded("datoTil".into(), horizon(from).to_string()),
            ]))
            .with_body(
                r#"[{"dato": "2026-11-03T00:00:00", "fraksjon": "Matavfall", "fraksjonId": 3,
                     "frekvensIntervall": 1, "frekvensType": "uke"}]"#,
            )
            .expect(1)
            .create_async()
            .await;

        let port = HimSchedulePort::new(Client::new(), &server.url());
        let pickups = port.fetch(&LocationId::from("e-17")).await.expect("schedule");

        mock.assert_async().await;
        assert_eq!(pickups.len(), 1, "one entry");
        assert_eq!(pickups.first().map(|pickup| pickup.fraction.as_str()), Some("Matavfall"), "fraction");
    }

    #[tokio::test]
    async fn search_failure_carries_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/eiendommer")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let port = HimAddressPort::new(Client::new(), &server.url());
        let err = port.search("x").await.expect_err("503");
        assert_eq!(err.status().map(|status| status.as_u16()), Some(503), "status kept");
    }
}
