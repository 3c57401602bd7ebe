//! Provider implementation for the Drammen region using the RfD site service.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use henteplan_core::{
    decode::{empty_if_null, iso_date, string_or_number},
    http::fetch_json,
    location::{decode_fields, encode_location},
    model::{AddressMatch, LocationId, ProviderMeta, Providers, RawPickup},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
};

const BASE_URL: &str = "https://www.rfd.no/_/service/com.enonic.app.rfd";
const SEARCH_SIZE: &str = "10";
const PICKUP_LIMIT: &str = "500";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    addresses: Vec<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Address {
    #[serde(deserialize_with = "string_or_number")]
    kommune_nummer: String,
    #[serde(deserialize_with = "string_or_number")]
    gate_id: String,
    gate_navn: String,
    #[serde(deserialize_with = "string_or_number")]
    adresse_hus_nummer: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    adresse_bokstav: String,
    text: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    post_nummer: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    post_sted: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PickupDaysResponse {
    fetch_days: Vec<FetchDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchDay {
    #[serde(deserialize_with = "string_or_number")]
    fraksjon_id: String,
    #[serde(default)]
    tommedatoer: Vec<String>,
}

/// Display name of a `fraksjonId`.
fn fraction_name(fraction_id: &str) -> String {
    match fraction_id {
        "1" => "Matavfall".to_owned(),
        "2" => "Papiravfall".to_owned(),
        "3" => "Restavfall".to_owned(),
        "4" | "5" => "Glass- og metallemballasje".to_owned(),
        "7" | "11" => "Plastemballasje".to_owned(),
        other => format!("Fraksjon {other}"),
    }
}

/// Address search implementation for RfD.
pub struct RfdAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl RfdAddressPort {
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
impl AddressPort for RfdAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let req = self
            .client
            .get(format!("{}/addressLookup", self.base_url))
            .query(&[("address", query), ("size", SEARCH_SIZE), ("type", "pickup")]);
        let lookup = fetch_json::<LookupResponse>(&self.meta.id, req).await?;

        Ok(lookup
            .addresses
            .into_iter()
            .map(|address| AddressMatch {
                provider: self.meta.id.clone(),
                label: format!("{}, {} {}", address.text, address.post_nummer, address.post_sted),
                location_id: encode_location([
                    &address.kommune_nummer,
                    &address.gate_id,
                    &address.gate_navn,
                    &address.adresse_hus_nummer,
                    &address.adresse_bokstav,
                ]),
            })
            .collect())
    }
}

/// Pickup schedule implementation for RfD.
pub struct RfdSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl RfdSchedulePort {
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
impl SchedulePort for RfdSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let [region, street_code, street, house_number, letter] = decode_fields::<5>(provider, location_id)?;

        let req = self
            .client
            .get(format!("{}/pickupDays", self.base_url))
            .query(&[
                ("region_id", region.as_str()),
                ("street_code", street_code.as_str()),
                ("street", street.as_str()),
                ("house_number", house_number.as_str()),
                ("address_letter", letter.as_str()),
                ("pickupLimit", PICKUP_LIMIT),
            ]);
        let days = fetch_json::<PickupDaysResponse>(provider, req).await?;

        let mut pickups = Vec::new();
        for day in days.fetch_days {
            let name = fraction_name(&day.fraksjon_id);
            for raw in &day.tommedatoer {
                pickups.push(RawPickup::new(
                    iso_date(provider, raw)?,
                    name.clone(),
                    day.fraksjon_id.clone(),
                ));
            }
        }
        Ok(pickups)
    }
}

/// Build the plugin bundle for RfD.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with_base_url(client, BASE_URL)
}

/// Build the plugin against a different service root.
#[must_use]
pub fn plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    let address_port = Arc::new(RfdAddressPort::new(client.clone(), base_url));
    let schedule_port = Arc::new(RfdSchedulePort::new(client, base_url));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Rfd,
        "RfD",
        "https://rfd.no",
        &["Drammen", "Lier", "Øvre Eiker", "Modum"],
        &[(3000, 3099)],
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use mockito::Matcher;

    use super::*;

    #[tokio::test]
    async fn search_packs_five_field_key() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/addressLookup")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("address".into(), "Bragernes torg 1".into()),
                Matcher::UrlEncoded("size".into(), "10".into()),
                Matcher::UrlEncoded("type".into(), "pickup".into()),
            ]))
            .with_body(
                r#"{"addresses": [{"KommuneNummer": 3005, "GateId": "1234", "GateNavn": "Bragernes torg",
                    "AdresseHusNummer": 1, "AdresseBokstav": null, "Text": "Bragernes torg 1",
                    "PostNummer": "3017", "PostSted": "DRAMMEN"}]}"#,
            )
            .create_async()
            .await;

        let port = RfdAddressPort::new(Client::new(), &server.url());
        let matches = port.search("Bragernes torg 1").await.expect("search");
        let hit = matches.first().expect("one hit");

        assert_eq!(hit.label, "Bragernes torg 1, 3017 DRAMMEN", "label");
        assert_eq!(hit.location_id.as_str(), "3005|1234|Bragernes torg|1|", "key with empty letter");
    }

    #[tokio::test]
    async fn schedule_maps_fraction_ids() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/pickupDays")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("region_id".into(), "3005".into()),
                Matcher::UrlEncoded("street".into(), "Bragernes torg".into()),
                Matcher::UrlEncoded("address_letter".into(), String::new()),
                Matcher::UrlEncoded("pickupLimit".into(), "500".into()),
            ]))
            .with_body(
                r#"{"fetchDays": [
                    {"fraksjonId": 3, "tommedatoer": ["2026-11-02T00:00:00", "2026-11-16T00:00:00"]},
                    {"fraksjonId": 42, "tommedatoer": ["2026-11-05"]}
                ]}"#,
            )
            .create_async()
            .await;

        let port = RfdSchedulePort::new(Client::new(), &server.url());
        let pickups = port
            .fetch(&LocationId::from("3005|1234|Bragernes torg|1|"))
            .await
            .expect("schedule");

        let names: Vec<&str> = pickups.iter().map(|pickup| pickup.fraction.as_str()).collect();
        assert_eq!(names, ["Restavfall", "Restavfall", "Fraksjon 42"], "names from table");
        assert_eq!(
            pickups.get(1).map(|pickup| pickup.date),
            NaiveDate::from_ymd_opt(2026, 11, 16),
            "timestamp prefix"
        );
    }

    #[tokio::test]
    async fn wrong_field_count_is_rejected() {
        let port = RfdSchedulePort::new(Client::new(), "http://127.0.0.1:9");
        let err = port.fetch(&LocationId::from("3005|1234")).await.expect_err("short key");
        assert!(matches!(err, PortError::InvalidLocationId { .. }), "invalid key");
    }
}
