//! Provider implementation for Innherred Renovasjon (Levanger, Verdal,
//! Inderøy and Snåsa).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use henteplan_core::{
    decode::{iso_date, string_or_number},
    http::{fetch_json, url_with_segments},
    model::{AddressMatch, LocationId, ProviderMeta, Providers, RawPickup},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
};

const BASE_URL: &str = "https://innherredrenovasjon.no/wp-json/ir/v1";
const DAYS_AHEAD: &str = "365";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: SearchData,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    address: String,
    #[serde(default)]
    municipality: String,
}

/// Per-fraction block of the disposal response, keyed by fraction name.
#[derive(Debug, Deserialize)]
struct FractionDates {
    #[serde(default)]
    dates: Vec<String>,
    #[serde(deserialize_with = "string_or_number")]
    fraction_id: String,
    fraction_name: String,
}

/// Address search implementation for Innherred.
pub struct InnherredAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl InnherredAddressPort {
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
impl AddressPort for InnherredAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let provider = &self.meta.id;
        let url = url_with_segments(provider, &self.base_url, &["addresses", query])?;
        let response = fetch_json::<SearchResponse>(provider, self.client.get(url)).await?;

        Ok(response
            .data
            .results
            .into_iter()
            .map(|result| AddressMatch {
                provider: provider.clone(),
                label: format!("{}, {}", result.address, result.municipality),
                location_id: LocationId(result.address),
            })
            .collect())
    }
}

/// Pickup schedule implementation for Innherred.
pub struct InnherredSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl InnherredSchedulePort {
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
impl SchedulePort for InnherredSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let req = self
            .client
            .get(format!("{}/garbage-disposal-dates-by-address", self.base_url))
            .query(&[("address", location_id.as_str()), ("days", DAYS_AHEAD)]);
        let fractions = fetch_json::<BTreeMap<String, FractionDates>>(provider, req).await?;

        let mut pickups = Vec::new();
        for fraction in fractions.into_values() {
            for raw in &fraction.dates {
                pickups.push(RawPickup::new(
                    iso_date(provider, raw)?,
                    fraction.fraction_name.clone(),
                    fraction.fraction_id.clone(),
                ));
            }
        }
        Ok(pickups)
    }
}

/// Build the plugin bundle for Innherred Renovasjon.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with_base_url(client, BASE_URL)
}

/// Build the plugin against a different API root.
#[must_use]
pub fn plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    let address_port = Arc::new(InnherredAddressPort::new(client.clone(), base_url));
    let schedule_port = Arc::new(InnherredSchedulePort::new(client, base_url));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Innherred,
        "Innherred Renovasjon",
        "https://innherredrenovasjon.no",
        &["Levanger", "Verdal", "Inderøy", "Snåsa"],
        &[(7600, 7699)],
    )
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    #[tokio::test]
    async fn search_puts_query_in_path() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/addresses/Kirkegata%2012")
            .with_body(
                r#"{"data": {"results": [{"id": "1", "address": "Kirkegata 12", "municipality": "Levanger",
                    "gNumber": "314", "bNumber": "12"}]}}"#,
            )
            .create_async()
            .await;

        let port = InnherredAddressPort::new(Client::new(), &server.url());
        let matches = port.search("Kirkegata 12").await.expect("search");
        let hit = matches.first().expect("one hit");

        assert_eq!(hit.label, "Kirkegata 12, Levanger", "label");
        assert_eq!(hit.location_id.as_str(), "Kirkegata 12", "address is the key");
    }

    #[tokio::test]
    async fn schedule_flattens_fraction_blocks() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/garbage-disposal-dates-by-address")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("address".into(), "Kirkegata 12".into()),
                Matcher::UrlEncoded("days".into(), "365".into()),
            ]))
            .with_body(
                r#"{
                    "restavfall": {"dates": ["2026-11-02 00:00:00", "2026-11-30 00:00:00"],
                                   "fraction_id": 1, "fraction_name": "Restavfall"},
                    "papir": {"dates": ["2026-11-09"], "fraction_id": "2", "fraction_name": "Papir"}
                }"#,
            )
            .create_async()
            .await;

        let port = InnherredSchedulePort::new(Client::new(), &server.url());
        let mut pickups = port.fetch(&LocationId::from("Kirkegata 12")).await.expect("schedule");
        pickups.sort_by_key(|pickup| pickup.date);

        let names: Vec<&str> = pickups.iter().map(|pickup| pickup.fraction.as_str()).collect();
        assert_eq!(names, ["Restavfall", "Papir", "Restavfall"], "one tuple per date");
    }
}
