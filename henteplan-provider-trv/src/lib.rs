//! Provider implementation for Trondheim using the TRV wasteplan API.

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

const BASE_URL: &str = "https://trv.no/wp-json/wasteplan";

/// Single hit from /v3/adress
#[derive(Debug, Deserialize)]
struct AddressEntry {
    adresse: String,
    #[serde(deserialize_with = "string_or_number")]
    id: String,
}

/// Response from /v2/calendar/{id}
#[derive(Debug, Deserialize)]
struct CalendarResponse {
    calendar: Vec<CalendarEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEntry {
    dato: String,
    fraksjon: String,
    #[serde(deserialize_with = "string_or_number")]
    fraksjon_id: String,
}

/// Address search implementation for Trondheim.
pub struct TrvAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl TrvAddressPort {
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
impl AddressPort for TrvAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let req = self
            .client
            .get(format!("{}/v3/adress", self.base_url))
            .query(&[("s", query)]);
        let entries = fetch_json::<Vec<AddressEntry>>(&self.meta.id, req).await?;

        Ok(entries
            .into_iter()
            .map(|entry| AddressMatch {
                provider: self.meta.id.clone(),
                label: entry.adresse,
                location_id: LocationId(entry.id),
            })
            .collect())
    }
}

/// Pickup schedule implementation for Trondheim.
pub struct TrvSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl TrvSchedulePort {
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
impl SchedulePort for TrvSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let url = url_with_segments(provider, &self.base_url, &["v2", "calendar", location_id.as_str()])?;
        let calendar = fetch_json::<CalendarResponse>(provider, self.client.get(url)).await?;

        calendar
            .calendar
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

/// Build the plugin bundle for Trondheim Renholdsverk.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with_base_url(client, BASE_URL)
}

/// Build the plugin against a different API root.
#[must_use]
pub fn plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    let address_port = Arc::new(TrvAddressPort::new(client.clone(), base_url));
    let schedule_port = Arc::new(TrvSchedulePort::new(client, base_url));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Trv,
        "Trondheim Renholdsverk",
        "https://trv.no",
        &["Trondheim"],
        &[(7000, 7099)],
    )
}
