//! Provider implementation for Kristiansand and Vennesla using the Avfall Sør
//! WordPress endpoints.

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

const BASE_URL: &str = "https://avfallsor.no/wp-json";

#[derive(Debug, Deserialize)]
struct AddressEntry {
    #[serde(default)]
    href: String,
    label: String,
    #[serde(default)]
    value: String,
}

impl AddressEntry {
    /// Property id: last path segment of `href`, or `value` when there is none.
    fn property_id(&self) -> String {
        self.href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(&self.value)
            .to_owned()
    }
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    #[serde(default)]
    collections: Vec<Collection>,
}

#[derive(Debug, Deserialize)]
struct Collection {
    #[serde(default)]
    items: Vec<CollectionItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionItem {
    dato: String,
    fraksjon: String,
    #[serde(deserialize_with = "string_or_number")]
    fraksjon_id: String,
}

/// Address search implementation for Avfall Sør.
pub struct AvfallSorAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl AvfallSorAddressPort {
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
impl AddressPort for AvfallSorAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let req = self
            .client
            .get(format!("{}/addresses/v1/address", self.base_url))
            .query(&[("lookup_term", query)]);
        let entries = fetch_json::<Vec<AddressEntry>>(&self.meta.id, req).await?;

        Ok(entries
            .into_iter()
            .map(|entry| AddressMatch {
                provider: self.meta.id.clone(),
                location_id: LocationId(entry.property_id()),
                label: entry.label,
            })
            .collect())
    }
}

/// Pickup schedule implementation for Avfall Sør.
pub struct AvfallSorSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl AvfallSorSchedulePort {
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
impl SchedulePort for AvfallSorSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let url = url_with_segments(
            provider,
            &self.base_url,
            &["pickup-calendar", "v1", "collections", "property-id", location_id.as_str()],
        )?;
        let calendar = fetch_json::<CalendarResponse>(provider, self.client.get(url)).await?;

        calendar
            .collections
            .into_iter()
            .flat_map(|collection| collection.items)
            .map(|item| {
                Ok(RawPickup::new(
                    iso_date(provider, &item.dato)?,
                    item.fraksjon,
                    item.fraksjon_id,
                ))
            })
            .collect()
    }
}

/// Build the plugin bundle for Avfall Sør.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with_base_url(client, BASE_URL)
}

/// Build the plugin against a different API root.
#[must_use]
pub fn plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    let address_port = Arc::new(AvfallSorAddressPort::new(client.clone(), base_url));
    let schedule_port = Arc::new(AvfallSorSchedulePort::new(client, base_url));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::AvfallSor,
        "Avfall Sør",
        "https://avfallsor.no",
        &["Kristiansand", "Vennesla"],
        &[(4600, 4699)],
    )
}
