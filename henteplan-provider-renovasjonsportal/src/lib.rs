//! Providers backed by the renovasjonsportal calendar product.
//!
//! ReMidt and Fosen Renovasjon run the same API on different hosts, so one
//! pair of ports serves both and only the host and metadata differ.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;

use henteplan_core::{
    decode::{iso_date, string_or_number},
    http::{fetch_json, url_with_segments},
    model::{AddressMatch, LocationId, ProviderMeta, Providers, RawPickup, today},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
    recurrence::horizon,
};

const REMIDT_URL: &str = "https://kalender.renovasjonsportal.no/api";
const FOSEN_URL: &str = "https://fosen.renovasjonsportal.no/api";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    search_results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    sub_title: String,
}

#[derive(Debug, Deserialize)]
struct YearResponse {
    #[serde(default)]
    disposals: Vec<Disposal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Disposal {
    date: String,
    fraction: String,
    #[serde(deserialize_with = "string_or_number")]
    symbol_id: String,
}

/// Address search against one renovasjonsportal host.
pub struct PortalAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl PortalAddressPort {
    /// Create a new address port for the provider described by `meta`.
    #[must_use]
    pub fn new(client: Client, base_url: &str, meta: ProviderMeta) -> Self {
        Self {
            client,
            base_url: base_url.to_owned(),
            meta,
        }
    }
}

#[async_trait]
impl AddressPort for PortalAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let provider = &self.meta.id;
        let url = url_with_segments(provider, &self.base_url, &["address", query])?;
        let response = fetch_json::<SearchResponse>(provider, self.client.get(url)).await?;

        Ok(response
            .search_results
            .into_iter()
            .map(|result| AddressMatch {
                provider: provider.clone(),
                label: [result.title.as_str(), result.sub_title.as_str()]
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(", "),
                location_id: LocationId(result.id),
            })
            .collect())
    }
}

/// Pickup calendar against one renovasjonsportal host.
///
/// The upstream serves one calendar year per call. Every year touched by the
/// schedule horizon is fetched, so late-year lookups include January.
pub struct PortalSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl PortalSchedulePort {
    /// Create a new schedule port for the provider described by `meta`.
    #[must_use]
    pub fn new(client: Client, base_url: &str, meta: ProviderMeta) -> Self {
        Self {
            client,
            base_url: base_url.to_owned(),
            meta,
        }
    }
}

#[async_trait]
impl SchedulePort for PortalSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let url = url_with_segments(provider, &self.base_url, &["address", location_id.as_str(), "year"])?;

        let from = today();
        let mut pickups = Vec::new();
        for year in from.year()..=horizon(from).year() {
            let calendar_year = year.to_string();
            let req = self
                .client
                .get(url.clone())
                .query(&[("calendarYear", calendar_year.as_str())]);
            let response = fetch_json::<YearResponse>(provider, req).await?;
            for disposal in response.disposals {
                pickups.push(RawPickup::new(
                    iso_date(provider, &disposal.date)?,
                    disposal.fraction,
                    disposal.symbol_id,
                ));
            }
        }
        Ok(pickups)
    }
}

fn portal_plugin(client: Client, base_url: &str, meta: &ProviderMeta) -> ProviderPlugin {
    let address_port = Arc::new(PortalAddressPort::new(client.clone(), base_url, meta.clone()));
    let schedule_port = Arc::new(PortalSchedulePort::new(client, base_url, meta.clone()));

    ProviderPlugin {
        meta: meta.clone(),
        address_port,
        schedule_port,
    }
}

/// Build the plugin bundle for ReMidt.
#[must_use]
pub fn remidt_plugin(client: Client) -> ProviderPlugin {
    remidt_plugin_with_base_url(client, REMIDT_URL)
}

/// Build the ReMidt plugin against a different API root.
#[must_use]
pub fn remidt_plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    portal_plugin(client, base_url, &remidt_meta())
}

/// Build the plugin bundle for Fosen Renovasjon.
#[must_use]
pub fn fosen_plugin(client: Client) -> ProviderPlugin {
    fosen_plugin_with_base_url(client, FOSEN_URL)
}

/// Build the Fosen plugin against a different API root.
#[must_use]
pub fn fosen_plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    portal_plugin(client, base_url, &fosen_meta())
}

fn remidt_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::ReMidt,
        "ReMidt",
        "https://remidt.no",
        &["Kristiansund", "Molde", "Orkland", "Sunndal", "Surnadal", "Oppdal", "Smøla"],
        &[(6400, 6499), (6500, 6549)],
    )
}

fn fosen_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Fosen,
        "Fosen Renovasjon",
        "https://fosen.no",
        &["Indre Fosen", "Ørland", "Åfjord"],
        &[(7100, 7180)],
    )
}
