//! Provider implementation for Renovasjonen IKS.
//!
//! Stavanger and Sandnes each host their own copy of the address service and
//! calendar page. Search asks both hosts; the location key records which host
//! the address came from so the schedule is read from the same place.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;

use henteplan_core::{
    decode::string_or_number,
    http::{fetch_json, fetch_text},
    location::{decode_fields, encode_location},
    model::{AddressMatch, LocationId, ProviderMeta, Providers, RawPickup, today},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
};

pub mod calendar;

use calendar::parse_calendar_html;

const STAVANGER_URL: &str = "https://www.stavanger.kommune.no";
const SANDNES_URL: &str = "https://www.hentavfall.no";
const SANDNES_MUNICIPALITY_ID: &str = "1108";
const SANDNES_CALENDAR_NAME: &str = "Sandnes kommune 2020";

/// Upstream roots used by the Renovasjonen provider.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Stavanger kommune site.
    pub stavanger: String,
    /// hentavfall.no, serving Sandnes.
    pub sandnes: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            stavanger: STAVANGER_URL.to_owned(),
            sandnes: SANDNES_URL.to_owned(),
        }
    }
}

/// Host an address belongs to; the first field of every location key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Municipality {
    Stavanger,
    Sandnes,
}

impl Municipality {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "stavanger" => Some(Self::Stavanger),
            "sandnes" => Some(Self::Sandnes),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Stavanger => "Stavanger",
            Self::Sandnes => "Sandnes",
        }
    }
}

impl fmt::Display for Municipality {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Stavanger => "stavanger",
            Self::Sandnes => "sandnes",
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Address {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    adresse: String,
    #[serde(deserialize_with = "string_or_number")]
    g_nr: String,
    #[serde(deserialize_with = "string_or_number")]
    b_nr: String,
    #[serde(deserialize_with = "string_or_number")]
    s_nr: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SandnesSearchResponse {
    #[serde(default)]
    result: Vec<Address>,
}

fn address_match(meta: &ProviderMeta, municipality: Municipality, address: Address) -> AddressMatch {
    AddressMatch {
        provider: meta.id.clone(),
        label: format!("{}, {}", address.adresse, municipality.label()),
        location_id: encode_location([
            municipality.to_string(),
            address.id,
            address.g_nr,
            address.b_nr,
            address.s_nr,
        ]),
    }
}

/// Address search implementation for Renovasjonen.
pub struct RenovasjonenAddressPort {
    client: Client,
    endpoints: Endpoints,
    meta: ProviderMeta,
}

impl RenovasjonenAddressPort {
    /// Create a new address port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, endpoints: Endpoints) -> Self {
        Self {
            client,
            endpoints,
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl AddressPort for RenovasjonenAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let provider = &self.meta.id;

        let stavanger_req = self
            .client
            .get(format!("{}/api/renovasjonservice/GroupedAddressSearch", self.endpoints.stavanger))
            .query(&[("address", query)]);
        let stavanger = fetch_json::<Vec<Address>>(provider, stavanger_req).await?;

        let sandnes_req = self
            .client
            .get(format!("{}/api/renovasjonservice/AddressSearch", self.endpoints.sandnes))
            .query(&[("address", query), ("municipalityId", SANDNES_MUNICIPALITY_ID)]);
        let sandnes = fetch_json::<SandnesSearchResponse>(provider, sandnes_req).await?;

        let from_stavanger = stavanger
            .into_iter()
            .map(|address| address_match(&self.meta, Municipality::Stavanger, address));
        let from_sandnes = sandnes
            .result
            .into_iter()
            .map(|address| address_match(&self.meta, Municipality::Sandnes, address));
        Ok(from_stavanger.chain(from_sandnes).collect())
    }
}

/// Pickup schedule implementation for Renovasjonen.
pub struct RenovasjonenSchedulePort {
    client: Client,
    endpoints: Endpoints,
    meta: ProviderMeta,
}

impl RenovasjonenSchedulePort {
    /// Create a new schedule port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, endpoints: Endpoints) -> Self {
        Self {
            client,
            endpoints,
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl SchedulePort for RenovasjonenSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let [variant, id, gnr, bnr, snr] = decode_fields::<5>(provider, location_id)?;
        let municipality =
            Municipality::parse(&variant).ok_or_else(|| PortError::invalid_location(provider, location_id))?;

        let req = match municipality {
            Municipality::Sandnes => self
                .client
                .get(format!("{}/rogaland/sandnes/tommekalender/show", self.endpoints.sandnes))
                .query(&[
                    ("id", id.as_str()),
                    ("municipality", SANDNES_CALENDAR_NAME),
                    ("gnumber", gnr.as_str()),
                    ("bnumber", bnr.as_str()),
                    ("snumber", snr.as_str()),
                ]),
            Municipality::Stavanger => self
                .client
                .get(format!(
                    "{}/renovasjon-og-miljo/tommekalender/finn-kalender/show",
                    self.endpoints.stavanger
                ))
                .query(&[
                    ("ids", id.as_str()),
                    ("municipality", municipality.label()),
                    ("gnumber", gnr.as_str()),
                    ("bnumber", bnr.as_str()),
                    ("snumber", snr.as_str()),
                ]),
        };
        let html = fetch_text(provider, req).await?;

        parse_calendar_html(provider, &html, today().year())
    }
}

/// Build the plugin bundle for Renovasjonen IKS.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with(client, &Endpoints::default())
}

/// Build the plugin against custom upstream roots.
#[must_use]
pub fn plugin_with(client: Client, endpoints: &Endpoints) -> ProviderPlugin {
    let address_port = Arc::new(RenovasjonenAddressPort::new(client.clone(), endpoints.clone()));
    let schedule_port = Arc::new(RenovasjonenSchedulePort::new(client, endpoints.clone()));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Renovasjonen,
        "Renovasjonen IKS",
        "https://renovasjonen.no",
        &["Stavanger", "Sandnes"],
        &[(4000, 4099), (4300, 4399)],
    )
}
