//! Provider implementation for MinRenovasjon, Norkart's shared backend used by
//! a large number of municipalities.
//!
//! Norkart is also the catch-all for detection: [`NorkartDirectory`] lists the
//! municipalities registered with the app and is shared with the detector.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use tracing::debug;

use henteplan_core::{
    cache::TtlCache,
    decode::{iso_date, string_or_number},
    geonorge::{GEONORGE_URL, search_addresses},
    http::fetch_json,
    location::{decode_fields, encode_location},
    model::{AddressMatch, LocationId, ProviderId, ProviderMeta, Providers, RawPickup, today},
    plugin::ProviderPlugin,
    ports::{AddressPort, MunicipalityDirectory, PortError, SchedulePort},
    recurrence::horizon,
};

const DIRECTORY_URL: &str = "https://www.webatlas.no/wacloud/servicerepository/CatalogueService.svc/json/GetRegisteredAppCustomers";
const APP_ID: &str = "MobilOS-NorkartRenovasjon";
const PROXY_URL: &str = "https://norkartrenovasjon.azurewebsites.net/proxyserver.ashx";
const API_URL: &str = "https://komteksky.norkart.no/MinRenovasjon.Api/api";
const APP_KEY: &str = "AE13DEEC-804F-4615-A74E-B4FAC11F0A30";
const DIRECTORY_KEY: &str = "norkart:customers";
/// Lifetime of the cached municipality directory.
pub const DIRECTORY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upstream roots used by the Norkart provider.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Registered app customer catalogue.
    pub directory: String,
    /// Geonorge address API.
    pub geonorge: String,
    /// CORS proxy in front of the MinRenovasjon API.
    pub proxy: String,
    /// MinRenovasjon API root, passed to the proxy as `server`.
    pub api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            directory: DIRECTORY_URL.to_owned(),
            geonorge: GEONORGE_URL.to_owned(),
            proxy: PROXY_URL.to_owned(),
            api: API_URL.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Customer {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Fraction {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    navn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CalendarEntry {
    #[serde(deserialize_with = "string_or_number")]
    fraksjon_id: String,
    #[serde(default)]
    tommedatoer: Vec<String>,
}

/// Municipalities registered with MinRenovasjon, cached for [`DIRECTORY_TTL`].
pub struct NorkartDirectory {
    client: Client,
    url: String,
    provider: ProviderId,
    cache: TtlCache<Arc<[String]>>,
}

impl NorkartDirectory {
    /// Create a directory reading from the given catalogue URL.
    #[must_use]
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_owned(),
            provider: Providers::Norkart.into(),
            cache: TtlCache::new(),
        }
    }
}

#[async_trait]
impl MunicipalityDirectory for NorkartDirectory {
    fn provider(&self) -> &ProviderId {
        &self.provider
    }

    async fn municipalities(&self) -> Result<Arc<[String]>, PortError> {
        if let Some(names) = self.cache.get(DIRECTORY_KEY) {
            return Ok(names);
        }

        let req = self.client.get(&self.url).query(&[("Appid", APP_ID)]);
        let customers = fetch_json::<Vec<Customer>>(&self.provider, req).await?;
        let names: Arc<[String]> = customers
            .into_iter()
            .map(|customer| customer.name.to_lowercase())
            .collect();

        debug!(provider = %self.provider, count = names.len(), "municipality directory refreshed");
        self.cache.set(DIRECTORY_KEY, Arc::clone(&names), DIRECTORY_TTL);
        Ok(names)
    }
}

/// Address search implementation for Norkart.
///
/// Geonorge has every address in the country; hits outside the directory are
/// dropped.
pub struct NorkartAddressPort {
    client: Client,
    geonorge_url: String,
    directory: Arc<NorkartDirectory>,
    meta: ProviderMeta,
}

impl NorkartAddressPort {
    /// Create a new address port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, geonorge_url: &str, directory: Arc<NorkartDirectory>) -> Self {
        Self {
            client,
            geonorge_url: geonorge_url.to_owned(),
            directory,
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl AddressPort for NorkartAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let customers = self.directory.municipalities().await?;
        let addresses = search_addresses(&self.client, &self.geonorge_url, &self.meta.id, query, None).await?;

        Ok(addresses
            .into_iter()
            .filter(|address| customers.contains(&address.municipality.to_lowercase()))
            .map(|address| AddressMatch {
                provider: self.meta.id.clone(),
                label: format!(
                    "{} {}, {} {} ({})",
                    address.street,
                    address.number,
                    address.postal_code,
                    address.postal_place,
                    address.municipality
                ),
                location_id: encode_location([
                    &address.municipality_number,
                    &address.street,
                    &address.street_code,
                    &address.number,
                ]),
            })
            .collect())
    }
}

/// Pickup schedule implementation for Norkart.
pub struct NorkartSchedulePort {
    client: Client,
    proxy_url: String,
    api_url: String,
    meta: ProviderMeta,
}

impl NorkartSchedulePort {
    /// Create a new schedule port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, proxy_url: &str, api_url: &str) -> Self {
        Self {
            client,
            proxy_url: proxy_url.to_owned(),
            api_url: api_url.to_owned(),
            meta: provider_meta(),
        }
    }

    /// Proxied GET carrying the municipality and app key headers.
    fn proxied(&self, target: &str, municipality_number: &str) -> RequestBuilder {
        self.client
            .get(&self.proxy_url)
            .query(&[("server", target)])
            .header("Kommunenr", municipality_number)
            .header("RenovasjonAppKey", APP_KEY)
    }

    fn calendar_url(&self, street: &str, street_code: &str, number: &str) -> Result<Url, PortError> {
        let from = today();
        let date_from = from.to_string();
        let date_to = horizon(from).to_string();
        Url::parse_with_params(
            &format!("{}/tommekalender/", self.api_url),
            &[
                ("gatenavn", street),
                ("gatekode", street_code),
                ("husnr", number),
                ("fraDato", date_from.as_str()),
                ("dato", date_to.as_str()),
                ("api-version", "2"),
            ],
        )
        .map_err(|err| PortError::malformed(&self.meta.id, format!("calendar url: {err}")))
    }
}

#[async_trait]
impl SchedulePort for NorkartSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let [municipality_number, street, street_code, number] = decode_fields::<4>(provider, location_id)?;

        let fractions_url = format!("{}/fraksjoner", self.api_url);
        let fractions = fetch_json::<Vec<Fraction>>(provider, self.proxied(&fractions_url, &municipality_number)).await?;
        let names: HashMap<String, String> = fractions
            .into_iter()
            .map(|fraction| (fraction.id, fraction.navn))
            .collect();

        let calendar_url = self.calendar_url(&street, &street_code, &number)?;
        let calendar =
            fetch_json::<Vec<CalendarEntry>>(provider, self.proxied(calendar_url.as_str(), &municipality_number))
                .await?;

        let mut pickups = Vec::new();
        for entry in calendar {
            let name = names
                .get(&entry.fraksjon_id)
                .cloned()
                .unwrap_or_else(|| format!("Fraksjon {}", entry.fraksjon_id));
            for raw in &entry.tommedatoer {
                pickups.push(RawPickup::new(
                    iso_date(provider, raw)?,
                    name.clone(),
                    entry.fraksjon_id.clone(),
                ));
            }
        }
        Ok(pickups)
    }
}

/// Create the shared municipality directory.
#[must_use]
pub fn directory(client: Client) -> Arc<NorkartDirectory> {
    directory_with(client, &Endpoints::default())
}

/// Create the directory against custom upstream roots.
#[must_use]
pub fn directory_with(client: Client, endpoints: &Endpoints) -> Arc<NorkartDirectory> {
    Arc::new(NorkartDirectory::new(client, &endpoints.directory))
}

/// Build the plugin bundle for Norkart around a shared directory.
#[must_use]
pub fn plugin(client: Client, directory: Arc<NorkartDirectory>) -> ProviderPlugin {
    plugin_with(client, &Endpoints::default(), directory)
}

/// Build the plugin against custom upstream roots.
///
/// The directory is shared with the detector, so it is built separately with
/// [`directory_with`].
#[must_use]
pub fn plugin_with(client: Client, endpoints: &Endpoints, directory: Arc<NorkartDirectory>) -> ProviderPlugin {
    let address_port = Arc::new(NorkartAddressPort::new(client.clone(), &endpoints.geonorge, directory));
    let schedule_port = Arc::new(NorkartSchedulePort::new(client, &endpoints.proxy, &endpoints.api));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Norkart,
        "MinRenovasjon (Norkart)",
        "https://www.norkart.no",
        &["~198 kommuner"],
        &[],
    )
}
