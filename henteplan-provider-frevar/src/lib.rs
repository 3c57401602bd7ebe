//! Provider implementation for Fredrikstad using FREVAR's ArcGIS services.
//!
//! Search returns plain addresses. A schedule needs the address' agreement
//! number (`AvtLnr`), which is resolved with an extra attribute query unless
//! the location key already carries it as `address|avtlnr`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use henteplan_core::{
    decode::string_or_number,
    http::fetch_json,
    location::{decode_location, encode_location},
    model::{AddressMatch, LocationId, ProviderId, ProviderMeta, Providers, RawPickup, today},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
    recurrence::horizon,
};

const BASE_URL: &str = "https://arcgis.fredrikstad.kommune.no/server/rest/services";
const ADDRESS_LAYER: &str = "Matrikkel/Eiendomskart/MapServer/0";
const AGREEMENT_LAYER: &str = "Renovasjon/MinRenovasjon/MapServer/0";
const CALENDAR_LAYER: &str = "Renovasjon/MinRenovasjon/MapServer/1";
const MUNICIPALITY_ID: u32 = 3107;

#[derive(Debug, Deserialize)]
struct FeatureSet<T> {
    features: Vec<Feature<T>>,
}

#[derive(Debug, Deserialize)]
struct Feature<T> {
    attributes: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct AddressAttributes {
    adresse: String,
}

#[derive(Debug, Deserialize)]
struct AgreementAttributes {
    #[serde(rename = "AvtLnr", deserialize_with = "string_or_number")]
    agreement: String,
}

#[derive(Debug, Deserialize)]
struct CalendarAttributes {
    #[serde(rename = "AvfallId", deserialize_with = "string_or_number")]
    waste_id: String,
    /// Epoch milliseconds.
    #[serde(rename = "Dato")]
    date: i64,
}

/// Display name of an `AvfallId`.
fn fraction_name(waste_id: &str) -> String {
    let name = match waste_id {
        "1" => "Restavfall",
        "2" => "Papir og plast",
        "4" => "Glass og metall",
        "6" => "Farlig avfall",
        "9" => "Tekstil",
        "16" => "Matavfall",
        other => return format!("Type {other}"),
    };
    name.to_owned()
}

/// Quote a value as an ArcGIS SQL string literal.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Shared ArcGIS layer query.
async fn query_layer<T: DeserializeOwned>(
    client: &Client,
    base_url: &str,
    provider: &ProviderId,
    layer: &str,
    where_clause: &str,
    out_fields: &str,
) -> Result<Vec<T>, PortError> {
    let req = client.get(format!("{base_url}/{layer}/query")).query(&[
        ("where", where_clause),
        ("outFields", out_fields),
        ("returnGeometry", "false"),
        ("f", "json"),
    ]);
    let set = fetch_json::<FeatureSet<T>>(provider, req).await?;
    Ok(set.features.into_iter().map(|feature| feature.attributes).collect())
}

/// Address search implementation for FREVAR.
pub struct FrevarAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl FrevarAddressPort {
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
impl AddressPort for FrevarAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let pattern = format!("{}%", query.to_uppercase());
        let where_clause = format!(
            "ADRESSE LIKE {} AND KOMMUNEID={MUNICIPALITY_ID}",
            sql_literal(&pattern)
        );
        let rows = query_layer::<AddressAttributes>(
            &self.client,
            &self.base_url,
            &self.meta.id,
            ADDRESS_LAYER,
            &where_clause,
            "ADRESSE",
        )
        .await?;

        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .filter(|row| seen.insert(row.adresse.clone()))
            .map(|row| AddressMatch {
                provider: self.meta.id.clone(),
                label: format!("{}, Fredrikstad", row.adresse),
                location_id: encode_location([&row.adresse]),
            })
            .collect())
    }
}

/// Pickup schedule implementation for FREVAR.
pub struct FrevarSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl FrevarSchedulePort {
    /// Create a new schedule port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_owned(),
            meta: provider_meta(),
        }
    }

    async fn agreement_for(&self, address: &str) -> Result<String, PortError> {
        let provider = &self.meta.id;
        let where_clause = format!(
            "UPPER(Adresse)={} AND AvtStatus=0",
            sql_literal(&address.to_uppercase())
        );
        let rows = query_layer::<AgreementAttributes>(
            &self.client,
            &self.base_url,
            provider,
            AGREEMENT_LAYER,
            &where_clause,
            "AvtLnr",
        )
        .await?;

        let agreement = rows
            .into_iter()
            .next()
            .map(|row| row.agreement)
            .ok_or_else(|| PortError::malformed(provider, "no agreement found for address"))?;
        debug!(%provider, %agreement, "resolved agreement number");
        Ok(agreement)
    }
}

#[async_trait]
impl SchedulePort for FrevarSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let agreement = match decode_location(location_id).as_slice() {
            [address] => self.agreement_for(address).await?,
            [address, embedded] if embedded.is_empty() => self.agreement_for(address).await?,
            [_address, embedded] => embedded.clone(),
            _ => return Err(PortError::invalid_location(provider, location_id)),
        };
        if agreement.is_empty() || !agreement.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(PortError::invalid_location(provider, location_id));
        }

        let from = today();
        let where_clause = format!(
            "AvtLnr={agreement} AND Dato>=date'{from}' AND Dato<=date'{}'",
            horizon(from)
        );
        let rows = query_layer::<CalendarAttributes>(
            &self.client,
            &self.base_url,
            provider,
            CALENDAR_LAYER,
            &where_clause,
            "AvtLnr,Dato,AvfallId",
        )
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(RawPickup::new(
                    epoch_millis_date(provider, row.date)?,
                    fraction_name(&row.waste_id),
                    row.waste_id,
                ))
            })
            .collect()
    }
}

fn epoch_millis_date(provider: &ProviderId, millis: i64) -> Result<NaiveDate, PortError> {
    DateTime::from_timestamp_millis(millis)
        .map(|instant| instant.date_naive())
        .ok_or_else(|| PortError::malformed(provider, format!("timestamp out of range: {millis}")))
}

/// Build the plugin bundle for FREVAR.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with_base_url(client, BASE_URL)
}

/// Build the plugin against a different ArcGIS services root.
#[must_use]
pub fn plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    let address_port = Arc::new(FrevarAddressPort::new(client.clone(), base_url));
    let schedule_port = Arc::new(FrevarSchedulePort::new(client, base_url));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Frevar,
        "FREVAR",
        "https://frevar.no",
        &["Fredrikstad"],
        &[(1601, 1639)],
    )
}
