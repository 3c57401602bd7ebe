//! Provider implementation for the Bergen region using the BIR web service.
//!
//! Address search is public. Schedules need a session token obtained from the
//! login endpoint, which is cached per provider instance and refreshed lazily.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use henteplan_core::{
    decode::{iso_date, string_or_number},
    http::{fetch_json, send},
    model::{AddressMatch, LocationId, ProviderId, ProviderMeta, Providers, RawPickup, today},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
    recurrence::horizon,
    session::TokenSession,
};

const SEARCH_URL: &str = "https://bir.no/api";
const WEBSERVICE_URL: &str = "https://webservice.bir.no/api";
const APPLICATION_ID: &str = "94FA72AD-583D-4AA3-988F-491F694DFB7B";
const CLIENT_IDS: &str = "100;300;400";
const TOKEN_HEADER: &str = "token";
/// Upstream tokens last an hour; refresh ten minutes early.
const TOKEN_LIFETIME: Duration = Duration::from_secs(50 * 60);

/// Upstream roots used by the BIR provider.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Public address search API.
    pub search: String,
    /// Authenticated web service with login and pickups.
    pub webservice: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            search: SEARCH_URL.to_owned(),
            webservice: WEBSERVICE_URL.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddressEntry {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    sub_title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'req> {
    applikasjons_id: &'req str,
    oppdragsgiver_id: &'req str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PickupEntry {
    dato: String,
    fraksjon: String,
    #[serde(deserialize_with = "string_or_number")]
    fraksjon_id: String,
}

/// Address search implementation for BIR.
pub struct BirAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl BirAddressPort {
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
impl AddressPort for BirAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let req = self
            .client
            .get(format!("{}/search/AddressSearch", self.base_url))
            .query(&[("q", query), ("s", "false")]);
        let entries = fetch_json::<Vec<AddressEntry>>(&self.meta.id, req).await?;

        Ok(entries
            .into_iter()
            .map(|entry| AddressMatch {
                provider: self.meta.id.clone(),
                label: join_label(&entry.title, &entry.sub_title),
                location_id: LocationId(entry.id),
            })
            .collect())
    }
}

/// Pickup schedule implementation for BIR, owning the session token.
pub struct BirSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
    session: TokenSession,
}

impl BirSchedulePort {
    /// Create a new schedule port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        let meta = provider_meta();
        Self {
            client,
            base_url: base_url.to_owned(),
            session: TokenSession::new(meta.id.clone(), TOKEN_LIFETIME),
            meta,
        }
    }

    async fn login(&self) -> Result<String, PortError> {
        let provider = &self.meta.id;
        let req = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&LoginRequest {
                applikasjons_id: APPLICATION_ID,
                oppdragsgiver_id: CLIENT_IDS,
            });
        let response = send(provider, req).await?;
        let token = token_from_headers(provider, response.headers())?;
        debug!(%provider, "logged in");
        Ok(token)
    }
}

#[async_trait]
impl SchedulePort for BirSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let token = self.session.token(|| self.login()).await?;

        let from = today();
        let date_from = from.to_string();
        let date_to = horizon(from).to_string();
        let req = self
            .client
            .get(format!("{}/tomminger", self.base_url))
            .header("Token", token)
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

fn token_from_headers(
    provider: &ProviderId,
    headers: &HeaderMap,
) -> Result<String, PortError> {
    headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| PortError::malformed(provider, "login response missing token header"))
}

fn join_label(title: &str, subtitle: &str) -> String {
    [title, subtitle]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the plugin bundle for BIR.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with(client, &Endpoints::default())
}

/// Build the plugin against custom upstream roots.
#[must_use]
pub fn plugin_with(client: Client, endpoints: &Endpoints) -> ProviderPlugin {
    let address_port = Arc::new(BirAddressPort::new(client.clone(), &endpoints.search));
    let schedule_port = Arc::new(BirSchedulePort::new(client, &endpoints.webservice));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Bir,
        "BIR",
        "https://bir.no",
        &[
            "Bergen",
            "Askøy",
            "Bjørnafjorden",
            "Eidfjord",
            "Kvam",
            "Osterøy",
            "Samnanger",
            "Ulvik",
            "Vaksdal",
            "Voss",
        ],
        &[(5003, 5499), (5600, 5660), (5700, 5786)],
    )
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    #[test]
    fn labels_skip_empty_parts() {
        assert_eq!(join_label("Storgata 1", "Bergen"), "Storgata 1, Bergen", "both parts");
        assert_eq!(join_label("Storgata 1", ""), "Storgata 1", "no subtitle");
    }

    #[tokio::test]
    async fn search_joins_title_and_subtitle() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search/AddressSearch")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "Storgata".into()),
                Matcher::UrlEncoded("s".into(), "false".into()),
            ]))
            .with_body(r#"[{"Id": "9f1c", "Title": "Storgata 1", "SubTitle": "5003 Bergen"}]"#)
            .create_async()
            .await;

        let port = BirAddressPort::new(Client::new(), &server.url());
        let matches = port.search("Storgata").await.expect("search");

        assert_eq!(matches.len(), 1, "one hit");
        let hit = matches.first().expect("hit");
        assert_eq!(hit.label, "Storgata 1, 5003 Bergen", "joined label");
        assert_eq!(hit.location_id.as_str(), "9f1c", "id");
    }

    #[tokio::test]
    async fn token_is_reused_across_fetches() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/login")
            .match_body(Matcher::PartialJsonString(
                r#"{"applikasjonsId": "94FA72AD-583D-4AA3-988F-491F694DFB7B", "oppdragsgiverId": "100;300;400"}"#
                    .to_owned(),
            ))
            .with_header("token", "secret-1")
            .expect(1)
            .create_async()
            .await;
        let pickups = server
            .mock("GET", "/tomminger")
            .match_header("Token", "secret-1")
            .match_query(Matcher::UrlEncoded("eiendomId".into(), "77".into()))
            .with_body(r#"[{"dato": "2026-11-02T00:00:00", "fraksjon": "Restavfall", "fraksjonId": 1}]"#)
            .expect(2)
            .create_async()
            .await;

        let port = BirSchedulePort::new(Client::new(), &server.url());
        let location = LocationId::from("77");
        let first = port.fetch(&location).await.expect("first fetch");
        let second = port.fetch(&location).await.expect("second fetch");

        login.assert_async().await;
        pickups.assert_async().await;
        assert_eq!(first, second, "same upstream data");
        assert_eq!(first.first().map(|pickup| pickup.fraction_id.as_str()), Some("1"), "numeric id as text");
    }

    #[tokio::test]
    async fn missing_token_header_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _login = server.mock("POST", "/login").create_async().await;

        let port = BirSchedulePort::new(Client::new(), &server.url());
        let err = port.fetch(&LocationId::from("77")).await.expect_err("no token");
        assert!(matches!(err, PortError::Malformed { .. }), "malformed login");
    }

    #[tokio::test]
    async fn rejected_login_carries_status() {
        let mut server = mockito::Server::new_async().await;
        let _login = server.mock("POST", "/login").with_status(401).create_async().await;

        let port = BirSchedulePort::new(Client::new(), &server.url());
        let err = port.fetch(&LocationId::from("77")).await.expect_err("login rejected");
        assert_eq!(err.status().map(|status| status.as_u16()), Some(401), "status kept");
    }
}
