//! Provider implementation for IRIS Salten (Bodø region).
//!
//! The schedule endpoint answers for whatever estate is bound to the caller's
//! PHP session. Each fetch therefore opens a fresh session, binds the estate
//! and reads the schedule with the same cookie, strictly in that order.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::COOKIE;
use serde::Deserialize;
use tracing::debug;

use henteplan_core::{
    decode::{iso_date, string_or_number},
    http::{fetch_json, send},
    location::{decode_fields, encode_location},
    model::{AddressMatch, LocationId, ProviderMeta, Providers, RawPickup},
    plugin::ProviderPlugin,
    ports::{AddressPort, PortError, SchedulePort},
    session::session_cookies,
};

const BASE_URL: &str = "https://www.iris-salten.no/xmlhttprequest.php";

#[derive(Debug, Deserialize)]
struct Estate {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    adresse: String,
    #[serde(default)]
    kommune: String,
}

#[derive(Debug, Deserialize)]
struct EmptyingResponse {
    #[serde(default)]
    days: Vec<Day>,
}

#[derive(Debug, Deserialize)]
struct Day {
    date: String,
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    fraction_name: String,
    #[serde(default)]
    fraction_icon: String,
}

/// Address search implementation for IRIS.
pub struct IrisAddressPort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl IrisAddressPort {
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
impl AddressPort for IrisAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let req = self
            .client
            .get(&self.base_url)
            .query(&[("service", "irisapi.realestates"), ("address", query)]);
        let estates = fetch_json::<Vec<Estate>>(&self.meta.id, req).await?;

        Ok(estates
            .into_iter()
            .map(|estate| AddressMatch {
                provider: self.meta.id.clone(),
                label: format!("{}, {}", estate.adresse, estate.kommune),
                location_id: encode_location([&estate.id, &estate.adresse, &estate.kommune]),
            })
            .collect())
    }
}

/// Pickup schedule implementation for IRIS.
pub struct IrisSchedulePort {
    client: Client,
    base_url: String,
    meta: ProviderMeta,
}

impl IrisSchedulePort {
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
impl SchedulePort for IrisSchedulePort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
        let provider = &self.meta.id;
        let [estate_id, estate_name, municipality] = decode_fields::<3>(provider, location_id)?;

        let init = self
            .client
            .get(&self.base_url)
            .query(&[("service", "irisapi.realestates"), ("address", estate_name.as_str())]);
        let response = send(provider, init).await?;
        let cookie = session_cookies(provider, response.headers())?;
        debug!(%provider, "session opened");

        let bind = self
            .client
            .get(&self.base_url)
            .header(COOKIE, &cookie)
            .query(&[
                ("service", "irisapi.setestate"),
                ("estateid", estate_id.as_str()),
                ("estatename", estate_name.as_str()),
                ("estatemunicipality", municipality.as_str()),
            ]);
        send(provider, bind).await?;

        let schedule = self
            .client
            .get(&self.base_url)
            .header(COOKIE, &cookie)
            .query(&[("service", "irisapi.estateempty")]);
        let emptying = fetch_json::<EmptyingResponse>(provider, schedule).await?;

        let mut pickups = Vec::new();
        for day in emptying.days {
            let date = iso_date(provider, &day.date)?;
            pickups.extend(
                day.events
                    .into_iter()
                    .map(|event| RawPickup::new(date, event.fraction_name, event.fraction_icon)),
            );
        }
        Ok(pickups)
    }
}

/// Build the plugin bundle for IRIS Salten.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    plugin_with_base_url(client, BASE_URL)
}

/// Build the plugin against a different endpoint.
#[must_use]
pub fn plugin_with_base_url(client: Client, base_url: &str) -> ProviderPlugin {
    let address_port = Arc::new(IrisAddressPort::new(client.clone(), base_url));
    let schedule_port = Arc::new(IrisSchedulePort::new(client, base_url));

    ProviderPlugin {
        meta: provider_meta(),
        address_port,
        schedule_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(
        Providers::Iris,
        "IRIS Salten",
        "https://iris-salten.no",
        &["Bodø", "Fauske", "Saltdal", "Sørfold", "Steigen", "Gildeskål", "Meløy", "Beiarn"],
        &[(8000, 8099)],
    )
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    const KEY: &str = "4711|Storgata 5|Bodø";

    #[tokio::test]
    async fn search_packs_estate_fields() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("service".into(), "irisapi.realestates".into()),
                Matcher::UrlEncoded("address".into(), "Storgata 5".into()),
            ]))
            .with_body(r#"[{"id": 4711, "adresse": "Storgata 5", "kommune": "Bodø"}]"#)
            .create_async()
            .await;

        let port = IrisAddressPort::new(Client::new(), &server.url());
        let matches = port.search("Storgata 5").await.expect("search");
        let hit = matches.first().expect("one hit");

        assert_eq!(hit.label, "Storgata 5, Bodø", "label");
        assert_eq!(hit.location_id.as_str(), KEY, "composite key");
    }

    #[tokio::test]
    async fn cookie_is_sent_on_bind_and_schedule() {
        let mut server = mockito::Server::new_async().await;
        let init = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("service".into(), "irisapi.realestates".into()))
            .with_header("set-cookie", "PHPSESSID=s3ss; path=/; HttpOnly")
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let bind = server
            .mock("GET", "/")
            .match_header("cookie", "PHPSESSID=s3ss")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("service".into(), "irisapi.setestate".into()),
                Matcher::UrlEncoded("estateid".into(), "4711".into()),
                Matcher::UrlEncoded("estatename".into(), "Storgata 5".into()),
                Matcher::UrlEncoded("estatemunicipality".into(), "Bodø".into()),
            ]))
            .expect(1)
            .create_async()
            .await;
        let schedule = server
            .mock("GET", "/")
            .match_header("cookie", "PHPSESSID=s3ss")
            .match_query(Matcher::UrlEncoded("service".into(), "irisapi.estateempty".into()))
            .with_body(
                r#"{"days": [{"date": "2026-11-04", "events": [
                    {"fractionName": "Restavfall", "fractionIcon": "rest"},
                    {"fractionName": "Papir", "fractionIcon": "papir"}]}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let port = IrisSchedulePort::new(Client::new(), &server.url());
        let pickups = port.fetch(&LocationId::from(KEY)).await.expect("schedule");

        init.assert_async().await;
        bind.assert_async().await;
        schedule.assert_async().await;
        let ids: Vec<&str> = pickups.iter().map(|pickup| pickup.fraction_id.as_str()).collect();
        assert_eq!(ids, ["rest", "papir"], "one tuple per event");
    }

    #[tokio::test]
    async fn failed_bind_aborts() {
        let mut server = mockito::Server::new_async().await;
        let _init = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("service".into(), "irisapi.realestates".into()))
            .with_header("set-cookie", "PHPSESSID=s3ss")
            .with_body("[]")
            .create_async()
            .await;
        let _bind = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("service".into(), "irisapi.setestate".into()))
            .with_status(500)
            .create_async()
            .await;

        let port = IrisSchedulePort::new(Client::new(), &server.url());
        let err = port.fetch(&LocationId::from(KEY)).await.expect_err("bind failed");
        assert_eq!(err.status().map(|status| status.as_u16()), Some(500), "status kept");
    }
}
