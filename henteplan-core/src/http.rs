//! Helpers shared by every provider for talking to upstream HTTP APIs.

use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::model::ProviderId;
use crate::ports::PortError;

/// Send a request and reject non-success statuses.
///
/// # Errors
///
/// Returns [`PortError::Transport`] when the request could not be completed and
/// [`PortError::Upstream`] when the status is not 2xx.
pub async fn send(provider: &ProviderId, req: RequestBuilder) -> Result<Response, PortError> {
    let response = req.send().await.map_err(|source| PortError::Transport {
        provider: provider.clone(),
        source,
    })?;

    let status = response.status();
    debug!(%provider, url = %response.url(), %status, "upstream response");

    if status.is_success() {
        Ok(response)
    } else {
        Err(PortError::Upstream {
            provider: provider.clone(),
            status,
        })
    }
}

/// Fetch and decode a JSON body.
///
/// # Errors
///
/// See [`send`]; body decoding failures surface as [`PortError::Transport`].
pub async fn fetch_json<T: DeserializeOwned>(
    provider: &ProviderId,
    req: RequestBuilder,
) -> Result<T, PortError> {
    send(provider, req)
        .await?
        .json()
        .await
        .map_err(|source| PortError::Transport {
            provider: provider.clone(),
            source,
        })
}

/// Fetch a body as text.
///
/// # Errors
///
/// See [`send`].
pub async fn fetch_text(provider: &ProviderId, req: RequestBuilder) -> Result<String, PortError> {
    send(provider, req)
        .await?
        .text()
        .await
        .map_err(|source| PortError::Transport {
            provider: provider.clone(),
            source,
        })
}

/// Append percent-encoded path segments to a base URL.
///
/// # Errors
///
/// Returns [`PortError::Malformed`] when `base` is not a valid hierarchical URL.
pub fn url_with_segments(
    provider: &ProviderId,
    base: &str,
    segments: &[&str],
) -> Result<Url, PortError> {
    let mut url = Url::parse(base)
        .map_err(|err| PortError::malformed(provider, format!("bad base url {base}: {err}")))?;
    url.path_segments_mut()
        .map_err(|()| PortError::malformed(provider, format!("base url {base} cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
