//! Traits describing provider capabilities and the shared error type.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Error as ReqwestError, StatusCode};

use crate::model::{AddressMatch, LocationId, ProviderId, ProviderMeta, RawPickup};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to provider backends.
pub enum PortError {
    /// Upstream answered with a non-success status.
    #[error("{provider}: upstream responded with status {status}")]
    Upstream {
        /// Provider that made the call.
        provider: ProviderId,
        /// Status returned by the upstream.
        status: StatusCode,
    },
    /// Network layer failed, timed out, or the body could not be decoded.
    #[error("{provider}: request failed: {source}")]
    Transport {
        /// Provider that made the call.
        provider: ProviderId,
        /// Underlying client error.
        #[source]
        source: ReqwestError,
    },
    /// Upstream answered, but without the data we need.
    #[error("{provider}: unexpected response: {reason}")]
    Malformed {
        /// Provider that made the call.
        provider: ProviderId,
        /// What was missing or unparsable.
        reason: String,
    },
    /// Location identifier does not match the provider's key layout.
    #[error("{provider}: invalid location id {location_id:?}")]
    InvalidLocationId {
        /// Provider that rejected the key.
        provider: ProviderId,
        /// The offending key.
        location_id: LocationId,
    },
    /// No provider is registered under the identifier.
    #[error("Unknown provider: {0}")]
    UnknownProvider(ProviderId),
}

impl PortError {
    /// Build a [`PortError::Malformed`] for the given provider.
    #[must_use]
    pub fn malformed<R: Into<String>>(provider: &ProviderId, reason: R) -> Self {
        PortError::Malformed {
            provider: provider.clone(),
            reason: reason.into(),
        }
    }

    /// Build a [`PortError::InvalidLocationId`] for the given provider.
    #[must_use]
    pub fn invalid_location(provider: &ProviderId, location_id: &LocationId) -> Self {
        PortError::InvalidLocationId {
            provider: provider.clone(),
            location_id: location_id.clone(),
        }
    }

    /// Provider the error originated from.
    #[must_use]
    pub fn provider(&self) -> &ProviderId {
        match self {
            PortError::Upstream { provider, .. }
            | PortError::Transport { provider, .. }
            | PortError::Malformed { provider, .. }
            | PortError::InvalidLocationId { provider, .. } => provider,
            PortError::UnknownProvider(provider) => provider,
        }
    }

    /// Upstream status code, when the failure carried one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PortError::Upstream { status, .. } => Some(*status),
            PortError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }
}

#[async_trait]
/// Trait for provider-specific address search backends.
pub trait AddressPort: Send + Sync {
    /// Metadata describing the provider handled by this port.
    fn meta(&self) -> &ProviderMeta;

    /// Resolve free text into candidate pickup locations.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails.
    async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError>;
}

#[async_trait]
/// Trait for provider-specific pickup schedule backends.
pub trait SchedulePort: Send + Sync {
    /// Metadata describing the provider handled by this port.
    fn meta(&self) -> &ProviderMeta;

    /// Run the provider's upstream protocol and return raw pickups.
    ///
    /// Implementations do not filter, sort or cache;
    /// [`ProviderAdapter::get_pickups`](crate::plugin::ProviderAdapter::get_pickups)
    /// does that uniformly for every provider.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when any upstream step fails or rejects the location.
    async fn fetch(&self, location_id: &LocationId) -> Result<Vec<RawPickup>, PortError>;
}

#[async_trait]
/// Directory of municipality names served by the catch-all provider.
pub trait MunicipalityDirectory: Send + Sync {
    /// Provider the directory belongs to.
    fn provider(&self) -> &ProviderId;

    /// Lower-cased municipality names.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the directory cannot be fetched.
    async fn municipalities(&self) -> Result<Arc<[String]>, PortError>;
}
