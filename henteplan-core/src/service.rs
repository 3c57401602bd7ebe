//! High-level service facade combining all providers.

use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;

use crate::detection::ProviderDetector;
use crate::model::{AddressMatch, LocationId, ProviderId, ProviderMeta, WastePickup};
use crate::plugin::ProviderRegistry;
use crate::ports::PortError;

/// Public entry point for detection, address search and schedules.
pub struct HenteplanService {
    registry: Arc<ProviderRegistry>,
    detector: Arc<ProviderDetector>,
}

impl HenteplanService {
    /// Create a new service bound to the provided registry and detector.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, detector: Arc<ProviderDetector>) -> Self {
        Self { registry, detector }
    }

    /// Metadata for every registered provider, in registration order.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderMeta> {
        self.registry.providers()
    }

    /// Pick the provider serving a postal code and/or city.
    pub async fn detect(&self, postal_code: Option<&str>, city: Option<&str>) -> Option<ProviderId> {
        self.detector.detect(postal_code, city).await
    }

    /// Search addresses with one provider, or with all of them when `provider` is `None`.
    ///
    /// Fan-out searches run concurrently; providers that fail are logged and
    /// contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownProvider`] for an unregistered id, or the
    /// provider's error for a targeted search.
    pub async fn search(
        &self,
        provider: Option<&ProviderId>,
        query: &str,
    ) -> Result<Vec<AddressMatch>, PortError> {
        if let Some(id) = provider {
            return self.registry.provider(id)?.search_address(query).await;
        }

        let searches = self.registry.list_all().map(|adapter| async move {
            (adapter.id().clone(), adapter.search_address(query).await)
        });
        let mut matches = Vec::new();
        for (id, outcome) in join_all(searches).await {
            match outcome {
                Ok(found) => matches.extend(found),
                Err(err) => warn!(provider = %id, error = %err, "address search failed"),
            }
        }
        Ok(matches)
    }

    /// Upcoming pickups for a location of the given provider.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownProvider`] for an unregistered id, or the
    /// provider's error when the schedule could not be fetched.
    pub async fn schedule(
        &self,
        provider: &ProviderId,
        location_id: &LocationId,
    ) -> Result<Arc<[WastePickup]>, PortError> {
        self.registry.provider(provider)?.get_pickups(location_id).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::detection::DEFAULT_RULES;
    use crate::model::{Providers, RawPickup};
    use crate::plugin::ProviderPlugin;
    use crate::ports::{AddressPort, SchedulePort};

    struct StaticPort {
        meta: ProviderMeta,
        fail: bool,
    }

    #[async_trait]
    impl AddressPort for StaticPort {
        fn meta(&self) -> &ProviderMeta {
            &self.meta
        }

        async fn search(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
            if self.fail {
                return Err(PortError::malformed(&self.meta.id, "down"));
            }
            Ok(vec![AddressMatch {
                provider: self.meta.id.clone(),
                label: format!("{query} ({})", self.meta.id),
                location_id: LocationId::from("1"),
            }])
        }
    }

    #[async_trait]
    impl SchedulePort for StaticPort {
        fn meta(&self) -> &ProviderMeta {
            &self.meta
        }

        async fn fetch(&self, _location_id: &LocationId) -> Result<Vec<RawPickup>, PortError> {
            Ok(Vec::new())
        }
    }

    fn plugin(id: Providers, fail: bool) -> ProviderPlugin {
        let meta = ProviderMeta::new(id, "Static", "https://example.no", &[], &[]);
        let port = Arc::new(StaticPort {
            meta: meta.clone(),
            fail,
        });
        let address_port: Arc<dyn AddressPort> = Arc::<StaticPort>::clone(&port);
        let schedule_port: Arc<dyn SchedulePort> = port;
        ProviderPlugin {
            meta,
            address_port,
            schedule_port,
        }
    }

    fn service() -> HenteplanService {
        let registry = ProviderRegistry::new(vec![
            plugin(Providers::Trv, false),
            plugin(Providers::Bir, true),
            plugin(Providers::Oslo, false),
        ]);
        HenteplanService::new(
            Arc::new(registry),
            Arc::new(ProviderDetector::new(DEFAULT_RULES, None)),
        )
    }

    #[tokio::test]
    async fn fan_out_skips_failing_providers() {
        let matches = service().search(None, "Storgata 1").await.expect("fan-out never fails");
        let providers: Vec<String> = matches.iter().map(|found| found.provider.to_string()).collect();
        assert_eq!(providers, ["trv", "oslo"], "failing bir contributes nothing");
    }

    #[tokio::test]
    async fn targeted_search_propagates_errors() {
        let service = service();
        let bir = ProviderId::from(Providers::Bir);
        assert!(service.search(Some(&bir), "Storgata 1").await.is_err(), "provider error surfaces");

        let unknown = ProviderId::from("nowhere");
        assert!(
            matches!(
                service.search(Some(&unknown), "x").await,
                Err(PortError::UnknownProvider(_))
            ),
            "unknown provider"
        );
        assert!(
            matches!(
                service.schedule(&unknown, &LocationId::from("1")).await,
                Err(PortError::UnknownProvider(_))
            ),
            "unknown provider schedule"
        );
    }

    #[tokio::test]
    async fn detect_and_providers_delegate() {
        let service = service();
        assert_eq!(
            service.detect(Some("7013"), None).await,
            Some(ProviderId::from(Providers::Trv)),
            "detector used"
        );
        assert_eq!(service.providers().len(), 3, "registry used");
    }
}
