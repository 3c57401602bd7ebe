//! Registry for all provider plugins and the uniform adapter contract.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::PickupCache;
use crate::fractions::normalize_pickups;
use crate::model::{AddressMatch, LocationId, ProviderId, ProviderMeta, WastePickup, today};
use crate::ports::{AddressPort, PortError, SchedulePort};

/// Collection of ports implementing a single provider.
pub struct ProviderPlugin {
    /// Static metadata describing the provider.
    pub meta: ProviderMeta,
    /// Implementation for searching addresses.
    pub address_port: Arc<dyn AddressPort>,
    /// Implementation for fetching raw schedules.
    pub schedule_port: Arc<dyn SchedulePort>,
}

/// Registry that resolves plugins by provider identifier.
///
/// Owns the pickup cache shared by every registered provider.
pub struct ProviderRegistry {
    plugins: Vec<ProviderPlugin>,
    index: HashMap<ProviderId, usize>,
    pickups: PickupCache,
}

impl ProviderRegistry {
    /// Build a registry from the provided plugin list, keeping its order.
    ///
    /// When two plugins share an id the first one wins.
    #[must_use]
    pub fn new(plugins: Vec<ProviderPlugin>) -> Self {
        let mut kept = Vec::with_capacity(plugins.len());
        let mut index = HashMap::with_capacity(plugins.len());
        for plugin in plugins {
            match index.entry(plugin.meta.id.clone()) {
                Entry::Occupied(_existing) => {
                    warn!(provider = %plugin.meta.id, "duplicate provider ignored");
                }
                Entry::Vacant(slot) => {
                    slot.insert(kept.len());
                    kept.push(plugin);
                }
            }
        }
        Self {
            plugins: kept,
            index,
            pickups: PickupCache::new(),
        }
    }

    /// Return metadata for all registered providers in registration order.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderMeta> {
        self.plugins.iter().map(|plugin| plugin.meta.clone()).collect()
    }

    /// Look up the adapter registered under `id`.
    #[must_use]
    pub fn lookup(&self, id: &ProviderId) -> Option<ProviderAdapter<'_>> {
        let position = *self.index.get(id)?;
        self.plugins.get(position).map(|plugin| self.adapter(plugin))
    }

    /// Look up an adapter, failing for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownProvider`] when no plugin is registered.
    pub fn provider(&self, id: &ProviderId) -> Result<ProviderAdapter<'_>, PortError> {
        self.lookup(id)
            .ok_or_else(|| PortError::UnknownProvider(id.clone()))
    }

    /// Every adapter, in registration order.
    pub fn list_all(&self) -> impl Iterator<Item = ProviderAdapter<'_>> {
        self.plugins.iter().map(|plugin| self.adapter(plugin))
    }

    fn adapter<'reg>(&'reg self, plugin: &'reg ProviderPlugin) -> ProviderAdapter<'reg> {
        ProviderAdapter {
            plugin,
            pickups: &self.pickups,
        }
    }
}

/// A registered provider together with the shared pickup cache.
///
/// This is the two-method contract every provider exposes.
#[derive(Clone, Copy)]
pub struct ProviderAdapter<'reg> {
    plugin: &'reg ProviderPlugin,
    pickups: &'reg PickupCache,
}

impl ProviderAdapter<'_> {
    /// Provider identifier.
    #[must_use]
    pub fn id(&self) -> &ProviderId {
        &self.plugin.meta.id
    }

    /// Provider metadata.
    #[must_use]
    pub fn meta(&self) -> &ProviderMeta {
        &self.plugin.meta
    }

    /// Search addresses upstream. Never cached; a blank query returns nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the upstream call fails.
    pub async fn search_address(&self, query: &str) -> Result<Vec<AddressMatch>, PortError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let matches = self.plugin.address_port.search(query).await?;
        debug!(provider = %self.id(), query, matches = matches.len(), "address search");
        Ok(matches)
    }

    /// Upcoming pickups for a location, served from cache when fresh.
    ///
    /// On a miss the provider's protocol runs, results are normalized, past
    /// dates dropped, the rest sorted by date and cached.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when any upstream step fails. Nothing is cached
    /// in that case.
    pub async fn get_pickups(&self, location_id: &LocationId) -> Result<Arc<[WastePickup]>, PortError> {
        let provider = self.id();
        if let Some(cached) = self.pickups.get(provider, location_id) {
            debug!(%provider, %location_id, "pickup cache hit");
            return Ok(cached);
        }

        debug!(%provider, %location_id, "pickup cache miss");
        let raw = self.plugin.schedule_port.fetch(location_id).await?;

        let today = today();
        let mut pickups = normalize_pickups(raw);
        pickups.retain(|pickup| pickup.date >= today);
        pickups.sort_by_key(|pickup| pickup.date);

        let pickups: Arc<[WastePickup]> = pickups.into();
        self.pickups.set(provider, location_id, Arc::clone(&pickups));
        Ok(pickups)
    }
}
