//! Assembly of every provider into one service.

use std::sync::Arc;

use henteplan_core::{
    HenteplanService, ProviderDetector, ProviderRegistry, ports::MunicipalityDirectory,
};
use henteplan_provider_avfallsor as avfallsor;
use henteplan_provider_bir as bir;
use henteplan_provider_frevar as frevar;
use henteplan_provider_him as him;
use henteplan_provider_innherred as innherred;
use henteplan_provider_iris as iris;
use henteplan_provider_norkart as norkart;
use henteplan_provider_oslo as oslo;
use henteplan_provider_renovasjonen as renovasjonen;
use henteplan_provider_renovasjonsportal as renovasjonsportal;
use henteplan_provider_rfd as rfd;
use henteplan_provider_trv as trv;
use reqwest::Client;

/// Register all providers in their fixed order and share the Norkart
/// directory between the registry and the detector.
pub(crate) fn build_service(client: &Client) -> HenteplanService {
    let directory = norkart::directory(client.clone());

    let plugins = vec![
        trv::plugin(client.clone()),
        bir::plugin(client.clone()),
        oslo::plugin(client.clone()),
        norkart::plugin(client.clone(), Arc::clone(&directory)),
        avfallsor::plugin(client.clone()),
        him::plugin(client.clone()),
        renovasjonsportal::remidt_plugin(client.clone()),
        renovasjonsportal::fosen_plugin(client.clone()),
        frevar::plugin(client.clone()),
        iris::plugin(client.clone()),
        rfd::plugin(client.clone()),
        renovasjonen::plugin(client.clone()),
        innherred::plugin(client.clone()),
    ];
    let registry = Arc::new(ProviderRegistry::new(plugins));

    let catch_all: Arc<dyn MunicipalityDirectory> = directory;
    let detector = Arc::new(ProviderDetector::with_default_rules(Some(catch_all)));

    HenteplanService::new(registry, detector)
}
