use std::sync::Arc;

use henteplan_core::{
    model::{AddressMatch, ProviderId, ProviderMeta, WastePickup},
    service::HenteplanService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    ProviderSelect,
    AddressSearch,
    ScheduleView,
}

/// Split free text into a postal code or a city name for detection.
pub(crate) fn detect_query(input: &str) -> (Option<String>, Option<String>) {
    let text = input.trim();
    if text.is_empty() {
        (None, None)
    } else if text.chars().all(|ch| ch.is_ascii_digit()) {
        (Some(text.to_owned()), None)
    } else {
        (None, Some(text.to_owned()))
    }
}

pub(crate) struct App {
    pub service: Arc<HenteplanService>,

    pub screen: Screen,
    pub providers: Vec<ProviderMeta>,
    /// Row in the provider list; row 0 is "all providers".
    pub provider_list_index: usize,
    pub selected_provider: Option<ProviderId>,
    /// Postal code or city typed for auto-detection.
    pub detect_input: String,
    pub detect_editing: bool,

    pub address_input: String,
    pub address_results: Vec<AddressMatch>,
    pub address_list_index: usize,
    pub selected_address: Option<AddressMatch>,

    pub pickups: Arc<[WastePickup]>,

    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(service: Arc<HenteplanService>) -> Self {
        let providers = service.providers();
        Self {
            service,
            screen: Screen::ProviderSelect,
            providers,
            provider_list_index: 0,
            selected_provider: None,
            detect_input: String::new(),
            detect_editing: false,
            address_input: String::new(),
            address_results: Vec::new(),
            address_list_index: 0,
            selected_address: None,
            pickups: Arc::from([]),
            is_loading: false,
            error_message: None,
        }
    }

    /// Number of rows in the provider list, including "all providers".
    pub(crate) fn provider_rows(&self) -> usize {
        self.providers.len() + 1
    }

    /// Display name of the search scope.
    pub(crate) fn scope_name(&self) -> &str {
        self.selected_provider
            .as_ref()
            .and_then(|id| self.providers.iter().find(|meta| &meta.id == id))
            .map_or("alle leverandører", |meta| meta.name.as_str())
    }

    pub(crate) fn select_current_provider(&mut self) {
        self.selected_provider = self
            .provider_list_index
            .checked_sub(1)
            .and_then(|index| self.providers.get(index))
            .map(|meta| meta.id.clone());
        self.address_results.clear();
        self.address_list_index = 0;
        self.screen = Screen::AddressSearch;
    }

    /// Jump to a detected provider and continue to the address search.
    pub(crate) fn select_detected_provider(&mut self, id: &ProviderId) {
        if let Some(position) = self.providers.iter().position(|meta| &meta.id == id) {
            self.provider_list_index = position + 1;
        }
        self.detect_editing = false;
        self.select_current_provider();
    }

    pub(crate) fn select_current_address(&mut self) -> Option<AddressMatch> {
        let addr = self.address_results.get(self.address_list_index).cloned()?;
        self.selected_address = Some(addr.clone());
        self.screen = Screen::ScheduleView;
        Some(addr)
    }
}
