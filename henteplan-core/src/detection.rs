//! Maps a postal code and/or city name to the provider serving it.

use std::sync::Arc;

use tracing::debug;

use crate::model::{ProviderId, Providers};
use crate::ports::MunicipalityDirectory;

/// One entry of the ordered detection table.
#[derive(Debug, Clone, Copy)]
pub struct DetectionRule {
    /// Provider selected when the rule matches.
    pub provider: Providers,
    /// Lower-case substrings matched against the city.
    pub cities: &'static [&'static str],
    /// Inclusive postal code ranges.
    pub postal_ranges: &'static [(u32, u32)],
}

impl DetectionRule {
    fn matches(&self, city: &str, postal: Option<u32>) -> bool {
        let city_match = self.cities.iter().any(|needle| city.contains(needle));
        let postal_match = postal.is_some_and(|code| {
            self.postal_ranges
                .iter()
                .any(|&(min, max)| (min..=max).contains(&code))
        });
        city_match || postal_match
    }
}

/// Built-in rules, evaluated first to last.
pub const DEFAULT_RULES: &[DetectionRule] = &[
    DetectionRule {
        provider: Providers::Trv,
        cities: &["trondheim"],
        postal_ranges: &[(7000, 7099)],
    },
    DetectionRule {
        provider: Providers::Bir,
        cities: &[
            "bergen",
            "askoy",
            "askøy",
            "bjornafjorden",
            "bjørnafjorden",
            "eidfjord",
            "kvam",
            "osteroy",
            "osterøy",
            "samnanger",
            "ulvik",
            "vaksdal",
            "voss",
        ],
        postal_ranges: &[(5003, 5499), (5600, 5660), (5700, 5786)],
    },
    DetectionRule {
        provider: Providers::Oslo,
        cities: &["oslo"],
        postal_ranges: &[(1, 1299)],
    },
    DetectionRule {
        provider: Providers::AvfallSor,
        cities: &["kristiansand"],
        postal_ranges: &[(4600, 4699)],
    },
    DetectionRule {
        provider: Providers::Him,
        cities: &[
            "haugesund",
            "karmoy",
            "karmøy",
            "tysvaer",
            "tysvær",
            "bokn",
            "vindafjord",
            "etne",
        ],
        postal_ranges: &[(5500, 5599)],
    },
    DetectionRule {
        provider: Providers::ReMidt,
        cities: &[
            "kristiansund",
            "molde",
            "orkland",
            "sunndal",
            "surnadal",
            "oppdal",
            "smola",
            "smøla",
        ],
        postal_ranges: &[(6400, 6499), (6500, 6549)],
    },
    DetectionRule {
        provider: Providers::Frevar,
        cities: &["fredrikstad"],
        postal_ranges: &[(1601, 1639)],
    },
    DetectionRule {
        provider: Providers::Iris,
        cities: &[
            "bodo",
            "bodø",
            "fauske",
            "saltdal",
            "sorfold",
            "sørfold",
            "steigen",
            "gildeskal",
            "gildeskål",
            "meloy",
            "meløy",
            "beiarn",
        ],
        postal_ranges: &[(8000, 8099)],
    },
    DetectionRule {
        provider: Providers::Rfd,
        cities: &["drammen", "lier", "øvre eiker", "ovre eiker", "modum"],
        postal_ranges: &[(3000, 3099)],
    },
    DetectionRule {
        provider: Providers::Renovasjonen,
        cities: &["stavanger", "sandnes"],
        postal_ranges: &[(4000, 4099), (4300, 4399)],
    },
    DetectionRule {
        provider: Providers::Innherred,
        cities: &["levanger", "verdal", "inderoy", "inderøy", "snasa", "snåsa"],
        postal_ranges: &[(7600, 7699)],
    },
    DetectionRule {
        provider: Providers::Fosen,
        cities: &["indre fosen", "ørland", "orland", "åfjord", "afjord"],
        postal_ranges: &[(7100, 7180)],
    },
];

/// Detection engine: ordered rules first, then the catch-all directory.
pub struct ProviderDetector {
    rules: Vec<DetectionRule>,
    directory: Option<Arc<dyn MunicipalityDirectory>>,
}

impl ProviderDetector {
    /// Build a detector over `rules`, optionally backed by a directory.
    #[must_use]
    pub fn new(rules: &[DetectionRule], directory: Option<Arc<dyn MunicipalityDirectory>>) -> Self {
        Self {
            rules: rules.to_vec(),
            directory,
        }
    }

    /// Detector over [`DEFAULT_RULES`].
    #[must_use]
    pub fn with_default_rules(directory: Option<Arc<dyn MunicipalityDirectory>>) -> Self {
        Self::new(DEFAULT_RULES, directory)
    }

    /// Pick the provider for a postal code and/or city, first match wins.
    ///
    /// Directory failures are logged and treated as no match.
    pub async fn detect(&self, postal_code: Option<&str>, city: Option<&str>) -> Option<ProviderId> {
        let city = city.map(str::to_lowercase).unwrap_or_default();
        let postal = postal_code.and_then(|code| code.trim().parse::<u32>().ok());

        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(&city, postal)) {
            debug!(provider = %rule.provider, ?postal, %city, "detected by rule");
            return Some(rule.provider.into());
        }

        if city.is_empty() {
            return None;
        }
        let directory = self.directory.as_ref()?;
        match directory.municipalities().await {
            Ok(names) if names.iter().any(|name| *name == city) => {
                debug!(provider = %directory.provider(), %city, "detected by directory");
                Some(directory.provider().clone())
            }
            Ok(_) => None,
            Err(err) => {
                debug!(error = %err, "municipality directory unavailable");
                None
            }
        }
    }
}
