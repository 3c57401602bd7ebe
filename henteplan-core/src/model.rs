//! Domain data structures for providers, addresses, and pickup schedules.

use std::fmt;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Current local calendar date, the lower bound of every returned schedule.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Built-in providers supported by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Providers {
    /// Trondheim Renholdsverk.
    Trv,
    /// BIR, Bergen region.
    Bir,
    /// Oslo kommune.
    Oslo,
    /// MinRenovasjon (Norkart), the catch-all municipality directory.
    Norkart,
    /// Avfall Sør, Kristiansand region.
    AvfallSor,
    /// HIM, Haugesund region.
    Him,
    /// ReMidt, Nordmøre and Romsdal.
    ReMidt,
    /// Fosen Renovasjon.
    Fosen,
    /// FREVAR, Fredrikstad.
    Frevar,
    /// IRIS Salten, Bodø region.
    Iris,
    /// Renovasjon i Drammensregionen.
    Rfd,
    /// Renovasjonen IKS, Stavanger and Sandnes.
    Renovasjonen,
    /// Innherred Renovasjon.
    Innherred,
}

impl fmt::Display for Providers {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Providers::Trv => "trv",
            Providers::Bir => "bir",
            Providers::Oslo => "oslo",
            Providers::Norkart => "norkart",
            Providers::AvfallSor => "avfallsor",
            Providers::Him => "him",
            Providers::ReMidt => "remidt",
            Providers::Fosen => "fosen",
            Providers::Frevar => "frevar",
            Providers::Iris => "iris",
            Providers::Rfd => "rfd",
            Providers::Renovasjonen => "renovasjonen",
            Providers::Innherred => "innherred",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier for a waste provider known to henteplan.
pub struct ProviderId(pub String);

impl ProviderId {
    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<Providers> for ProviderId {
    fn from(provider: Providers) -> Self {
        ProviderId(provider.to_string())
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        ProviderId(id.to_owned())
    }
}

impl PartialEq<Providers> for ProviderId {
    fn eq(&self, other: &Providers) -> bool {
        self.0 == other.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Static description of a provider, built once at startup.
pub struct ProviderMeta {
    /// Unique identifier.
    pub id: ProviderId,
    /// Display name.
    pub name: String,
    /// Public website of the provider.
    pub website: String,
    /// Municipalities or areas served.
    pub coverage_areas: Vec<String>,
    /// Inclusive postal code ranges served.
    pub postal_ranges: Vec<(u32, u32)>,
}

impl ProviderMeta {
    /// Convenience constructor taking static slices.
    #[must_use]
    pub fn new(
        id: Providers,
        name: &str,
        website: &str,
        coverage_areas: &[&str],
        postal_ranges: &[(u32, u32)],
    ) -> Self {
        Self {
            id: id.into(),
            name: name.to_owned(),
            website: website.to_owned(),
            coverage_areas: coverage_areas.iter().map(|&area| area.to_owned()).collect(),
            postal_ranges: postal_ranges.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Opaque provider-specific identifier for a pickup point.
pub struct LocationId(pub String);

impl LocationId {
    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(id: &str) -> Self {
        LocationId(id.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Address returned from a provider search.
pub struct AddressMatch {
    /// Provider that produced this match.
    pub provider: ProviderId,
    /// Human-readable label.
    pub label: String,
    /// Key handed back to the same provider when requesting schedules.
    pub location_id: LocationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Canonical waste stream used for grouping and coloring.
pub enum FractionCategory {
    /// Residual waste.
    Residual,
    /// Paper and cardboard.
    Paper,
    /// Plastic packaging.
    Plastic,
    /// Food and organic waste.
    Food,
    /// Glass and metal packaging.
    GlassMetal,
    /// Beverage cartons.
    Carton,
    /// Hazardous waste.
    Hazardous,
    /// Textiles.
    Textile,
    /// Garden waste.
    Garden,
    /// Christmas tree collection.
    ChristmasTree,
    /// Wood.
    Wood,
    /// Anything not recognized.
    Other,
}

impl FractionCategory {
    /// Every category, in display order.
    pub const ALL: [FractionCategory; 12] = [
        FractionCategory::Residual,
        FractionCategory::Paper,
        FractionCategory::Plastic,
        FractionCategory::Food,
        FractionCategory::GlassMetal,
        FractionCategory::Carton,
        FractionCategory::Hazardous,
        FractionCategory::Textile,
        FractionCategory::Garden,
        FractionCategory::ChristmasTree,
        FractionCategory::Wood,
        FractionCategory::Other,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Pickup as produced by a provider before normalization.
pub struct RawPickup {
    /// Date of the pickup.
    pub date: NaiveDate,
    /// Fraction label as given by the provider.
    pub fraction: String,
    /// Provider-local fraction identifier.
    pub fraction_id: String,
}

impl RawPickup {
    /// Construct a raw pickup.
    #[must_use]
    pub fn new<F: Into<String>, I: Into<String>>(date: NaiveDate, fraction: F, fraction_id: I) -> Self {
        Self {
            date,
            fraction: fraction.into(),
            fraction_id: fraction_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Scheduled pickup with its normalized category.
pub struct WastePickup {
    /// Date of the pickup.
    pub date: NaiveDate,
    /// Fraction label as given by the provider.
    pub fraction: String,
    /// Provider-local fraction identifier.
    pub fraction_id: String,
    /// Canonical category.
    pub category: FractionCategory,
    /// Hex display color of the category.
    pub color: String,
}
