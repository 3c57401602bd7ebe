//! Mapping of free-text fraction labels onto canonical categories.

use std::ops::Range;

use crate::model::{FractionCategory, RawPickup, WastePickup};

impl FractionCategory {
    /// Hex display color.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            FractionCategory::Residual => "#71717a",
            FractionCategory::Paper => "#3b82f6",
            FractionCategory::Plastic => "#f59e0b",
            FractionCategory::Food => "#10b981",
            FractionCategory::GlassMetal => "#0d9488",
            FractionCategory::Carton => "#fb923c",
            FractionCategory::Hazardous => "#dc2626",
            FractionCategory::Textile => "#a855f7",
            FractionCategory::Garden => "#84cc16",
            FractionCategory::ChristmasTree => "#15803d",
            FractionCategory::Wood => "#65a30d",
            FractionCategory::Other => "#a1a1aa",
        }
    }

    /// Norwegian display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            FractionCategory::Residual => "Restavfall",
            FractionCategory::Paper => "Papir",
            FractionCategory::Plastic => "Plast",
            FractionCategory::Food => "Matavfall",
            FractionCategory::GlassMetal => "Glass og metall",
            FractionCategory::Carton => "Drikkekartonger",
            FractionCategory::Hazardous => "Farlig avfall",
            FractionCategory::Textile => "Tekstil",
            FractionCategory::Garden => "Hageavfall",
            FractionCategory::ChristmasTree => "Juletre",
            FractionCategory::Wood => "Trevirke",
            FractionCategory::Other => "Annet",
        }
    }

    /// Color as an `(r, g, b)` triple.
    #[must_use]
    pub fn rgb(self) -> (u8, u8, u8) {
        let hex = self.color().trim_start_matches('#');
        let channel = |range: Range<usize>| {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .unwrap_or_default()
        };
        (channel(0..2), channel(2..4), channel(4..6))
    }
}

/// Map a provider label to its category. Unknown labels become
/// [`FractionCategory::Other`].
#[must_use]
pub fn normalize_category(label: &str) -> FractionCategory {
    match label.to_lowercase().as_str() {
        "restavfall" | "rest" | "mat-, plast- og restavfall" => FractionCategory::Residual,

        "papir" | "papp og papir" | "papp- og papiravfall" | "papir og plast" | "papp/papir"
        | "papiravfall" => FractionCategory::Paper,

        "plastemballasje" | "plast" => FractionCategory::Plastic,

        "matavfall" | "bioavfall" | "mat" => FractionCategory::Food,

        "glass og metallemballasje"
        | "glass- og metallemballasje"
        | "glass og metall"
        | "glass/metallemballasje" => FractionCategory::GlassMetal,

        "drikkekartonger" => FractionCategory::Carton,
        "farlig avfall" => FractionCategory::Hazardous,
        "tekstiler" | "tekstil" => FractionCategory::Textile,
        "hageavfall" => FractionCategory::Garden,
        "juletre" => FractionCategory::ChristmasTree,
        "trevirke" => FractionCategory::Wood,

        _ => FractionCategory::Other,
    }
}

/// Attach category and color to each raw pickup, keeping order and length.
#[must_use]
pub fn normalize_pickups(raw: Vec<RawPickup>) -> Vec<WastePickup> {
    raw.into_iter()
        .map(|pickup| {
            let category = normalize_category(&pickup.fraction);
            WastePickup {
                date: pickup.date,
                fraction: pickup.fraction,
                fraction_id: pickup.fraction_id,
                category,
                color: category.color().to_owned(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    #[test]
    fn maps_known_fractions() {
        let cases = [
            ("restavfall", FractionCategory::Residual),
            ("papir", FractionCategory::Paper),
            ("plastemballasje", FractionCategory::Plastic),
            ("matavfall", FractionCategory::Food),
            ("glass og metallemballasje", FractionCategory::GlassMetal),
            ("drikkekartonger", FractionCategory::Carton),
            ("farlig avfall", FractionCategory::Hazardous),
            ("tekstiler", FractionCategory::Textile),
            ("hageavfall", FractionCategory::Garden),
            ("juletre", FractionCategory::ChristmasTree),
            ("trevirke", FractionCategory::Wood),
        ];
        for (label, expected) in cases {
            assert_eq!(normalize_category(label), expected, "label {label}");
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(normalize_category("Restavfall"), FractionCategory::Residual, "title case");
        assert_eq!(normalize_category("PAPIR"), FractionCategory::Paper, "upper case");
        assert_eq!(
            normalize_category("Glass Og Metallemballasje"),
            FractionCategory::GlassMetal,
            "mixed case"
        );
        assert_eq!(normalize_category("FARLIG AVFALL"), FractionCategory::Hazardous, "upper case with space");
    }

    #[test]
    fn handles_alternate_spellings() {
        assert_eq!(normalize_category("rest"), FractionCategory::Residual, "rest");
        assert_eq!(normalize_category("papp og papir"), FractionCategory::Paper, "papp og papir");
        assert_eq!(normalize_category("bioavfall"), FractionCategory::Food, "bioavfall");
        assert_eq!(
            normalize_category("glass- og metallemballasje"),
            FractionCategory::GlassMetal,
            "hyphenated glass"
        );
        assert_eq!(normalize_category("tekstil"), FractionCategory::Textile, "tekstil");
        assert_eq!(normalize_category("mat"), FractionCategory::Food, "mat");
    }

    #[test]
    fn unknown_labels_fall_back_to_other() {
        for label in ["ukjent", "", "something random", "Fraksjon 99", "   "] {
            assert_eq!(normalize_category(label), FractionCategory::Other, "label {label:?}");
        }
    }

    #[test]
    fn normalize_pickups_preserves_entries() {
        let raw = vec![
            RawPickup::new(date(6), "Papir", "2"),
            RawPickup::new(date(5), "Restavfall", "1"),
            RawPickup::new(date(7), "Spesialavfall", "99"),
        ];
        let result = normalize_pickups(raw.clone());

        assert_eq!(result.len(), raw.len(), "length preserved");
        for (normalized, original) in result.iter().zip(&raw) {
            assert_eq!(normalized.date, original.date, "date preserved");
            assert_eq!(normalized.fraction, original.fraction, "fraction preserved");
            assert_eq!(normalized.fraction_id, original.fraction_id, "id preserved");
            assert_eq!(normalized.color, normalized.category.color(), "color follows category");
        }
        let categories: Vec<_> = result.iter().map(|pickup| pickup.category).collect();
        assert_eq!(
            categories,
            [FractionCategory::Paper, FractionCategory::Residual, FractionCategory::Other],
            "order preserved"
        );
    }

    #[test]
    fn normalize_pickups_handles_empty_input() {
        assert!(normalize_pickups(Vec::new()).is_empty(), "empty in, empty out");
    }

    #[test]
    fn every_category_has_a_hex_color() {
        for category in FractionCategory::ALL {
            let color = category.color();
            assert_eq!(color.len(), 7, "{category:?} color length");
            assert!(color.starts_with('#'), "{category:?} color prefix");
            assert!(
                color.chars().skip(1).all(|ch| ch.is_ascii_hexdigit()),
                "{category:?} color digits"
            );
        }
    }

    #[test]
    fn rgb_decodes_hex() {
        assert_eq!(FractionCategory::Paper.rgb(), (0x3b, 0x82, 0xf6), "paper blue");
    }

    #[test]
    fn category_serializes_as_snake_case() {
        let json = serde_json::to_string(&FractionCategory::GlassMetal).expect("serialize");
        assert_eq!(json, "\"glass_metal\"", "wire name");
    }
}
