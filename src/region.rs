//! Country and region lookup.
//!
//! The first two characters of an ISRC are read as a country code, and
//! country codes are bucketed into coarse geographic regions for the
//! aggregate statistics.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Country code used when a track carries no usable ISRC.
pub const UNKNOWN_COUNTRY: &str = "XX";

// ============================================================================
// Region
// ============================================================================

/// Coarse geographic bucket. Serialized as its display label, which is what
/// downstream consumers of the dataset filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Region {
    NorthAmerica,
    Europe,
    Asia,
    LatinAmerica,
    Oceania,
    RestOfWorld,
    Unknown,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::NorthAmerica,
        Region::Europe,
        Region::Asia,
        Region::LatinAmerica,
        Region::Oceania,
        Region::RestOfWorld,
        Region::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Region::NorthAmerica => "Amérique du Nord",
            Region::Europe => "Europe",
            Region::Asia => "Asie",
            Region::LatinAmerica => "Amérique Latine/ Amérique du Sud",
            Region::Oceania => "Océanie",
            Region::RestOfWorld => "Reste du Monde",
            Region::Unknown => "Inconnu",
        }
    }

    /// Parse a display label. Anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Region {
        Region::ALL
            .into_iter()
            .find(|r| r.label() == label)
            .unwrap_or(Region::Unknown)
    }

    pub fn is_known(self) -> bool {
        self != Region::Unknown
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Region {
    fn from(s: String) -> Self {
        Region::from_label(&s)
    }
}

impl From<Region> for String {
    fn from(r: Region) -> Self {
        r.label().to_string()
    }
}

// ============================================================================
// Lookups
// ============================================================================

const NORTH_AMERICA: &[&str] = &["US", "CA", "MX"];
const EUROPE: &[&str] = &[
    "GB", "FR", "DE", "SE", "IT", "ES", "NL", "NO", "DK", "IE", "BE", "CH",
];
const ASIA: &[&str] = &["KR", "JP", "CN", "IN", "TW"];
const LATIN_AMERICA: &[&str] = &["BR", "AR", "CO", "PR", "CL"];
const OCEANIA: &[&str] = &["AU", "NZ"];

/// Map a two-letter country code to its region.
///
/// Codes that are not exactly two characters long map to `Unknown`; valid
/// codes outside the known tables (Africa, rare codes) map to `RestOfWorld`.
pub fn region_from_code(code: &str) -> Region {
    if code.chars().count() != 2 {
        return Region::Unknown;
    }
    let code = code.to_uppercase();
    let code = code.as_str();

    if NORTH_AMERICA.contains(&code) {
        Region::NorthAmerica
    } else if EUROPE.contains(&code) {
        Region::Europe
    } else if ASIA.contains(&code) {
        Region::Asia
    } else if LATIN_AMERICA.contains(&code) {
        Region::LatinAmerica
    } else if OCEANIA.contains(&code) {
        Region::Oceania
    } else {
        Region::RestOfWorld
    }
}

/// Derive (country_code, region) from an ISRC such as "USUM71204425".
///
/// The country code is the ISRC prefix as-is; only the region lookup is
/// case-insensitive.
pub fn country_from_isrc(isrc: Option<&str>) -> (String, Region) {
    match isrc {
        Some(isrc) if isrc.chars().count() >= 2 => {
            let country: String = isrc.chars().take(2).collect();
            let region = region_from_code(&country);
            (country, region)
        }
        _ => (UNKNOWN_COUNTRY.to_string(), Region::Unknown),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_code_tables() {
        assert_eq!(region_from_code("US"), Region::NorthAmerica);
        assert_eq!(region_from_code("MX"), Region::NorthAmerica);
        assert_eq!(region_from_code("GB"), Region::Europe);
        assert_eq!(region_from_code("CH"), Region::Europe);
        assert_eq!(region_from_code("KR"), Region::Asia);
        assert_eq!(region_from_code("PR"), Region::LatinAmerica);
        assert_eq!(region_from_code("NZ"), Region::Oceania);
    }

    #[test]
    fn test_region_from_code_case_insensitive() {
        assert_eq!(region_from_code("fr"), Region::Europe);
        assert_eq!(region_from_code("jP"), Region::Asia);
    }

    #[test]
    fn test_region_from_code_fallbacks() {
        assert_eq!(region_from_code("ZA"), Region::RestOfWorld);
        assert_eq!(region_from_code("QM"), Region::RestOfWorld);
        assert_eq!(region_from_code(""), Region::Unknown);
        assert_eq!(region_from_code("USA"), Region::Unknown);
        assert_eq!(region_from_code("U"), Region::Unknown);
    }

    #[test]
    fn test_country_from_isrc() {
        assert_eq!(
            country_from_isrc(Some("USUM71204425")),
            ("US".to_string(), Region::NorthAmerica)
        );
        assert_eq!(
            country_from_isrc(Some("brabc1200001")),
            ("br".to_string(), Region::LatinAmerica)
        );
        assert_eq!(
            country_from_isrc(Some("ZA")),
            ("ZA".to_string(), Region::RestOfWorld)
        );
    }

    #[test]
    fn test_country_from_isrc_missing() {
        assert_eq!(country_from_isrc(None), ("XX".to_string(), Region::Unknown));
        assert_eq!(country_from_isrc(Some("")), ("XX".to_string(), Region::Unknown));
        assert_eq!(country_from_isrc(Some("U")), ("XX".to_string(), Region::Unknown));
    }

    #[test]
    fn test_label_serde() {
        let json = serde_json::to_string(&Region::LatinAmerica).unwrap();
        assert_eq!(json, "\"Amérique Latine/ Amérique du Sud\"");

        let back: Region = serde_json::from_str("\"Océanie\"").unwrap();
        assert_eq!(back, Region::Oceania);

        let other: Region = serde_json::from_str("\"Autre\"").unwrap();
        assert_eq!(other, Region::Unknown);
    }
}
