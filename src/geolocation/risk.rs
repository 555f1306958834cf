//! Static high-risk country table.
//!
//! A read-only, process-lifetime map of risk-tagged country codes. Queried
//! by reporting layers and the geo-threat detector; never derived from
//! observed traffic.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Risk annotation for a country code.
#[derive(Debug, Clone)]
pub struct CountryRisk {
    pub country_name: &'static str,
    pub reason: &'static str,
    pub known_threats: &'static [&'static str],
}

static HIGH_RISK_COUNTRIES: Lazy<HashMap<&'static str, CountryRisk>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(
        "KP",
        CountryRisk {
            country_name: "North Korea",
            reason: "State-sponsored APT activity and financial theft campaigns",
            known_threats: &["Lazarus Group", "APT38", "Kimsuky"],
        },
    );
    table.insert(
        "RU",
        CountryRisk {
            country_name: "Russia",
            reason: "State-sponsored intrusion sets and ransomware ecosystems",
            known_threats: &["APT28", "APT29", "Sandworm", "Conti"],
        },
    );
    table.insert(
        "CN",
        CountryRisk {
            country_name: "China",
            reason: "State-sponsored espionage and intellectual property theft",
            known_threats: &["APT1", "APT41", "Volt Typhoon"],
        },
    );
    table.insert(
        "IR",
        CountryRisk {
            country_name: "Iran",
            reason: "State-sponsored disruption and credential-harvesting campaigns",
            known_threats: &["APT33", "APT35", "MuddyWater"],
        },
    );
    table.insert(
        "SY",
        CountryRisk {
            country_name: "Syria",
            reason: "Regional hacktivist and surveillance operations",
            known_threats: &["Syrian Electronic Army"],
        },
    );
    table.insert(
        "BY",
        CountryRisk {
            country_name: "Belarus",
            reason: "State-aligned espionage against neighboring states",
            known_threats: &["Ghostwriter"],
        },
    );
    table.insert(
        "VE",
        CountryRisk {
            country_name: "Venezuela",
            reason: "Bulletproof hosting and fraud infrastructure",
            known_threats: &["Machete"],
        },
    );
    table
});

/// Whether a country code appears in the static risk table.
pub fn is_high_risk(country_code: &str) -> bool {
    HIGH_RISK_COUNTRIES.contains_key(country_code)
}

/// Risk annotation for a country code, if tagged.
pub fn risk_info(country_code: &str) -> Option<&'static CountryRisk> {
    HIGH_RISK_COUNTRIES.get(country_code)
}

/// All risk-tagged country codes.
pub fn high_risk_codes() -> impl Iterator<Item = &'static str> {
    HIGH_RISK_COUNTRIES.keys().copied()
}
