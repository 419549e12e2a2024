//! Timezone name validation and alias resolution.
//!
//! Wraps the IANA database shipped with `chrono-tz` and layers the
//! human-friendly lookups on top: country names, three-letter
//! abbreviations, flag emoji and international phone-code prefixes.

use std::collections::HashMap;
use std::str::FromStr;

use chrono_tz::{Tz, TZ_VARIANTS};
use once_cell::sync::Lazy;

/// Country entries: full name, ISO 3166-1 alpha-2 code, representative zone.
///
/// Countries spanning several zones map to the zone of the capital or the
/// most populous city.
const COUNTRIES: &[(&str, &str, &str)] = &[
    ("afghanistan", "AF", "Asia/Kabul"),
    ("argentina", "AR", "America/Argentina/Buenos_Aires"),
    ("australia", "AU", "Australia/Sydney"),
    ("austria", "AT", "Europe/Vienna"),
    ("bangladesh", "BD", "Asia/Dhaka"),
    ("belgium", "BE", "Europe/Brussels"),
    ("bolivia", "BO", "America/La_Paz"),
    ("brazil", "BR", "America/Sao_Paulo"),
    ("canada", "CA", "America/Toronto"),
    ("chile", "CL", "America/Santiago"),
    ("china", "CN", "Asia/Shanghai"),
    ("colombia", "CO", "America/Bogota"),
    ("croatia", "HR", "Europe/Zagreb"),
    ("czech republic", "CZ", "Europe/Prague"),
    ("czechia", "CZ", "Europe/Prague"),
    ("denmark", "DK", "Europe/Copenhagen"),
    ("ecuador", "EC", "America/Guayaquil"),
    ("egypt", "EG", "Africa/Cairo"),
    ("finland", "FI", "Europe/Helsinki"),
    ("france", "FR", "Europe/Paris"),
    ("germany", "DE", "Europe/Berlin"),
    ("greece", "GR", "Europe/Athens"),
    ("hungary", "HU", "Europe/Budapest"),
    ("iceland", "IS", "Atlantic/Reykjavik"),
    ("india", "IN", "Asia/Kolkata"),
    ("indonesia", "ID", "Asia/Jakarta"),
    ("iran", "IR", "Asia/Tehran"),
    ("iraq", "IQ", "Asia/Baghdad"),
    ("ireland", "IE", "Europe/Dublin"),
    ("israel", "IL", "Asia/Jerusalem"),
    ("italy", "IT", "Europe/Rome"),
    ("japan", "JP", "Asia/Tokyo"),
    ("kenya", "KE", "Africa/Nairobi"),
    ("malaysia", "MY", "Asia/Kuala_Lumpur"),
    ("mexico", "MX", "America/Mexico_City"),
    ("morocco", "MA", "Africa/Casablanca"),
    ("netherlands", "NL", "Europe/Amsterdam"),
    ("new zealand", "NZ", "Pacific/Auckland"),
    ("nigeria", "NG", "Africa/Lagos"),
    ("norway", "NO", "Europe/Oslo"),
    ("pakistan", "PK", "Asia/Karachi"),
    ("peru", "PE", "America/Lima"),
    ("philippines", "PH", "Asia/Manila"),
    ("poland", "PL", "Europe/Warsaw"),
    ("portugal", "PT", "Europe/Lisbon"),
    ("romania", "RO", "Europe/Bucharest"),
    ("russia", "RU", "Europe/Moscow"),
    ("saudi arabia", "SA", "Asia/Riyadh"),
    ("singapore", "SG", "Asia/Singapore"),
    ("south africa", "ZA", "Africa/Johannesburg"),
    ("south korea", "KR", "Asia/Seoul"),
    ("spain", "ES", "Europe/Madrid"),
    ("sweden", "SE", "Europe/Stockholm"),
    ("switzerland", "CH", "Europe/Zurich"),
    ("taiwan", "TW", "Asia/Taipei"),
    ("thailand", "TH", "Asia/Bangkok"),
    ("turkey", "TR", "Europe/Istanbul"),
    ("ukraine", "UA", "Europe/Kyiv"),
    ("united arab emirates", "AE", "Asia/Dubai"),
    ("united kingdom", "GB", "Europe/London"),
    ("uk", "GB", "Europe/London"),
    ("united states", "US", "America/New_York"),
    ("usa", "US", "America/New_York"),
    ("uruguay", "UY", "America/Montevideo"),
    ("venezuela", "VE", "America/Caracas"),
    ("vietnam", "VN", "Asia/Ho_Chi_Minh"),
];

/// Common zone abbreviations. Ambiguous codes (CST, IST) resolve to the
/// reading most users mean; the table is deterministic either way.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("utc", "UTC"),
    ("gmt", "Etc/GMT"),
    ("est", "America/New_York"),
    ("edt", "America/New_York"),
    ("cst", "America/Chicago"),
    ("cdt", "America/Chicago"),
    ("mst", "America/Denver"),
    ("mdt", "America/Denver"),
    ("pst", "America/Los_Angeles"),
    ("pdt", "America/Los_Angeles"),
    ("akst", "America/Anchorage"),
    ("hst", "Pacific/Honolulu"),
    ("ast", "America/Halifax"),
    ("bst", "Europe/London"),
    ("wet", "Europe/Lisbon"),
    ("cet", "Europe/Paris"),
    ("cest", "Europe/Paris"),
    ("eet", "Europe/Helsinki"),
    ("eest", "Europe/Helsinki"),
    ("msk", "Europe/Moscow"),
    ("ist", "Asia/Kolkata"),
    ("pkt", "Asia/Karachi"),
    ("wib", "Asia/Jakarta"),
    ("sgt", "Asia/Singapore"),
    ("hkt", "Asia/Hong_Kong"),
    ("jst", "Asia/Tokyo"),
    ("kst", "Asia/Seoul"),
    ("awst", "Australia/Perth"),
    ("acst", "Australia/Adelaide"),
    ("aest", "Australia/Sydney"),
    ("aedt", "Australia/Sydney"),
    ("nzst", "Pacific/Auckland"),
    ("nzdt", "Pacific/Auckland"),
];

/// International dialing codes, longest prefix wins (`+1` vs `+1868` is not
/// disambiguated here; only unambiguous country codes are listed).
const PHONE_CODES: &[(&str, &str)] = &[
    ("1", "America/New_York"),
    ("7", "Europe/Moscow"),
    ("20", "Africa/Cairo"),
    ("27", "Africa/Johannesburg"),
    ("30", "Europe/Athens"),
    ("31", "Europe/Amsterdam"),
    ("32", "Europe/Brussels"),
    ("33", "Europe/Paris"),
    ("34", "Europe/Madrid"),
    ("39", "Europe/Rome"),
    ("40", "Europe/Bucharest"),
    ("41", "Europe/Zurich"),
    ("43", "Europe/Vienna"),
    ("44", "Europe/London"),
    ("45", "Europe/Copenhagen"),
    ("46", "Europe/Stockholm"),
    ("47", "Europe/Oslo"),
    ("48", "Europe/Warsaw"),
    ("49", "Europe/Berlin"),
    ("51", "America/Lima"),
    ("52", "America/Mexico_City"),
    ("54", "America/Argentina/Buenos_Aires"),
    ("55", "America/Sao_Paulo"),
    ("56", "America/Santiago"),
    ("57", "America/Bogota"),
    ("58", "America/Caracas"),
    ("60", "Asia/Kuala_Lumpur"),
    ("61", "Australia/Sydney"),
    ("62", "Asia/Jakarta"),
    ("63", "Asia/Manila"),
    ("64", "Pacific/Auckland"),
    ("65", "Asia/Singapore"),
    ("66", "Asia/Bangkok"),
    ("81", "Asia/Tokyo"),
    ("82", "Asia/Seoul"),
    ("84", "Asia/Ho_Chi_Minh"),
    ("86", "Asia/Shanghai"),
    ("90", "Europe/Istanbul"),
    ("91", "Asia/Kolkata"),
    ("92", "Asia/Karachi"),
    ("98", "Asia/Tehran"),
    ("212", "Africa/Casablanca"),
    ("234", "Africa/Lagos"),
    ("254", "Africa/Nairobi"),
    ("351", "Europe/Lisbon"),
    ("353", "Europe/Dublin"),
    ("354", "Atlantic/Reykjavik"),
    ("358", "Europe/Helsinki"),
    ("380", "Europe/Kyiv"),
    ("385", "Europe/Zagreb"),
    ("420", "Europe/Prague"),
    ("591", "America/La_Paz"),
    ("593", "America/Guayaquil"),
    ("598", "America/Montevideo"),
    ("852", "Asia/Hong_Kong"),
    ("880", "Asia/Dhaka"),
    ("886", "Asia/Taipei"),
    ("93", "Asia/Kabul"),
    ("964", "Asia/Baghdad"),
    ("966", "Asia/Riyadh"),
    ("971", "Asia/Dubai"),
    ("972", "Asia/Jerusalem"),
];

static COUNTRY_BY_NAME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    COUNTRIES
        .iter()
        .map(|&(name, _, zone)| (name, zone))
        .collect()
});

static COUNTRY_BY_ISO: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    COUNTRIES
        .iter()
        .map(|&(_, iso, zone)| (iso, zone))
        .collect()
});

static ABBREVIATION_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| ABBREVIATIONS.iter().copied().collect());

/// Lowercased IANA name -> canonical `Tz`, for case-insensitive validation.
static CANONICAL_BY_LOWER: Lazy<HashMap<String, Tz>> = Lazy::new(|| {
    TZ_VARIANTS
        .iter()
        .map(|tz| (tz.name().to_lowercase(), *tz))
        .collect()
});

/// Validates a timezone name against the canonical IANA set.
///
/// Accepts any casing (`america/la_paz`) but always returns the canonical
/// spelling.
pub fn validate(name: &str) -> Option<Tz> {
    if let Ok(tz) = Tz::from_str(name) {
        return Some(tz);
    }
    CANONICAL_BY_LOWER.get(&name.trim().to_lowercase()).copied()
}

/// Resolves a human-friendly alias to an IANA timezone.
///
/// Tried in order: exact IANA name, country name, three-letter
/// abbreviation, flag emoji, phone-code prefix.
pub fn resolve_alias(input: &str) -> Option<Tz> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(tz) = validate(trimmed) {
        return Some(tz);
    }
    let lower = trimmed.to_lowercase();
    if let Some(zone) = COUNTRY_BY_NAME.get(lower.as_str()) {
        return Tz::from_str(zone).ok();
    }
    if let Some(zone) = ABBREVIATION_MAP.get(lower.as_str()) {
        return Tz::from_str(zone).ok();
    }
    if let Some(iso) = flag_to_iso(trimmed) {
        if let Some(zone) = COUNTRY_BY_ISO.get(iso.as_str()) {
            return Tz::from_str(zone).ok();
        }
    }
    if let Some(digits) = trimmed.strip_prefix('+') {
        let digits: String = digits.chars().filter(|c| c.is_ascii_digit()).collect();
        return phone_code_lookup(&digits);
    }
    None
}

/// Decodes a regional-indicator pair (🇧🇴) into an ISO 3166-1 alpha-2 code.
fn flag_to_iso(input: &str) -> Option<String> {
    const RI_BASE: u32 = 0x1F1E6;
    let mut letters = String::with_capacity(2);
    for ch in input.chars() {
        let code = ch as u32;
        if !(RI_BASE..=RI_BASE + 25).contains(&code) {
            return None;
        }
        letters.push(char::from(b'A' + (code - RI_BASE) as u8));
    }
    if letters.len() == 2 {
        Some(letters)
    } else {
        None
    }
}

/// Longest-prefix match against the dialing-code table.
fn phone_code_lookup(digits: &str) -> Option<Tz> {
    if digits.is_empty() {
        return None;
    }
    let best = PHONE_CODES
        .iter()
        .filter(|(code, _)| digits.starts_with(code))
        .max_by_key(|(code, _)| code.len())?;
    Tz::from_str(best.1).ok()
}

/// Case-insensitive substring search over IANA names, sorted, capped at
/// `limit`.
pub fn search(query: &str, limit: usize) -> Vec<&'static str> {
    let needle = query.trim().to_lowercase();
    let mut hits: Vec<&'static str> = TZ_VARIANTS
        .iter()
        .map(|tz| tz.name())
        .filter(|name| name.to_lowercase().contains(&needle))
        .collect();
    hits.sort_unstable();
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_canonical_and_case_insensitive() {
        assert_eq!(validate("America/La_Paz"), Some(Tz::America__La_Paz));
        assert_eq!(validate("america/la_paz"), Some(Tz::America__La_Paz));
        assert_eq!(validate("EUROPE/BERLIN"), Some(Tz::Europe__Berlin));
        assert!(validate("America/Nowhere").is_none());
        assert!(validate("").is_none());
    }

    #[test]
    fn test_country_names() {
        assert_eq!(resolve_alias("bolivia"), Some(Tz::America__La_Paz));
        assert_eq!(resolve_alias("Bolivia"), Some(Tz::America__La_Paz));
        assert_eq!(resolve_alias("japan"), Some(Tz::Asia__Tokyo));
        assert_eq!(
            resolve_alias("united kingdom"),
            Some(Tz::Europe__London)
        );
        assert!(resolve_alias("atlantis").is_none());
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(resolve_alias("EST"), Some(Tz::America__New_York));
        assert_eq!(resolve_alias("pst"), Some(Tz::America__Los_Angeles));
        assert_eq!(resolve_alias("IST"), Some(Tz::Asia__Kolkata));
        assert_eq!(resolve_alias("JST"), Some(Tz::Asia__Tokyo));
        assert_eq!(resolve_alias("UTC"), Some(Tz::UTC));
    }

    #[test]
    fn test_flag_emoji() {
        assert_eq!(resolve_alias("🇧🇴"), Some(Tz::America__La_Paz));
        assert_eq!(resolve_alias("🇯🇵"), Some(Tz::Asia__Tokyo));
        assert_eq!(resolve_alias("🇩🇪"), Some(Tz::Europe__Berlin));
        // Unknown country code with no table entry
        assert!(resolve_alias("🇦🇶").is_none());
    }

    #[test]
    fn test_phone_codes() {
        assert_eq!(resolve_alias("+591"), Some(Tz::America__La_Paz));
        assert_eq!(resolve_alias("+49"), Some(Tz::Europe__Berlin));
        assert_eq!(resolve_alias("+1"), Some(Tz::America__New_York));
        // Longest prefix wins over +35... ambiguity
        assert_eq!(resolve_alias("+351"), Some(Tz::Europe__Lisbon));
        assert!(resolve_alias("+999999").is_none());
        assert!(resolve_alias("+").is_none());
    }

    #[test]
    fn test_exact_iana_passthrough() {
        assert_eq!(resolve_alias("Asia/Kolkata"), Some(Tz::Asia__Kolkata));
        assert_eq!(resolve_alias(" Europe/Paris "), Some(Tz::Europe__Paris));
    }

    #[test]
    fn test_search() {
        let hits = search("la_paz", 10);
        assert_eq!(hits, vec!["America/La_Paz"]);

        let hits = search("kolkata", 10);
        assert!(hits.contains(&"Asia/Kolkata"));

        let hits = search("america", 5);
        assert_eq!(hits.len(), 5);
        let mut sorted = hits.clone();
        sorted.sort_unstable();
        assert_eq!(hits, sorted);

        assert!(search("zzzz-not-a-zone", 10).is_empty());
    }
}
