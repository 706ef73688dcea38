//! Country-code normalization and location-string cleanup.
//!
//! Itinerary rows and extraction output arrive with a mix of ISO 3166-1
//! alpha-2 codes, legacy codes ("UK"), and full country names in several
//! languages. Everything is normalized to alpha-2 before comparison so that
//! gap classification is stable. Normalization is idempotent: a code that is
//! already alpha-2 passes through unchanged.

/// Map a common alias or country name to its ISO 3166-1 alpha-2 code.
///
/// Input must already be trimmed and uppercased.
fn alias_to_alpha2(name: &str) -> Option<&'static str> {
    let code = match name {
        "UK" | "UNITED KINGDOM" | "BRITAIN" | "ENGLAND" | "SCOTLAND" | "WALES" => "GB",
        "USA" | "UNITED STATES" | "AMERICA" => "US",
        "DEUTSCHLAND" | "ALLEMAGNE" | "GERMANY" => "DE",
        "FRANCE" => "FR",
        "ESPANA" | "SPAIN" => "ES",
        "ITALIA" | "ITALY" => "IT",
        "NEDERLAND" | "HOLLAND" | "NETHERLANDS" => "NL",
        "BELGIE" | "BELGIUM" => "BE",
        "SCHWEIZ" | "SUISSE" | "SVIZZERA" | "SWITZERLAND" => "CH",
        "OSTERREICH" | "AUSTRIA" => "AT",
        "DANMARK" | "DENMARK" => "DK",
        "SVERIGE" | "SWEDEN" => "SE",
        "NORGE" | "NORWAY" => "NO",
        "SUOMI" | "FINLAND" => "FI",
        "ICELAND" => "IS",
        "EIRE" | "IRELAND" => "IE",
        "POLSKA" | "POLAND" => "PL",
        "CESKA REPUBLIKA" | "CZECH REPUBLIC" | "CZECHIA" => "CZ",
        "MAGYARORSZAG" | "HUNGARY" => "HU",
        "SLOVENSKO" | "SLOVAKIA" => "SK",
        "SLOVENIJA" | "SLOVENIA" => "SI",
        "HRVATSKA" | "CROATIA" => "HR",
        "SRBIJA" | "SERBIA" => "RS",
        "MONTENEGRO" => "ME",
        "BULGARIA" => "BG",
        "ROMANIA" => "RO",
        "ELLADA" | "GREECE" => "GR",
        "TURKIYE" | "TURKEY" => "TR",
        "RUSSIA" => "RU",
        "UKRAINE" => "UA",
        "LITHUANIA" => "LT",
        "LATVIA" => "LV",
        "ESTONIA" => "EE",
        "PORTUGAL" => "PT",
        "LUXEMBOURG" => "LU",
        "MALTA" => "MT",
        "CYPRUS" => "CY",
        "JAPAN" | "NIPPON" => "JP",
        "KOREA" | "SOUTH KOREA" => "KR",
        "CHINA" => "CN",
        "TAIWAN" => "TW",
        "HONG KONG" => "HK",
        "MACAU" => "MO",
        "INDIA" => "IN",
        "SRI LANKA" => "LK",
        "MALDIVES" => "MV",
        "NEPAL" => "NP",
        "THAILAND" => "TH",
        "MALAYSIA" => "MY",
        "SINGAPORE" => "SG",
        "INDONESIA" => "ID",
        "PHILIPPINES" => "PH",
        "VIETNAM" => "VN",
        "CAMBODIA" => "KH",
        "LAOS" => "LA",
        "MYANMAR" | "BURMA" => "MM",
        "BRUNEI" => "BN",
        "ISRAEL" => "IL",
        "SAUDI ARABIA" => "SA",
        "UAE" | "UNITED ARAB EMIRATES" => "AE",
        "QATAR" => "QA",
        "EGYPT" => "EG",
        "MOROCCO" => "MA",
        "TUNISIA" => "TN",
        "KENYA" => "KE",
        "TANZANIA" => "TZ",
        "SOUTH AFRICA" => "ZA",
        "CANADA" => "CA",
        "MEXICO" => "MX",
        "CUBA" => "CU",
        "COSTA RICA" => "CR",
        "PANAMA" => "PA",
        "ARGENTINA" => "AR",
        "BOLIVIA" => "BO",
        "BRAZIL" => "BR",
        "CHILE" => "CL",
        "COLOMBIA" => "CO",
        "ECUADOR" => "EC",
        "PERU" => "PE",
        "URUGUAY" => "UY",
        "VENEZUELA" => "VE",
        "AUSTRALIA" => "AU",
        "NEW ZEALAND" => "NZ",
        "FIJI" => "FJ",
        _ => return None,
    };
    Some(code)
}

/// Normalize a country field to ISO 3166-1 alpha-2.
///
/// Trims and uppercases, resolves known aliases and full names, and passes
/// through anything already shaped like an alpha-2 code. Unrecognized
/// strings are returned uppercased as-is; callers use [`is_alpha2`] to
/// decide whether the result is trustworthy.
pub fn normalize_country(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper.is_empty() {
        return upper;
    }

    if let Some(code) = alias_to_alpha2(&upper) {
        return code.to_string();
    }

    upper
}

/// True when `code` is shaped like an ISO alpha-2 code (two ASCII letters).
pub fn is_alpha2(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Lowercased search terms for a country code, used when injecting gap
/// locations into the keyword vocabulary. Emails rarely say "GB"; they say
/// "United Kingdom" or "England".
pub fn country_search_terms(code: &str) -> Vec<String> {
    let code = normalize_country(code);
    let names: &[&str] = match code.as_str() {
        "GB" => &["united kingdom", "uk", "britain", "england", "scotland", "wales"],
        "US" => &["united states", "usa", "america"],
        "DE" => &["germany"],
        "FR" => &["france"],
        "ES" => &["spain"],
        "IT" => &["italy"],
        "NL" => &["netherlands", "holland"],
        "BE" => &["belgium"],
        "CH" => &["switzerland"],
        "AT" => &["austria"],
        "PT" => &["portugal"],
        "IE" => &["ireland"],
        "GR" => &["greece"],
        "TR" => &["turkey"],
        "TH" => &["thailand"],
        "MY" => &["malaysia"],
        "SG" => &["singapore"],
        "ID" => &["indonesia"],
        "PH" => &["philippines"],
        "VN" => &["vietnam"],
        "KH" => &["cambodia"],
        "LA" => &["laos"],
        "MM" => &["myanmar", "burma"],
        "JP" => &["japan"],
        "KR" => &["south korea", "korea"],
        "CN" => &["china"],
        "HK" => &["hong kong"],
        "IN" => &["india"],
        "AE" => &["united arab emirates", "uae"],
        "AU" => &["australia"],
        "NZ" => &["new zealand"],
        "CA" => &["canada"],
        "MX" => &["mexico"],
        "BR" => &["brazil"],
        "ME" => &["montenegro"],
        "HR" => &["croatia"],
        "RS" => &["serbia"],
        "ZA" => &["south africa"],
        _ => &[],
    };

    let mut terms: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    if !code.is_empty() {
        terms.push(code.to_lowercase());
    }
    terms
}

/// Extract the bare city name from a free-text city field.
///
/// Strips airport codes in parentheses ("Kuala Lumpur (KUL)"), anything
/// after a " - " separator, and anything after a comma.
pub fn clean_city_name(city: &str) -> String {
    let mut out = String::with_capacity(city.len());
    let mut depth = 0usize;
    for c in city.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    let out = out.split(" - ").next().unwrap_or("");
    let out = out.split(',').next().unwrap_or("");
    out.trim().to_string()
}

/// Case-insensitive city equality after cleanup.
pub fn city_eq(a: &str, b: &str) -> bool {
    clean_city_name(a).eq_ignore_ascii_case(&clean_city_name(b))
}

/// Loose city correspondence: equal, or one cleaned name contains the
/// other ("Kuala Lumpur" vs "Kuala Lumpur Sentral").
pub fn city_matches(a: &str, b: &str) -> bool {
    let a = clean_city_name(a).to_lowercase();
    let b = clean_city_name(b).to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_normalization() {
        assert_eq!(normalize_country("UK"), "GB");
        assert_eq!(normalize_country("United Kingdom"), "GB");
        assert_eq!(normalize_country("usa"), "US");
        assert_eq!(normalize_country("Deutschland"), "DE");
    }

    #[test]
    fn test_normalization_idempotent() {
        for raw in ["GB", "US", "MY", "PH"] {
            let once = normalize_country(raw);
            assert_eq!(normalize_country(&once), once);
        }
        // An alias collapses to the same code on repeated application.
        assert_eq!(normalize_country(&normalize_country("UK")), "GB");
    }

    #[test]
    fn test_unknown_passes_through() {
        assert_eq!(normalize_country("Atlantis"), "ATLANTIS");
        assert!(!is_alpha2("ATLANTIS"));
        assert!(is_alpha2("GB"));
        assert!(!is_alpha2("G1"));
    }

    #[test]
    fn test_clean_city_name() {
        assert_eq!(clean_city_name("Kuala Lumpur (KUL)"), "Kuala Lumpur");
        assert_eq!(clean_city_name("London - Gatwick"), "London");
        assert_eq!(clean_city_name("Manila, Metro Manila"), "Manila");
        assert_eq!(clean_city_name("  Battle "), "Battle");
    }

    #[test]
    fn test_city_matching() {
        assert!(city_eq("London (LHR)", "london"));
        assert!(city_matches("Kuala Lumpur Sentral", "Kuala Lumpur"));
        assert!(!city_matches("Manila", "London"));
        assert!(!city_matches("", "London"));
    }

    #[test]
    fn test_country_search_terms() {
        let terms = country_search_terms("UK");
        assert!(terms.contains(&"united kingdom".to_string()));
        assert!(terms.contains(&"gb".to_string()));
        // Unknown codes still yield the code itself as a term.
        assert_eq!(country_search_terms("XX"), vec!["xx".to_string()]);
    }
}
