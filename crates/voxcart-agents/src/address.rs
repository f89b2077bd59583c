//! Free-text Indian address parsing.
//!
//! Splits a spoken or typed address into lines, picks out the PIN code and
//! phone number with regexes, and recognises city and state names from
//! lookup tables. A PIN code is mandatory; everything else is best effort.

use std::sync::LazyLock;

use regex::Regex;

use crate::commerce::Address;

static PIN_PREFIXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpin\s*(?:code)?\s*(?:is|:|-)?\s*([1-9]\d{2}\s?\d{3})\b")
        .expect("Invalid PIN prefix regex")
});

static PIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([1-9]\d{5})\b").expect("Invalid PIN regex"));

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+91[\s-]?)?\b([6-9]\d{9})\b").expect("Invalid phone regex")
});

static PHONE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:phone|mobile|mob|contact)(?:\s+(?:no\.?|number))?\s*:?")
        .expect("Invalid phone label regex")
});

/// Known cities and the state each belongs to. Aliases map to one spelling.
const CITIES: &[(&str, (&str, &str))] = &[
    ("new delhi", ("New Delhi", "Delhi")),
    ("delhi", ("Delhi", "Delhi")),
    ("mumbai", ("Mumbai", "Maharashtra")),
    ("bombay", ("Mumbai", "Maharashtra")),
    ("navi mumbai", ("Navi Mumbai", "Maharashtra")),
    ("thane", ("Thane", "Maharashtra")),
    ("pune", ("Pune", "Maharashtra")),
    ("nagpur", ("Nagpur", "Maharashtra")),
    ("bengaluru", ("Bengaluru", "Karnataka")),
    ("bangalore", ("Bengaluru", "Karnataka")),
    ("mysuru", ("Mysuru", "Karnataka")),
    ("mysore", ("Mysuru", "Karnataka")),
    ("chennai", ("Chennai", "Tamil Nadu")),
    ("madras", ("Chennai", "Tamil Nadu")),
    ("coimbatore", ("Coimbatore", "Tamil Nadu")),
    ("hyderabad", ("Hyderabad", "Telangana")),
    ("secunderabad", ("Secunderabad", "Telangana")),
    ("kolkata", ("Kolkata", "West Bengal")),
    ("calcutta", ("Kolkata", "West Bengal")),
    ("ahmedabad", ("Ahmedabad", "Gujarat")),
    ("surat", ("Surat", "Gujarat")),
    ("vadodara", ("Vadodara", "Gujarat")),
    ("jaipur", ("Jaipur", "Rajasthan")),
    ("udaipur", ("Udaipur", "Rajasthan")),
    ("lucknow", ("Lucknow", "Uttar Pradesh")),
    ("kanpur", ("Kanpur", "Uttar Pradesh")),
    ("noida", ("Noida", "Uttar Pradesh")),
    ("ghaziabad", ("Ghaziabad", "Uttar Pradesh")),
    ("varanasi", ("Varanasi", "Uttar Pradesh")),
    ("gurugram", ("Gurugram", "Haryana")),
    ("gurgaon", ("Gurugram", "Haryana")),
    ("faridabad", ("Faridabad", "Haryana")),
    ("chandigarh", ("Chandigarh", "Chandigarh")),
    ("indore", ("Indore", "Madhya Pradesh")),
    ("bhopal", ("Bhopal", "Madhya Pradesh")),
    ("patna", ("Patna", "Bihar")),
    ("ranchi", ("Ranchi", "Jharkhand")),
    ("kochi", ("Kochi", "Kerala")),
    ("cochin", ("Kochi", "Kerala")),
    ("thiruvananthapuram", ("Thiruvananthapuram", "Kerala")),
    ("visakhapatnam", ("Visakhapatnam", "Andhra Pradesh")),
    ("vijayawada", ("Vijayawada", "Andhra Pradesh")),
    ("bhubaneswar", ("Bhubaneswar", "Odisha")),
    ("guwahati", ("Guwahati", "Assam")),
    ("dehradun", ("Dehradun", "Uttarakhand")),
    ("ludhiana", ("Ludhiana", "Punjab")),
    ("amritsar", ("Amritsar", "Punjab")),
    ("panaji", ("Panaji", "Goa")),
    ("raipur", ("Raipur", "Chhattisgarh")),
    ("srinagar", ("Srinagar", "Jammu and Kashmir")),
];

const STATES: &[(&str, &str)] = &[
    ("andhra pradesh", "Andhra Pradesh"),
    ("arunachal pradesh", "Arunachal Pradesh"),
    ("assam", "Assam"),
    ("bihar", "Bihar"),
    ("chhattisgarh", "Chhattisgarh"),
    ("goa", "Goa"),
    ("gujarat", "Gujarat"),
    ("haryana", "Haryana"),
    ("himachal pradesh", "Himachal Pradesh"),
    ("jharkhand", "Jharkhand"),
    ("karnataka", "Karnataka"),
    ("kerala", "Kerala"),
    ("madhya pradesh", "Madhya Pradesh"),
    ("maharashtra", "Maharashtra"),
    ("manipur", "Manipur"),
    ("meghalaya", "Meghalaya"),
    ("mizoram", "Mizoram"),
    ("nagaland", "Nagaland"),
    ("odisha", "Odisha"),
    ("orissa", "Odisha"),
    ("punjab", "Punjab"),
    ("rajasthan", "Rajasthan"),
    ("sikkim", "Sikkim"),
    ("tamil nadu", "Tamil Nadu"),
    ("telangana", "Telangana"),
    ("tripura", "Tripura"),
    ("uttar pradesh", "Uttar Pradesh"),
    ("uttarakhand", "Uttarakhand"),
    ("west bengal", "West Bengal"),
    ("jammu and kashmir", "Jammu and Kashmir"),
    ("ladakh", "Ladakh"),
    ("puducherry", "Puducherry"),
];

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Longest table key found in `text`, so "navi mumbai" beats "mumbai".
fn lookup<'a, T: Copy>(text: &str, table: &'a [(&'a str, T)]) -> Option<(&'a str, T)> {
    table
        .iter()
        .filter(|(key, _)| contains_word(text, key))
        .max_by_key(|(key, _)| key.len())
        .copied()
}

fn find_pin(text: &str) -> Option<String> {
    if let Some(caps) = PIN_PREFIXED_RE.captures(text) {
        return Some(caps[1].replace(' ', ""));
    }
    PIN_RE.captures(text).map(|caps| caps[1].to_string())
}

/// Parse a free-text address. `None` when no 6-digit PIN code is present.
pub fn parse_address(raw: &str) -> Option<Address> {
    let zip = find_pin(raw)?;

    let phone = PHONE_RE.captures(raw).map(|caps| caps[1].to_string());
    let lower = raw.to_lowercase();

    let city = lookup(&lower, CITIES);
    let state = lookup(&lower, STATES);

    let province = state
        .map(|(_, name)| name.to_string())
        .or_else(|| city.map(|(_, (_, state))| state.to_string()))
        .unwrap_or_default();
    let city_name = city.map(|(_, (name, _))| name.to_string()).unwrap_or_default();

    // Street lines: everything that is not only city, state, PIN or phone.
    let mut lines: Vec<String> = Vec::new();
    for part in raw.split(['\n', ',']) {
        let mut cleaned = part.to_string();
        if phone.as_ref().is_some_and(|p| cleaned.contains(p.as_str())) {
            cleaned = PHONE_RE.replace_all(&cleaned, "").to_string();
            cleaned = PHONE_LABEL_RE.replace_all(&cleaned, "").to_string();
        }
        cleaned = PIN_PREFIXED_RE.replace_all(&cleaned, "").to_string();
        cleaned = cleaned.replace(zip.as_str(), "");
        let cleaned = cleaned
            .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '.')
            .to_string();
        if cleaned.is_empty() {
            continue;
        }
        let key = cleaned.to_lowercase();
        let is_city = city.is_some_and(|(k, _)| key == k);
        let is_state = state.is_some_and(|(k, _)| key == k);
        let is_country = key == "india";
        if !is_city && !is_state && !is_country {
            lines.push(cleaned);
        }
    }

    let mut lines = lines.into_iter();
    let address1 = lines.next().unwrap_or_default();
    let rest: Vec<String> = lines.collect();
    let address2 = (!rest.is_empty()).then(|| rest.join(", "));

    Some(Address {
        address1,
        address2,
        city: city_name,
        province,
        country: "India".to_string(),
        zip,
        phone,
    })
}
