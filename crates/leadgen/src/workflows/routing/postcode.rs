use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Structured UK postcode, e.g. `SW1A 1AA` -> outward `SW1A`, district `SW`, inward `1AA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedPostcode {
    pub normalised: String,
    pub outward: String,
    pub district: String,
    pub inward: String,
}

/// Raised when input does not have the shape of a UK postcode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{input}' is not a valid UK postcode")]
pub struct InvalidPostcode {
    pub input: String,
}

const INWARD_LEN: usize = 3;

/// Parse a raw postcode, ignoring whitespace and case.
pub fn parse_postcode(raw: &str) -> Result<ParsedPostcode, InvalidPostcode> {
    let cleaned = clean(raw);
    if !has_uk_shape(&cleaned) {
        return Err(InvalidPostcode {
            input: raw.to_string(),
        });
    }

    // shape check guarantees ASCII, so byte slicing is safe
    let (outward, inward) = cleaned.split_at(cleaned.len() - INWARD_LEN);
    let district = leading_letters(outward).unwrap_or(outward);

    Ok(ParsedPostcode {
        normalised: format!("{outward} {inward}"),
        outward: outward.to_string(),
        district: district.to_string(),
        inward: inward.to_string(),
    })
}

impl FromStr for ParsedPostcode {
    type Err = InvalidPostcode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_postcode(s)
    }
}

impl fmt::Display for ParsedPostcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalised)
    }
}

pub(crate) fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

fn leading_letters(outward: &str) -> Option<&str> {
    let end = outward
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(outward.len());
    (end > 0).then(|| &outward[..end])
}

/// `^[A-Z]{1,2}\d[A-Z\d]?\d[A-Z]{2}$`
fn has_uk_shape(cleaned: &str) -> bool {
    let bytes = cleaned.as_bytes();
    if !(5..=7).contains(&bytes.len()) {
        return false;
    }

    let (outward, inward) = bytes.split_at(bytes.len() - INWARD_LEN);
    let inward_ok = inward[0].is_ascii_digit()
        && inward[1].is_ascii_uppercase()
        && inward[2].is_ascii_uppercase();
    if !inward_ok {
        return false;
    }

    let letters = outward
        .iter()
        .take_while(|b| b.is_ascii_uppercase())
        .count();
    if !(1..=2).contains(&letters) {
        return false;
    }

    match &outward[letters..] {
        [digit] => digit.is_ascii_digit(),
        [digit, suffix] => {
            digit.is_ascii_digit() && (suffix.is_ascii_uppercase() || suffix.is_ascii_digit())
        }
        _ => false,
    }
}
