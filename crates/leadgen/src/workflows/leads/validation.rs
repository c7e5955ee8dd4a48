use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{Attribution, LeadSubmission, ValidatedLead};
use crate::workflows::routing::postcode::{clean, parse_postcode};

/// Per-field messages keyed by the submission field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("invalid lead submission: {}", field_list(.fields))]
pub struct LeadValidationErrors {
    fields: BTreeMap<&'static str, &'static str>,
}

impl LeadValidationErrors {
    pub fn fields(&self) -> &BTreeMap<&'static str, &'static str> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.fields.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn reject(&mut self, field: &'static str, message: &'static str) {
        self.fields.entry(field).or_insert(message);
    }
}

fn field_list(fields: &BTreeMap<&'static str, &'static str>) -> String {
    fields.keys().copied().collect::<Vec<_>>().join(", ")
}

/// Check every field of the seller form, collecting all failures at once.
pub fn validate_submission(
    submission: &LeadSubmission,
) -> Result<ValidatedLead, LeadValidationErrors> {
    let mut errors = LeadValidationErrors::default();

    let full_name = submission.full_name.trim();
    if full_name.chars().count() < 2 {
        errors.reject("full_name", "Please enter your name");
    }

    let phone: String = submission
        .phone
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if !is_uk_phone(&phone) {
        errors.reject("phone", "Please enter a valid UK phone number");
    }

    let email = optional(&submission.email);
    if email.as_deref().is_some_and(|email| !is_email(email)) {
        errors.reject("email", "Please enter a valid email");
    }

    let address_line1 = submission.address_line1.trim();
    if address_line1.chars().count() < 3 {
        errors.reject("address_line1", "Please enter your address");
    }

    let town_city = submission.town_city.trim();
    if town_city.chars().count() < 2 {
        errors.reject("town_city", "Please enter your town or city");
    }

    let postcode = parse_postcode(&submission.postcode).ok();
    if postcode.is_none() {
        errors.reject("postcode", "Please enter a valid UK postcode");
    }

    for (field, value, message) in [
        (
            "approx_value",
            &submission.approx_value,
            "Please enter an approximate value",
        ),
        (
            "reason_for_sale",
            &submission.reason_for_sale,
            "Please select a reason",
        ),
        ("timeline", &submission.timeline, "Please select a timeline"),
    ] {
        if value.trim().is_empty() {
            errors.reject(field, message);
        }
    }

    if !submission.consent_marketing {
        errors.reject("consent_marketing", "You must agree to be contacted");
    }

    let Some(postcode) = postcode else {
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedLead {
        full_name: full_name.to_string(),
        phone,
        email,
        address_line1: address_line1.to_string(),
        address_line2: optional(&submission.address_line2),
        town_city: town_city.to_string(),
        postcode,
        approx_value: submission.approx_value.trim().to_string(),
        reason_for_sale: submission.reason_for_sale.trim().to_string(),
        timeline: submission.timeline.trim().to_string(),
        attribution: Attribution {
            utm_source: optional(&submission.utm_source),
            utm_medium: optional(&submission.utm_medium),
            utm_campaign: optional(&submission.utm_campaign),
            utm_term: optional(&submission.utm_term),
            utm_content: optional(&submission.utm_content),
            referrer_url: optional(&submission.referrer_url),
        },
        capture_mode: submission.capture_mode.unwrap_or_default(),
        student_id: submission
            .student_id
            .clone()
            .filter(|id| !id.0.trim().is_empty()),
        source_subdomain_slug: optional(&submission.source_subdomain_slug)
            .map(|slug| slug.to_ascii_lowercase()),
    })
}

/// Canonical "OUTWARD INWARD" form, or the cleaned input when it does not parse.
pub fn normalise_postcode(raw: &str) -> String {
    match parse_postcode(raw) {
        Ok(postcode) => postcode.normalised,
        Err(_) => clean(raw),
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// `+44` or `0` followed by nine or ten digits.
fn is_uk_phone(phone: &str) -> bool {
    let rest = phone
        .strip_prefix("+44")
        .or_else(|| phone.strip_prefix('0'));
    match rest {
        Some(digits) => {
            (9..=10).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
