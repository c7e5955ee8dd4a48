use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::routing::{MatchLevel, ParsedPostcode, RuleId, StudentId};

/// Identifier wrapper for captured leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Central site form, or a student's own subdomain page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaptureMode {
    #[default]
    Central,
    StudentDirect,
}

impl CaptureMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Central => "CENTRAL",
            Self::StudentDirect => "STUDENT_DIRECT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    RequiresManualAssignment,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::RequiresManualAssignment => "REQUIRES_MANUAL_ASSIGNMENT",
        }
    }
}

/// Raw seller form payload. Every field defaults so missing input surfaces as a
/// validation message rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadSubmission {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub town_city: String,
    pub postcode: String,
    pub approx_value: String,
    pub reason_for_sale: String,
    pub timeline: String,
    pub consent_marketing: bool,
    /// Hidden field; bots fill it, people don't.
    pub honeypot: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub referrer_url: Option<String>,
    pub capture_mode: Option<CaptureMode>,
    pub student_id: Option<StudentId>,
    pub source_subdomain_slug: Option<String>,
}

impl LeadSubmission {
    pub fn is_bot(&self) -> bool {
        self.honeypot
            .as_deref()
            .is_some_and(|value| !value.is_empty())
    }
}

/// Marketing attribution carried from the landing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub referrer_url: Option<String>,
}

/// Submission that passed validation, with blanks collapsed to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLead {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub town_city: String,
    pub postcode: ParsedPostcode,
    pub approx_value: String,
    pub reason_for_sale: String,
    pub timeline: String,
    pub attribution: Attribution,
    pub capture_mode: CaptureMode,
    pub student_id: Option<StudentId>,
    pub source_subdomain_slug: Option<String>,
}

/// Persisted seller lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub capture_mode: CaptureMode,
    pub status: LeadStatus,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub town_city: String,
    pub postcode: String,
    pub approx_value: String,
    pub reason_for_sale: String,
    pub timeline: String,
    pub consent_timestamp: DateTime<Utc>,
    pub consent_ip: String,
    pub attribution: Attribution,
    pub source_subdomain_slug: Option<String>,
    pub assigned_student_id: Option<StudentId>,
    /// Routing tier that produced the assignment; `None` for direct captures.
    pub match_level: Option<MatchLevel>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn status_view(&self) -> LeadStatusView {
        LeadStatusView {
            lead_id: self.id.clone(),
            status: self.status.label(),
            capture_mode: self.capture_mode.label(),
            assigned_student_id: self.assigned_student_id.clone(),
            match_level: self.match_level,
            created_at: self.created_at,
        }
    }
}

/// Public projection of a lead, without contact details.
#[derive(Debug, Clone, Serialize)]
pub struct LeadStatusView {
    pub lead_id: LeadId,
    pub status: &'static str,
    pub capture_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_student_id: Option<StudentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_level: Option<MatchLevel>,
    pub created_at: DateTime<Utc>,
}

/// Audit trail entry attached to a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadActivity {
    pub lead_id: LeadId,
    pub kind: LeadActivityKind,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadActivityKind {
    FormSubmitted {
        source_page: String,
        capture_mode: CaptureMode,
    },
    Routed {
        student_id: StudentId,
        match_level: MatchLevel,
        rule_id: Option<RuleId>,
    },
    DirectCapture {
        student_id: StudentId,
    },
    RoutingUnmatched {
        rules_tried: usize,
        store_failure: Option<String>,
    },
}
