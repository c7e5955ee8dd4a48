//! Seller lead intake: form validation, abuse controls, routing, and the audit trail.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    Attribution, CaptureMode, Lead, LeadActivity, LeadActivityKind, LeadId, LeadStatus,
    LeadStatusView, LeadSubmission, ValidatedLead,
};
pub use repository::{LeadRepository, RepositoryError};
pub use router::{client_ip, lead_router};
pub use service::{IntakeOutcome, LeadIntakeService, LeadServiceError};
pub use validation::{normalise_postcode, validate_submission, LeadValidationErrors};
