use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::domain::{
    CaptureMode, Lead, LeadActivity, LeadActivityKind, LeadId, LeadStatus, LeadSubmission,
    ValidatedLead,
};
use super::repository::{LeadRepository, RepositoryError};
use super::validation::{validate_submission, LeadValidationErrors};
use crate::config::IntakeConfig;
use crate::workflows::routing::{
    RouteRequest, RouteResult, RoutingEngine, RuleStore, Student, StudentDirectory,
};

/// Validates, rate limits, routes, and persists seller leads.
pub struct LeadIntakeService<R, S> {
    repository: Arc<R>,
    routing: Arc<RoutingEngine<S>>,
    config: IntakeConfig,
}

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

/// Result of a submission the caller should acknowledge as successful.
#[derive(Debug, Clone)]
pub enum IntakeOutcome {
    Accepted {
        lead: Lead,
        /// Routing trace; absent when the lead was captured directly by a student.
        route: Option<RouteResult>,
    },
    /// Honeypot tripped. Nothing stored.
    Discarded,
}

enum Assignment {
    Direct(Student),
    Routed(RouteResult),
}

impl<R, S> LeadIntakeService<R, S>
where
    R: LeadRepository + 'static,
    S: RuleStore + StudentDirectory + 'static,
{
    pub fn new(repository: Arc<R>, routing: Arc<RoutingEngine<S>>, config: IntakeConfig) -> Self {
        Self {
            repository,
            routing,
            config,
        }
    }

    pub fn routing(&self) -> &Arc<RoutingEngine<S>> {
        &self.routing
    }

    /// Accept a seller form submission from `client_ip` at `now`.
    ///
    /// Routing never fails a submission: an unmatched lead is stored and flagged
    /// for manual assignment.
    pub fn submit(
        &self,
        submission: LeadSubmission,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<IntakeOutcome, LeadServiceError> {
        if submission.is_bot() {
            info!(client_ip, "honeypot tripped; discarding submission");
            return Ok(IntakeOutcome::Discarded);
        }

        let validated = validate_submission(&submission)?;

        let limit = self.config.max_submissions_per_hour;
        if limit > 0 {
            let recent = self
                .repository
                .count_from_ip_since(client_ip, now - Duration::hours(1))?;
            if recent >= limit as usize {
                warn!(client_ip, recent, limit, "lead submission rate limited");
                return Err(LeadServiceError::RateLimited {
                    client_ip: client_ip.to_string(),
                });
            }
        }

        let assignment = self.assign(&validated);
        let lead = build_lead(&validated, &assignment, client_ip, now);
        let lead = self.repository.insert(lead)?;

        info!(
            lead = %lead.id,
            postcode = %lead.postcode,
            capture_mode = lead.capture_mode.label(),
            status = lead.status.label(),
            "lead captured"
        );

        for kind in activity_kinds(&validated, &assignment) {
            let activity = LeadActivity {
                lead_id: lead.id.clone(),
                kind,
                recorded_at: now,
            };
            if let Err(err) = self.repository.record_activity(activity) {
                warn!(lead = %lead.id, error = %err, "failed to record lead activity");
            }
        }

        let route = match assignment {
            Assignment::Direct(_) => None,
            Assignment::Routed(route) => Some(route),
        };
        Ok(IntakeOutcome::Accepted { lead, route })
    }

    /// Fetch a stored lead for status responses.
    pub fn get(&self, lead_id: &LeadId) -> Result<Lead, LeadServiceError> {
        let lead = self
            .repository
            .fetch(lead_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(lead)
    }

    fn assign(&self, lead: &ValidatedLead) -> Assignment {
        if lead.capture_mode == CaptureMode::StudentDirect {
            if let Some(student) = self.direct_student(lead) {
                return Assignment::Direct(student);
            }
        }

        let request = RouteRequest::new(&lead.postcode.normalised, Some(lead.town_city.as_str()));
        Assignment::Routed(self.routing.route(&request))
    }

    /// The requesting student by id, or by the subdomain the form was posted from.
    fn direct_student(&self, lead: &ValidatedLead) -> Option<Student> {
        let (requested, lookup) = match (&lead.student_id, &lead.source_subdomain_slug) {
            (Some(id), _) => (id.0.as_str(), self.routing.store().student(id)),
            (None, Some(slug)) => (slug.as_str(), self.routing.store().student_by_slug(slug)),
            (None, None) => return None,
        };

        match lookup {
            Ok(Some(student)) if student.is_eligible() => Some(student),
            Ok(_) => {
                info!(
                    student = requested,
                    "direct-capture student unavailable; routing instead"
                );
                None
            }
            Err(err) => {
                warn!(
                    student = requested,
                    error = %err,
                    "direct-capture lookup failed; routing instead"
                );
                None
            }
        }
    }
}

fn build_lead(
    lead: &ValidatedLead,
    assignment: &Assignment,
    client_ip: &str,
    now: DateTime<Utc>,
) -> Lead {
    let (assigned_student_id, match_level) = match assignment {
        Assignment::Direct(student) => (Some(student.id.clone()), None),
        Assignment::Routed(route) => (
            route.assigned_student.as_ref().map(|student| student.id.clone()),
            Some(route.match_level),
        ),
    };
    let status = if assigned_student_id.is_some() {
        LeadStatus::New
    } else {
        LeadStatus::RequiresManualAssignment
    };

    Lead {
        id: next_lead_id(),
        capture_mode: lead.capture_mode,
        status,
        full_name: lead.full_name.clone(),
        phone: lead.phone.clone(),
        email: lead.email.clone(),
        address_line1: lead.address_line1.clone(),
        address_line2: lead.address_line2.clone(),
        town_city: lead.town_city.clone(),
        postcode: lead.postcode.normalised.clone(),
        approx_value: lead.approx_value.clone(),
        reason_for_sale: lead.reason_for_sale.clone(),
        timeline: lead.timeline.clone(),
        consent_timestamp: now,
        consent_ip: client_ip.to_string(),
        attribution: lead.attribution.clone(),
        source_subdomain_slug: lead.source_subdomain_slug.clone(),
        assigned_student_id,
        match_level,
        created_at: now,
    }
}

fn activity_kinds(lead: &ValidatedLead, assignment: &Assignment) -> Vec<LeadActivityKind> {
    let submitted = LeadActivityKind::FormSubmitted {
        source_page: lead
            .attribution
            .referrer_url
            .clone()
            .unwrap_or_else(|| "direct".to_string()),
        capture_mode: lead.capture_mode,
    };

    let outcome = match assignment {
        Assignment::Direct(student) => LeadActivityKind::DirectCapture {
            student_id: student.id.clone(),
        },
        Assignment::Routed(route) => match &route.assigned_student {
            Some(student) => LeadActivityKind::Routed {
                student_id: student.id.clone(),
                match_level: route.match_level,
                rule_id: route.matched_rule.as_ref().map(|rule| rule.id.clone()),
            },
            None => LeadActivityKind::RoutingUnmatched {
                rules_tried: route.tried_rules.len(),
                store_failure: route.store_failure.as_ref().map(|failure| {
                    format!("{}: {}", failure.stage.label(), failure.detail)
                }),
            },
        },
    };

    vec![submitted, outcome]
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum LeadServiceError {
    #[error(transparent)]
    Validation(#[from] LeadValidationErrors),
    #[error("too many submissions from {client_ip}; try again later")]
    RateLimited { client_ip: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
