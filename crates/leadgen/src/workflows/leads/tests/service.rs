use super::common::*;
use chrono::Duration;
use std::sync::Arc;

use crate::config::IntakeConfig;
use crate::workflows::leads::domain::{CaptureMode, LeadActivityKind, LeadStatus};
use crate::workflows::leads::repository::{LeadRepository, RepositoryError};
use crate::workflows::leads::service::{IntakeOutcome, LeadIntakeService, LeadServiceError};
use crate::workflows::routing::{
    InMemoryRuleStore, MatchLevel, RoutingEngine, RoutingPolicy, StudentId,
};

fn accepted(outcome: IntakeOutcome) -> crate::workflows::leads::Lead {
    match outcome {
        IntakeOutcome::Accepted { lead, .. } => lead,
        IntakeOutcome::Discarded => panic!("submission unexpectedly discarded"),
    }
}

#[test]
fn routed_lead_is_stored_with_assignment_and_activities() {
    let (service, repository, _) = build_service();

    let outcome = service
        .submit(submission(), "203.0.113.7", now())
        .expect("submission succeeds");
    let route = match &outcome {
        IntakeOutcome::Accepted { route, .. } => route.clone().expect("routing ran"),
        IntakeOutcome::Discarded => panic!("submission unexpectedly discarded"),
    };
    let lead = accepted(outcome);

    assert_eq!(route.match_level, MatchLevel::ExactOutward);
    assert_eq!(lead.status, LeadStatus::New);
    assert_eq!(lead.postcode, "B1 1AA");
    assert_eq!(lead.phone, "07700900123");
    assert_eq!(lead.address_line2, None);
    assert_eq!(lead.consent_ip, "203.0.113.7");
    assert_eq!(lead.consent_timestamp, now());
    assert_eq!(
        lead.assigned_student_id,
        Some(StudentId("student-1".to_string()))
    );
    assert_eq!(lead.match_level, Some(MatchLevel::ExactOutward));
    assert_eq!(lead.attribution.utm_source.as_deref(), Some("google"));

    let stored = repository
        .fetch(&lead.id)
        .expect("fetch succeeds")
        .expect("lead stored");
    assert_eq!(stored, lead);

    let activities = repository.activities(&lead.id).expect("activities readable");
    assert_eq!(activities.len(), 2);
    assert_eq!(
        activities[0].kind,
        LeadActivityKind::FormSubmitted {
            source_page: "https://averyfastsale.com/sell".to_string(),
            capture_mode: CaptureMode::Central,
        }
    );
    assert!(matches!(
        activities[1].kind,
        LeadActivityKind::Routed {
            match_level: MatchLevel::ExactOutward,
            ..
        }
    ));
}

#[test]
fn unrouted_lead_is_kept_for_manual_assignment() {
    let (service, repository, _) = build_service();
    let mut form = submission();
    form.postcode = "ZZ1 1ZZ".to_string();
    form.town_city = "Nowhere".to_string();
    form.referrer_url = None;

    let lead = accepted(
        service
            .submit(form, "203.0.113.7", now())
            .expect("routing failure never fails intake"),
    );

    assert_eq!(lead.status, LeadStatus::RequiresManualAssignment);
    assert_eq!(lead.assigned_student_id, None);
    assert_eq!(lead.match_level, Some(MatchLevel::None));

    let activities = repository.activities(&lead.id).expect("activities readable");
    assert!(matches!(
        &activities[0].kind,
        LeadActivityKind::FormSubmitted { source_page, .. } if source_page == "direct"
    ));
    assert_eq!(
        activities[1].kind,
        LeadActivityKind::RoutingUnmatched {
            rules_tried: 0,
            store_failure: None,
        }
    );
}

#[test]
fn honeypot_submission_is_discarded_before_validation() {
    let (service, repository, _) = build_service();
    let form = crate::workflows::leads::LeadSubmission {
        honeypot: Some("http://spam.example".to_string()),
        ..Default::default()
    };

    let outcome = service
        .submit(form, "198.51.100.1", now())
        .expect("bots get a silent success");

    assert!(matches!(outcome, IntakeOutcome::Discarded));
    assert_eq!(repository.len(), 0);
}

#[test]
fn invalid_submission_reports_every_field() {
    let (service, repository, _) = build_service();
    let mut form = submission();
    form.full_name = "A".to_string();
    form.postcode = "12345".to_string();
    form.consent_marketing = false;

    let err = service
        .submit(form, "203.0.113.7", now())
        .expect_err("validation fails");

    match err {
        LeadServiceError::Validation(errors) => {
            assert_eq!(errors.get("full_name"), Some("Please enter your name"));
            assert_eq!(errors.get("postcode"), Some("Please enter a valid UK postcode"));
            assert_eq!(
                errors.get("consent_marketing"),
                Some("You must agree to be contacted")
            );
            assert_eq!(errors.fields().len(), 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(repository.len(), 0);
}

#[test]
fn sixth_submission_within_an_hour_is_rate_limited() {
    let (service, _, _) = build_service();

    for minute in 0..5 {
        service
            .submit(submission(), "203.0.113.7", now() + Duration::minutes(minute))
            .expect("under the limit");
    }

    let err = service
        .submit(submission(), "203.0.113.7", now() + Duration::minutes(10))
        .expect_err("limit reached");
    assert!(matches!(err, LeadServiceError::RateLimited { .. }));

    service
        .submit(submission(), "203.0.113.8", now() + Duration::minutes(10))
        .expect("other addresses unaffected");
    service
        .submit(submission(), "203.0.113.7", now() + Duration::minutes(61))
        .expect("window has moved on");
}

#[test]
fn zero_limit_disables_rate_limiting() {
    let (service, _, _) = build_service_with(IntakeConfig {
        max_submissions_per_hour: 0,
    });

    for _ in 0..8 {
        service
            .submit(submission(), "203.0.113.7", now())
            .expect("no limit applied");
    }
}

#[test]
fn direct_capture_assigns_the_requesting_student() {
    let (service, repository, _) = build_service();
    let mut form = submission();
    form.capture_mode = Some(CaptureMode::StudentDirect);
    form.student_id = Some(StudentId("student-2".to_string()));
    form.source_subdomain_slug = Some("Jane-Doe".to_string());

    let outcome = service
        .submit(form, "203.0.113.7", now())
        .expect("submission succeeds");
    assert!(matches!(
        &outcome,
        IntakeOutcome::Accepted { route: None, .. }
    ));
    let lead = accepted(outcome);

    assert_eq!(lead.capture_mode, CaptureMode::StudentDirect);
    assert_eq!(
        lead.assigned_student_id,
        Some(StudentId("student-2".to_string()))
    );
    assert_eq!(lead.match_level, None);
    assert_eq!(lead.source_subdomain_slug.as_deref(), Some("jane-doe"));

    let activities = repository.activities(&lead.id).expect("activities readable");
    assert_eq!(
        activities[1].kind,
        LeadActivityKind::DirectCapture {
            student_id: StudentId("student-2".to_string()),
        }
    );
}

#[test]
fn direct_capture_resolves_the_student_from_the_subdomain_slug() {
    let (service, repository, _) = build_service();
    let mut form = submission();
    form.capture_mode = Some(CaptureMode::StudentDirect);
    form.source_subdomain_slug = Some("Jane-Doe".to_string());

    let outcome = service
        .submit(form, "203.0.113.7", now())
        .expect("submission succeeds");
    assert!(matches!(
        &outcome,
        IntakeOutcome::Accepted { route: None, .. }
    ));
    let lead = accepted(outcome);

    assert_eq!(
        lead.assigned_student_id,
        Some(StudentId("student-2".to_string()))
    );
    assert_eq!(lead.match_level, None);
    let activities = repository.activities(&lead.id).expect("activities readable");
    assert_eq!(
        activities[1].kind,
        LeadActivityKind::DirectCapture {
            student_id: StudentId("student-2".to_string()),
        }
    );
}

#[test]
fn direct_capture_from_unknown_subdomain_is_routed() {
    let (service, _, _) = build_service();
    let mut form = submission();
    form.capture_mode = Some(CaptureMode::StudentDirect);
    form.source_subdomain_slug = Some("nobody-here".to_string());

    let lead = accepted(
        service
            .submit(form, "203.0.113.7", now())
            .expect("submission succeeds"),
    );

    assert_eq!(
        lead.assigned_student_id,
        Some(StudentId("student-1".to_string()))
    );
    assert_eq!(lead.match_level, Some(MatchLevel::ExactOutward));
}

#[test]
fn direct_capture_for_student_at_capacity_falls_back_to_routing() {
    let (service, _, store) = build_service();
    store
        .set_capacity(&StudentId("student-2".to_string()), true)
        .expect("store writable");
    let mut form = submission();
    form.capture_mode = Some(CaptureMode::StudentDirect);
    form.student_id = Some(StudentId("student-2".to_string()));

    let lead = accepted(
        service
            .submit(form, "203.0.113.7", now())
            .expect("submission succeeds"),
    );

    assert_eq!(
        lead.assigned_student_id,
        Some(StudentId("student-1".to_string()))
    );
    assert_eq!(lead.match_level, Some(MatchLevel::ExactOutward));
}

#[test]
fn repository_outage_surfaces_as_error() {
    let store = Arc::new(InMemoryRuleStore::new(routing_table()).expect("valid table"));
    let engine = Arc::new(RoutingEngine::new(store, RoutingPolicy::default()));
    let service = LeadIntakeService::new(
        Arc::new(UnavailableRepository),
        engine,
        IntakeConfig::default(),
    );

    let err = service
        .submit(submission(), "203.0.113.7", now())
        .expect_err("storage failure propagates");

    assert!(matches!(
        err,
        LeadServiceError::Repository(RepositoryError::Unavailable(_))
    ));
}

#[test]
fn unknown_lead_lookup_is_not_found() {
    let (service, _, _) = build_service();

    let err = service
        .get(&crate::workflows::leads::LeadId("lead-missing".to_string()))
        .expect_err("lead missing");

    assert!(matches!(
        err,
        LeadServiceError::Repository(RepositoryError::NotFound)
    ));
}
