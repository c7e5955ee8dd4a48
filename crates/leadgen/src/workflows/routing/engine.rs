use std::sync::Arc;

use tracing::{debug, info, warn};

use super::domain::{match_key, RoutingRule, RuleType, Student, StudentId};
use super::postcode::parse_postcode;
use super::sandbox::SandboxStore;
use super::selector::select_student;
use super::store::{RuleStore, StoreError};
use super::trace::{MatchLevel, RouteResult, StoreFailure, TriedRule};
use crate::config::RoutingConfig;

pub const DEFAULT_CURSOR_ATTEMPTS: u8 = 5;

/// Explicit inputs that shape routing beyond the rule tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub fallback_student_id: Option<StudentId>,
    /// COUNTY rules are only consulted when enabled.
    pub county_matching: bool,
    pub cursor_attempts: u8,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            fallback_student_id: None,
            county_matching: false,
            cursor_attempts: DEFAULT_CURSOR_ATTEMPTS,
        }
    }
}

impl From<&RoutingConfig> for RoutingPolicy {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            fallback_student_id: config.fallback_student_id.clone(),
            county_matching: config.county_matching,
            cursor_attempts: config.cursor_attempts,
        }
    }
}

/// Location fields of a lead that routing looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteRequest<'a> {
    pub postcode: &'a str,
    pub town_city: Option<&'a str>,
    pub county: Option<&'a str>,
}

impl<'a> RouteRequest<'a> {
    pub fn new(postcode: &'a str, town_city: Option<&'a str>) -> Self {
        Self {
            postcode,
            town_city,
            county: None,
        }
    }

    pub fn with_county(mut self, county: Option<&'a str>) -> Self {
        self.county = county;
        self
    }
}

/// Assigns leads to students: exact outward, district, town, county, fallback.
pub struct RoutingEngine<S> {
    store: Arc<S>,
    policy: RoutingPolicy,
}

impl<S> RoutingEngine<S>
where
    S: RuleStore + 'static,
{
    pub fn new(store: Arc<S>, policy: RoutingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Production path: the assigned student id, or `None` for manual assignment.
    pub fn route_lead(&self, postcode: &str, town_city: Option<&str>) -> Option<StudentId> {
        self.test_route(postcode, town_city)
            .assigned_student
            .map(|student| student.id)
    }

    /// Full decision trace. Round-robin cursors advance exactly as for a live lead.
    pub fn test_route(&self, postcode: &str, town_city: Option<&str>) -> RouteResult {
        self.route(&RouteRequest::new(postcode, town_city))
    }

    /// Same decision as [`Self::test_route`] without persisting any cursor movement.
    pub fn dry_run(&self, postcode: &str, town_city: Option<&str>) -> RouteResult {
        self.dry_run_request(&RouteRequest::new(postcode, town_city))
    }

    pub fn route(&self, request: &RouteRequest<'_>) -> RouteResult {
        route_with(self.store.as_ref(), &self.policy, request)
    }

    pub fn dry_run_request(&self, request: &RouteRequest<'_>) -> RouteResult {
        let sandbox = SandboxStore::new(self.store.as_ref());
        route_with(&sandbox, &self.policy, request)
    }
}

struct Assignment {
    student: Student,
    rule: Option<RoutingRule>,
    level: MatchLevel,
}

type StageError = (MatchLevel, StoreError);

/// Run the routing search against any store. Never fails: store errors end the
/// search with `MatchLevel::None` and a recorded [`StoreFailure`].
pub fn route_with<S: RuleStore + ?Sized>(
    store: &S,
    policy: &RoutingPolicy,
    request: &RouteRequest<'_>,
) -> RouteResult {
    let mut tried = Vec::new();

    let result = match search(store, policy, request, &mut tried) {
        Ok(Some(assignment)) => RouteResult {
            matched_rule: assignment.rule,
            assigned_student: Some(assignment.student),
            match_level: assignment.level,
            tried_rules: tried,
            store_failure: None,
        },
        Ok(None) => RouteResult::unmatched(tried, None),
        Err((stage, err)) => {
            warn!(stage = stage.label(), error = %err, "rule store failed during routing");
            RouteResult::unmatched(
                tried,
                Some(StoreFailure {
                    stage,
                    detail: err.to_string(),
                }),
            )
        }
    };

    info!(
        postcode = request.postcode,
        match_level = result.match_level.label(),
        student = result
            .assigned_student
            .as_ref()
            .map(|student| student.id.0.as_str())
            .unwrap_or("-"),
        rules_tried = result.tried_rules.len(),
        "lead routing decided"
    );

    result
}

fn search<S: RuleStore + ?Sized>(
    store: &S,
    policy: &RoutingPolicy,
    request: &RouteRequest<'_>,
    tried: &mut Vec<TriedRule>,
) -> Result<Option<Assignment>, StageError> {
    match parse_postcode(request.postcode) {
        Ok(postcode) => {
            let exact = try_level(
                store,
                policy,
                RuleType::PostcodePrefix,
                &postcode.outward,
                MatchLevel::ExactOutward,
                tried,
            )?;
            if exact.is_some() {
                return Ok(exact);
            }

            if postcode.district != postcode.outward {
                let district = try_level(
                    store,
                    policy,
                    RuleType::PostcodePrefix,
                    &postcode.district,
                    MatchLevel::District,
                    tried,
                )?;
                if district.is_some() {
                    return Ok(district);
                }
            }
        }
        Err(err) => debug!(error = %err, "skipping postcode rules"),
    }

    if let Some(town) = non_blank(request.town_city) {
        let town = try_level(store, policy, RuleType::Town, town, MatchLevel::Town, tried)?;
        if town.is_some() {
            return Ok(town);
        }
    }

    if policy.county_matching {
        if let Some(county) = non_blank(request.county) {
            let county = try_level(
                store,
                policy,
                RuleType::County,
                county,
                MatchLevel::County,
                tried,
            )?;
            if county.is_some() {
                return Ok(county);
            }
        }
    }

    fallback(store, policy).map_err(|err| (MatchLevel::Fallback, err))
}

fn try_level<S: RuleStore + ?Sized>(
    store: &S,
    policy: &RoutingPolicy,
    rule_type: RuleType,
    value: &str,
    level: MatchLevel,
    tried: &mut Vec<TriedRule>,
) -> Result<Option<Assignment>, StageError> {
    let key = match_key(value);
    let snapshot = store
        .find_active_rule(rule_type, &key)
        .map_err(|err| (level, err))?;

    let Some(snapshot) = snapshot else {
        debug!(rule_type = rule_type.label(), value = %key, "no active rule");
        return Ok(None);
    };

    let student = select_student(store, &snapshot, policy.cursor_attempts, tried)
        .map_err(|err| (level, err))?;

    match student {
        Some(student) => Ok(Some(Assignment {
            student,
            rule: Some(snapshot.rule),
            level,
        })),
        None => {
            debug!(rule = %snapshot.rule.describe(), "rule yielded no eligible student");
            Ok(None)
        }
    }
}

fn fallback<S: RuleStore + ?Sized>(
    store: &S,
    policy: &RoutingPolicy,
) -> Result<Option<Assignment>, StoreError> {
    let Some(id) = &policy.fallback_student_id else {
        return Ok(None);
    };

    match store.student(id)? {
        Some(student) if student.is_eligible() => Ok(Some(Assignment {
            student,
            rule: None,
            level: MatchLevel::Fallback,
        })),
        Some(_) => {
            debug!(student = %id, "fallback student inactive or at capacity");
            Ok(None)
        }
        None => {
            warn!(student = %id, "configured fallback student does not exist");
            Ok(None)
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
