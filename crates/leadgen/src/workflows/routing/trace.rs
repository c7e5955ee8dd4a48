use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{ResolvedTarget, RoutingRule, RuleSnapshot, Student};

/// Specificity tier at which a lead was routed, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchLevel {
    ExactOutward,
    District,
    Town,
    County,
    Fallback,
    None,
}

impl MatchLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ExactOutward => "EXACT_OUTWARD",
            Self::District => "DISTRICT",
            Self::Town => "TOWN",
            Self::County => "COUNTY",
            Self::Fallback => "FALLBACK",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a rule that was found produced no student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoActiveTargets,
    AllTargetsUnavailable,
    AllTiedTargetsUnavailable,
    CursorUpdateFailed(String),
}

impl SkipReason {
    pub fn summary(&self) -> String {
        match self {
            Self::NoActiveTargets => "no active targets".to_string(),
            Self::AllTargetsUnavailable => "all targets at capacity or inactive".to_string(),
            Self::AllTiedTargetsUnavailable => {
                "all tied-priority targets at capacity or inactive".to_string()
            }
            Self::CursorUpdateFailed(detail) => {
                format!("round-robin cursor update failed: {detail}")
            }
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// One consulted rule. `skip_reason` is set only when the rule yielded nobody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriedRule {
    pub rule: RoutingRule,
    pub targets: Vec<ResolvedTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl TriedRule {
    pub(crate) fn from_snapshot(snapshot: &RuleSnapshot, skip_reason: Option<SkipReason>) -> Self {
        Self {
            rule: snapshot.rule.clone(),
            targets: snapshot.targets.clone(),
            skip_reason,
        }
    }
}

/// Store access failure that cut routing short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFailure {
    /// Level that was being evaluated when the store failed.
    pub stage: MatchLevel,
    pub detail: String,
}

/// Decision plus the full trail of rules consulted on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteResult {
    pub matched_rule: Option<RoutingRule>,
    pub assigned_student: Option<Student>,
    pub match_level: MatchLevel,
    pub tried_rules: Vec<TriedRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_failure: Option<StoreFailure>,
}

impl RouteResult {
    pub(crate) fn unmatched(tried_rules: Vec<TriedRule>, store_failure: Option<StoreFailure>) -> Self {
        Self {
            matched_rule: None,
            assigned_student: None,
            match_level: MatchLevel::None,
            tried_rules,
            store_failure,
        }
    }

    /// Unrouted leads are kept and flagged for a human to assign.
    pub fn requires_manual_assignment(&self) -> bool {
        self.assigned_student.is_none()
    }

    pub fn summary(&self) -> String {
        match (&self.assigned_student, &self.matched_rule) {
            (Some(student), Some(rule)) => format!(
                "assigned to {} via {} rule {}",
                student.slug,
                self.match_level.label(),
                rule.match_value
            ),
            (Some(student), None) => format!(
                "assigned to {} via {}",
                student.slug,
                self.match_level.label()
            ),
            (None, _) => match &self.store_failure {
                Some(failure) => format!(
                    "unrouted: store failure during {} ({})",
                    failure.stage.label(),
                    failure.detail
                ),
                None => format!(
                    "unrouted after {} rule(s); requires manual assignment",
                    self.tried_rules.len()
                ),
            },
        }
    }
}
