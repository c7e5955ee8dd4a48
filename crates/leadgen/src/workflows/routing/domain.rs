use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier wrapper for affiliated agents ("students").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for routing rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Independent agent that receives leads. Students are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub slug: String,
    pub display_name: String,
    pub phone: String,
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub is_active: bool,
    pub is_at_capacity: bool,
}

impl Student {
    /// Active and below capacity.
    pub fn is_eligible(&self) -> bool {
        self.is_active && !self.is_at_capacity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    PostcodePrefix,
    Town,
    County,
}

impl RuleType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PostcodePrefix => "POSTCODE_PREFIX",
            Self::Town => "TOWN",
            Self::County => "COUNTY",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "POSTCODE_PREFIX" | "POSTCODE" => Some(Self::PostcodePrefix),
            "TOWN" => Some(Self::Town),
            "COUNTY" => Some(Self::County),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingStrategy {
    #[default]
    Priority,
    RoundRobin,
}

impl RoutingStrategy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Priority => "PRIORITY",
            Self::RoundRobin => "ROUND_ROBIN",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "PRIORITY" | "" => Some(Self::Priority),
            "ROUND_ROBIN" => Some(Self::RoundRobin),
            _ => None,
        }
    }
}

/// Geographic matching criterion. At most one active rule exists per (type, value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: RuleId,
    pub rule_type: RuleType,
    pub match_value: String,
    pub strategy: RoutingStrategy,
    pub is_active: bool,
}

impl RoutingRule {
    /// Build an active rule; the match value is stored trimmed and uppercased.
    pub fn new(
        id: impl Into<String>,
        rule_type: RuleType,
        match_value: &str,
        strategy: RoutingStrategy,
    ) -> Self {
        Self {
            id: RuleId(id.into()),
            rule_type,
            match_value: match_key(match_value),
            strategy,
            is_active: true,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {} ({})",
            self.rule_type.label(),
            self.match_value,
            self.strategy.label()
        )
    }
}

/// Join between a rule and a student. Lower priority values are preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRuleTarget {
    pub rule_id: RuleId,
    pub student_id: StudentId,
    pub priority: i32,
    pub is_active: bool,
}

/// Per-rule rotation cursor; `-1` means nothing has been assigned yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRobinState {
    pub rule_id: RuleId,
    pub last_assigned_index: i64,
}

pub const NO_ASSIGNMENT_YET: i64 = -1;

/// Target joined with its student at lookup time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub student: Student,
    pub priority: i32,
    pub is_active: bool,
}

/// Immutable view of one rule, its targets, and its cursor, fetched once per lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub rule: RoutingRule,
    pub targets: Vec<ResolvedTarget>,
    pub round_robin: Option<RoundRobinState>,
}

/// Normalised key used for rule lookups.
pub fn match_key(value: &str) -> String {
    value.trim().to_uppercase()
}
