use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use super::domain::{
    match_key, ResolvedTarget, RoundRobinState, RoutingRule, RoutingRuleTarget, RuleId,
    RuleSnapshot, RuleType, Student, StudentId,
};
use super::store::{RuleStore, StoreError, StudentDirectory};

/// Flat record tables linked by identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    pub students: Vec<Student>,
    pub rules: Vec<RoutingRule>,
    pub targets: Vec<RoutingRuleTarget>,
    #[serde(default)]
    pub round_robin: Vec<RoundRobinState>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingTableError {
    #[error("student id {0} is defined more than once")]
    DuplicateStudentId(StudentId),
    #[error("student slug '{0}' is used more than once")]
    DuplicateSlug(String),
    #[error("rule id {0} is defined more than once")]
    DuplicateRuleId(RuleId),
    #[error("more than one active {} rule matches '{match_value}'", .rule_type.label())]
    DuplicateActiveRule {
        rule_type: RuleType,
        match_value: String,
    },
    #[error("target references unknown rule {0}")]
    UnknownRule(RuleId),
    #[error("target references unknown student {0}")]
    UnknownStudent(StudentId),
}

impl RoutingTable {
    /// Enforce id uniqueness, referential integrity, and one active rule per (type, value).
    pub fn validate(&self) -> Result<(), RoutingTableError> {
        let mut student_ids = HashSet::new();
        let mut slugs = HashSet::new();
        for student in &self.students {
            if !student_ids.insert(&student.id) {
                return Err(RoutingTableError::DuplicateStudentId(student.id.clone()));
            }
            if !slugs.insert(student.slug.as_str()) {
                return Err(RoutingTableError::DuplicateSlug(student.slug.clone()));
            }
        }

        let mut rule_ids = HashSet::new();
        let mut active_keys = HashSet::new();
        for rule in &self.rules {
            if !rule_ids.insert(&rule.id) {
                return Err(RoutingTableError::DuplicateRuleId(rule.id.clone()));
            }
            if rule.is_active && !active_keys.insert((rule.rule_type, match_key(&rule.match_value)))
            {
                return Err(RoutingTableError::DuplicateActiveRule {
                    rule_type: rule.rule_type,
                    match_value: rule.match_value.clone(),
                });
            }
        }

        for target in &self.targets {
            if !rule_ids.contains(&target.rule_id) {
                return Err(RoutingTableError::UnknownRule(target.rule_id.clone()));
            }
            if !student_ids.contains(&target.student_id) {
                return Err(RoutingTableError::UnknownStudent(target.student_id.clone()));
            }
        }

        Ok(())
    }

    /// Active rule for the lookup key joined with its students, targets ordered by priority.
    pub fn snapshot(&self, rule_type: RuleType, match_value: &str) -> Option<RuleSnapshot> {
        let key = match_key(match_value);
        let rule = self.rules.iter().find(|rule| {
            rule.is_active && rule.rule_type == rule_type && match_key(&rule.match_value) == key
        })?;

        let students: HashMap<&StudentId, &Student> = self
            .students
            .iter()
            .map(|student| (&student.id, student))
            .collect();

        let mut targets: Vec<ResolvedTarget> = self
            .targets
            .iter()
            .filter(|target| target.rule_id == rule.id)
            .filter_map(|target| {
                students.get(&target.student_id).map(|student| ResolvedTarget {
                    student: (*student).clone(),
                    priority: target.priority,
                    is_active: target.is_active,
                })
            })
            .collect();
        targets.sort_by_key(|target| target.priority);

        Some(RuleSnapshot {
            rule: rule.clone(),
            targets,
            round_robin: self.cursor(&rule.id).cloned(),
        })
    }

    pub fn student(&self, id: &StudentId) -> Option<&Student> {
        self.students.iter().find(|student| &student.id == id)
    }

    pub fn student_by_slug(&self, slug: &str) -> Option<&Student> {
        self.students
            .iter()
            .find(|student| student.slug.eq_ignore_ascii_case(slug))
    }

    fn cursor(&self, rule_id: &RuleId) -> Option<&RoundRobinState> {
        self.round_robin
            .iter()
            .find(|state| &state.rule_id == rule_id)
    }

    fn student_mut(&mut self, id: &StudentId) -> Option<&mut Student> {
        self.students.iter_mut().find(|student| &student.id == id)
    }
}

/// Process-local store over a [`RoutingTable`]; every operation runs under one lock.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    table: Mutex<RoutingTable>,
}

impl InMemoryRuleStore {
    pub fn new(table: RoutingTable) -> Result<Self, RoutingTableError> {
        table.validate()?;
        Ok(Self {
            table: Mutex::new(table),
        })
    }

    /// Toggle the capacity gate. Returns `false` for unknown students.
    pub fn set_capacity(&self, id: &StudentId, at_capacity: bool) -> Result<bool, StoreError> {
        let mut table = self.lock()?;
        Ok(match table.student_mut(id) {
            Some(student) => {
                student.is_at_capacity = at_capacity;
                true
            }
            None => false,
        })
    }

    /// Activate or deactivate a student. Returns `false` for unknown students.
    pub fn set_active(&self, id: &StudentId, active: bool) -> Result<bool, StoreError> {
        let mut table = self.lock()?;
        Ok(match table.student_mut(id) {
            Some(student) => {
                student.is_active = active;
                true
            }
            None => false,
        })
    }

    pub fn table(&self) -> Result<RoutingTable, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, RoutingTable>, StoreError> {
        self.table
            .lock()
            .map_err(|_| StoreError::Unavailable("routing table lock poisoned".to_string()))
    }
}

impl RuleStore for InMemoryRuleStore {
    fn find_active_rule(
        &self,
        rule_type: RuleType,
        match_value: &str,
    ) -> Result<Option<RuleSnapshot>, StoreError> {
        Ok(self.lock()?.snapshot(rule_type, match_value))
    }

    fn round_robin_state(&self, rule_id: &RuleId) -> Result<Option<RoundRobinState>, StoreError> {
        Ok(self.lock()?.cursor(rule_id).cloned())
    }

    fn compare_and_swap_round_robin(
        &self,
        rule_id: &RuleId,
        expected: Option<i64>,
        next: i64,
    ) -> Result<bool, StoreError> {
        let mut table = self.lock()?;
        let position = table
            .round_robin
            .iter()
            .position(|state| &state.rule_id == rule_id);

        match (position, expected) {
            (Some(index), Some(expected))
                if table.round_robin[index].last_assigned_index == expected =>
            {
                table.round_robin[index].last_assigned_index = next;
                Ok(true)
            }
            (None, None) => {
                table.round_robin.push(RoundRobinState {
                    rule_id: rule_id.clone(),
                    last_assigned_index: next,
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, StoreError> {
        Ok(self.lock()?.student(id).cloned())
    }
}

impl StudentDirectory for InMemoryRuleStore {
    fn student_by_slug(&self, slug: &str) -> Result<Option<Student>, StoreError> {
        Ok(self.lock()?.student_by_slug(slug).cloned())
    }
}
