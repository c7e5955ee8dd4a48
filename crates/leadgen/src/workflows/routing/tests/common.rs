use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::workflows::routing::domain::{
    RoundRobinState, RoutingRule, RoutingRuleTarget, RoutingStrategy, RuleId, RuleSnapshot,
    RuleType, Student, StudentId,
};
use crate::workflows::routing::engine::{RoutingEngine, RoutingPolicy};
use crate::workflows::routing::store::{RuleStore, StoreError};
use crate::workflows::routing::table::{InMemoryRuleStore, RoutingTable};

pub(super) fn student(key: &str) -> Student {
    Student {
        id: StudentId(format!("student-{key}")),
        slug: format!("agent-{key}"),
        display_name: format!("Agent {}", key.to_uppercase()),
        phone: "07700900000".to_string(),
        email: Some(format!("{key}@example.com")),
        bio: None,
        is_active: true,
        is_at_capacity: false,
    }
}

pub(super) fn id(key: &str) -> StudentId {
    StudentId(format!("student-{key}"))
}

pub(super) fn target(rule: &str, key: &str, priority: i32) -> RoutingRuleTarget {
    RoutingRuleTarget {
        rule_id: RuleId(rule.to_string()),
        student_id: id(key),
        priority,
        is_active: true,
    }
}

/// Students a..d; `B1 -> a`, `B -> a(0), b(1)`, `BS -> c, d` round robin,
/// `BIRMINGHAM -> b`, `WEST MIDLANDS -> d` (county).
pub(super) fn table() -> RoutingTable {
    RoutingTable {
        students: vec![student("a"), student("b"), student("c"), student("d")],
        rules: vec![
            RoutingRule::new("rule-b1", RuleType::PostcodePrefix, "B1", RoutingStrategy::Priority),
            RoutingRule::new("rule-b", RuleType::PostcodePrefix, "b", RoutingStrategy::Priority),
            RoutingRule::new(
                "rule-bs",
                RuleType::PostcodePrefix,
                "BS",
                RoutingStrategy::RoundRobin,
            ),
            RoutingRule::new("rule-brum", RuleType::Town, "Birmingham", RoutingStrategy::Priority),
            RoutingRule::new(
                "rule-wm",
                RuleType::County,
                "West Midlands",
                RoutingStrategy::Priority,
            ),
        ],
        targets: vec![
            target("rule-b1", "a", 0),
            target("rule-b", "a", 0),
            target("rule-b", "b", 1),
            target("rule-bs", "c", 0),
            target("rule-bs", "d", 0),
            target("rule-brum", "b", 0),
            target("rule-wm", "d", 0),
        ],
        round_robin: Vec::new(),
    }
}

pub(super) fn store() -> Arc<InMemoryRuleStore> {
    Arc::new(InMemoryRuleStore::new(table()).expect("fixture table is valid"))
}

pub(super) fn engine() -> (RoutingEngine<InMemoryRuleStore>, Arc<InMemoryRuleStore>) {
    engine_with(RoutingPolicy::default())
}

pub(super) fn engine_with(
    policy: RoutingPolicy,
) -> (RoutingEngine<InMemoryRuleStore>, Arc<InMemoryRuleStore>) {
    let store = store();
    (RoutingEngine::new(store.clone(), policy), store)
}

pub(super) fn cursor(store: &InMemoryRuleStore, rule: &str) -> Option<i64> {
    store
        .round_robin_state(&RuleId(rule.to_string()))
        .expect("store readable")
        .map(|state| state.last_assigned_index)
}

pub(super) fn snapshot(store: &InMemoryRuleStore, rule_type: RuleType, value: &str) -> RuleSnapshot {
    store
        .find_active_rule(rule_type, value)
        .expect("store readable")
        .expect("rule exists")
}

/// Every call fails as if the backing database were offline.
pub(super) struct UnavailableStore;

impl RuleStore for UnavailableStore {
    fn find_active_rule(
        &self,
        _rule_type: RuleType,
        _match_value: &str,
    ) -> Result<Option<RuleSnapshot>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn round_robin_state(&self, _rule_id: &RuleId) -> Result<Option<RoundRobinState>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap_round_robin(
        &self,
        _rule_id: &RuleId,
        _expected: Option<i64>,
        _next: i64,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn student(&self, _id: &StudentId) -> Result<Option<Student>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Reads from the fixture table but loses every cursor race.
pub(super) struct ContendedStore {
    pub(super) inner: InMemoryRuleStore,
    pub(super) swaps: AtomicUsize,
}

impl ContendedStore {
    pub(super) fn new() -> Self {
        Self {
            inner: InMemoryRuleStore::new(table()).expect("fixture table is valid"),
            swaps: AtomicUsize::new(0),
        }
    }
}

impl RuleStore for ContendedStore {
    fn find_active_rule(
        &self,
        rule_type: RuleType,
        match_value: &str,
    ) -> Result<Option<RuleSnapshot>, StoreError> {
        self.inner.find_active_rule(rule_type, match_value)
    }

    fn round_robin_state(&self, rule_id: &RuleId) -> Result<Option<RoundRobinState>, StoreError> {
        self.inner.round_robin_state(rule_id)
    }

    fn compare_and_swap_round_robin(
        &self,
        _rule_id: &RuleId,
        _expected: Option<i64>,
        _next: i64,
    ) -> Result<bool, StoreError> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, StoreError> {
        self.inner.student(id)
    }
}

/// Loses exactly the first cursor race by letting a rival writer advance first.
pub(super) struct RacingStore {
    pub(super) inner: InMemoryRuleStore,
    raced: AtomicUsize,
}

impl RacingStore {
    pub(super) fn new() -> Self {
        Self {
            inner: InMemoryRuleStore::new(table()).expect("fixture table is valid"),
            raced: AtomicUsize::new(0),
        }
    }
}

impl RuleStore for RacingStore {
    fn find_active_rule(
        &self,
        rule_type: RuleType,
        match_value: &str,
    ) -> Result<Option<RuleSnapshot>, StoreError> {
        self.inner.find_active_rule(rule_type, match_value)
    }

    fn round_robin_state(&self, rule_id: &RuleId) -> Result<Option<RoundRobinState>, StoreError> {
        self.inner.round_robin_state(rule_id)
    }

    fn compare_and_swap_round_robin(
        &self,
        rule_id: &RuleId,
        expected: Option<i64>,
        next: i64,
    ) -> Result<bool, StoreError> {
        if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
            // a concurrent request claims index 0 first
            self.inner.compare_and_swap_round_robin(rule_id, None, 0)?;
        }
        self.inner.compare_and_swap_round_robin(rule_id, expected, next)
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, StoreError> {
        self.inner.student(id)
    }
}
