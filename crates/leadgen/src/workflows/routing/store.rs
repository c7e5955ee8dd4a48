use super::domain::{RoundRobinState, RuleId, RuleSnapshot, RuleType, Student, StudentId};

/// Read/update contract the routing engine needs from the backing record store.
pub trait RuleStore: Send + Sync {
    /// Active rule for `(rule_type, match_value)` with its targets joined to students,
    /// ordered by priority, plus its round-robin cursor. `match_value` is already uppercased.
    fn find_active_rule(
        &self,
        rule_type: RuleType,
        match_value: &str,
    ) -> Result<Option<RuleSnapshot>, StoreError>;

    fn round_robin_state(&self, rule_id: &RuleId) -> Result<Option<RoundRobinState>, StoreError>;

    /// Atomically move the cursor from `expected` to `next`.
    ///
    /// `expected == None` means "no state exists yet" and creates it. Returns `false`
    /// without writing when another writer got there first.
    fn compare_and_swap_round_robin(
        &self,
        rule_id: &RuleId,
        expected: Option<i64>,
        next: i64,
    ) -> Result<bool, StoreError>;

    fn student(&self, id: &StudentId) -> Result<Option<Student>, StoreError>;
}

/// Slug lookups used by tenant subdomains.
pub trait StudentDirectory: Send + Sync {
    fn student_by_slug(&self, slug: &str) -> Result<Option<Student>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
    #[error("round-robin cursor for rule {rule_id} kept changing after {attempts} attempts")]
    Contention { rule_id: RuleId, attempts: u8 },
}
