use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{RoundRobinState, RuleId, RuleSnapshot, RuleType, Student, StudentId};
use super::store::{RuleStore, StoreError};

/// Read-through wrapper whose cursor writes stay in a private overlay.
///
/// Used for diagnostic routing so inspecting a postcode never changes which
/// student the next real lead rotates to.
pub struct SandboxStore<'a, S: ?Sized> {
    inner: &'a S,
    cursors: Mutex<HashMap<RuleId, i64>>,
}

impl<'a, S: RuleStore + ?Sized> SandboxStore<'a, S> {
    pub fn new(inner: &'a S) -> Self {
        Self {
            inner,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Cursor positions the sandboxed run would have written.
    pub fn pending_cursors(&self) -> Result<HashMap<RuleId, i64>, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn overlay(&self, rule_id: &RuleId) -> Result<Option<i64>, StoreError> {
        Ok(self.lock()?.get(rule_id).copied())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<RuleId, i64>>, StoreError> {
        self.cursors
            .lock()
            .map_err(|_| StoreError::Unavailable("sandbox lock poisoned".to_string()))
    }
}

impl<S: RuleStore + ?Sized> RuleStore for SandboxStore<'_, S> {
    fn find_active_rule(
        &self,
        rule_type: RuleType,
        match_value: &str,
    ) -> Result<Option<RuleSnapshot>, StoreError> {
        let Some(mut snapshot) = self.inner.find_active_rule(rule_type, match_value)? else {
            return Ok(None);
        };

        if let Some(index) = self.overlay(&snapshot.rule.id)? {
            snapshot.round_robin = Some(RoundRobinState {
                rule_id: snapshot.rule.id.clone(),
                last_assigned_index: index,
            });
        }
        Ok(Some(snapshot))
    }

    fn round_robin_state(&self, rule_id: &RuleId) -> Result<Option<RoundRobinState>, StoreError> {
        match self.overlay(rule_id)? {
            Some(index) => Ok(Some(RoundRobinState {
                rule_id: rule_id.clone(),
                last_assigned_index: index,
            })),
            None => self.inner.round_robin_state(rule_id),
        }
    }

    fn compare_and_swap_round_robin(
        &self,
        rule_id: &RuleId,
        expected: Option<i64>,
        next: i64,
    ) -> Result<bool, StoreError> {
        let current = self.round_robin_state(rule_id)?.map(|state| state.last_assigned_index);
        if current != expected {
            return Ok(false);
        }

        self.lock()?.insert(rule_id.clone(), next);
        Ok(true)
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, StoreError> {
        self.inner.student(id)
    }
}
