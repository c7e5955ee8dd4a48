use tracing::debug;

use super::domain::{ResolvedTarget, RoutingStrategy, RuleSnapshot, Student, NO_ASSIGNMENT_YET};
use super::store::{RuleStore, StoreError};
use super::trace::{SkipReason, TriedRule};

/// Pick one eligible student from a rule, appending exactly one trace entry.
///
/// Round-robin rules advance their cursor through a compare-and-swap; a lost race
/// re-reads the cursor and retries up to `cursor_attempts` times.
pub fn select_student<S: RuleStore + ?Sized>(
    store: &S,
    snapshot: &RuleSnapshot,
    cursor_attempts: u8,
    tried: &mut Vec<TriedRule>,
) -> Result<Option<Student>, StoreError> {
    let mut active: Vec<&ResolvedTarget> = snapshot
        .targets
        .iter()
        .filter(|target| target.is_active)
        .collect();
    active.sort_by_key(|target| target.priority);

    if active.is_empty() {
        tried.push(TriedRule::from_snapshot(
            snapshot,
            Some(SkipReason::NoActiveTargets),
        ));
        return Ok(None);
    }

    match snapshot.rule.strategy {
        RoutingStrategy::Priority => Ok(pick_by_priority(snapshot, &active, tried)),
        RoutingStrategy::RoundRobin => {
            pick_round_robin(store, snapshot, &active, cursor_attempts, tried)
        }
    }
}

fn pick_by_priority(
    snapshot: &RuleSnapshot,
    active: &[&ResolvedTarget],
    tried: &mut Vec<TriedRule>,
) -> Option<Student> {
    match active.iter().find(|target| target.student.is_eligible()) {
        Some(target) => {
            tried.push(TriedRule::from_snapshot(snapshot, None));
            Some(target.student.clone())
        }
        None => {
            tried.push(TriedRule::from_snapshot(
                snapshot,
                Some(SkipReason::AllTargetsUnavailable),
            ));
            None
        }
    }
}

fn pick_round_robin<S: RuleStore + ?Sized>(
    store: &S,
    snapshot: &RuleSnapshot,
    active: &[&ResolvedTarget],
    cursor_attempts: u8,
    tried: &mut Vec<TriedRule>,
) -> Result<Option<Student>, StoreError> {
    // `active` is sorted, so the tie group is its leading run
    let min_priority = active[0].priority;
    let eligible: Vec<&Student> = active
        .iter()
        .take_while(|target| target.priority == min_priority)
        .map(|target| &target.student)
        .filter(|student| student.is_eligible())
        .collect();

    if eligible.is_empty() {
        tried.push(TriedRule::from_snapshot(
            snapshot,
            Some(SkipReason::AllTiedTargetsUnavailable),
        ));
        return Ok(None);
    }

    let rule_id = &snapshot.rule.id;
    let attempts = cursor_attempts.max(1);
    let mut observed = snapshot
        .round_robin
        .as_ref()
        .map(|state| state.last_assigned_index);

    for attempt in 1..=attempts {
        let next = next_index(observed, eligible.len());
        let swapped = match store.compare_and_swap_round_robin(rule_id, observed, next) {
            Ok(swapped) => swapped,
            Err(err) => return Err(cursor_failure(snapshot, err, tried)),
        };

        if swapped {
            tried.push(TriedRule::from_snapshot(snapshot, None));
            // next < eligible.len() by construction
            return Ok(Some(eligible[next as usize].clone()));
        }

        debug!(rule = %rule_id, attempt, "round-robin cursor moved underneath us; re-reading");
        observed = match store.round_robin_state(rule_id) {
            Ok(state) => state.map(|state| state.last_assigned_index),
            Err(err) => return Err(cursor_failure(snapshot, err, tried)),
        };
    }

    let err = StoreError::Contention {
        rule_id: rule_id.clone(),
        attempts,
    };
    Err(cursor_failure(snapshot, err, tried))
}

fn cursor_failure(
    snapshot: &RuleSnapshot,
    err: StoreError,
    tried: &mut Vec<TriedRule>,
) -> StoreError {
    tried.push(TriedRule::from_snapshot(
        snapshot,
        Some(SkipReason::CursorUpdateFailed(err.to_string())),
    ));
    err
}

/// `(last + 1) mod group_size`, treating a missing cursor as `-1`.
pub(crate) fn next_index(last: Option<i64>, group_size: usize) -> i64 {
    let last = last.unwrap_or(NO_ASSIGNMENT_YET);
    last.saturating_add(1).rem_euclid(group_size as i64)
}
