//! Process-wide game counters.
//!
//! Per-action counts live in a map keyed by action label; deaths and completions are plain
//! atomics. The CLI `play` loop logs a [`snapshot`] when it exits.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

static DEATHS: AtomicU64 = AtomicU64::new(0);
static COMPLETIONS: AtomicU64 = AtomicU64::new(0);

static ACTION_COUNTERS: OnceLock<Mutex<HashMap<String, ActionCounter>>> = OnceLock::new();

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActionCounter {
    pub submitted: u64,
    pub succeeded: u64,
    pub rejected: u64,
    /// Refused locally before any remote call.
    pub blocked: u64,
}

fn action_counter_lock() -> &'static Mutex<HashMap<String, ActionCounter>> {
    ACTION_COUNTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn update_action(action: &str, f: impl FnOnce(&mut ActionCounter)) -> ActionCounter {
    let mut guard = action_counter_lock()
        .lock()
        .expect("action counter mutex poisoned");
    let counter = guard.entry(action.to_string()).or_default();
    f(counter);
    *counter
}

pub fn record_submitted(action: &str) -> ActionCounter {
    update_action(action, |c| c.submitted = c.submitted.saturating_add(1))
}

pub fn record_succeeded(action: &str) -> ActionCounter {
    update_action(action, |c| c.succeeded = c.succeeded.saturating_add(1))
}

pub fn record_rejected(action: &str) -> ActionCounter {
    update_action(action, |c| c.rejected = c.rejected.saturating_add(1))
}

pub fn record_blocked(action: &str) -> ActionCounter {
    update_action(action, |c| c.blocked = c.blocked.saturating_add(1))
}

pub fn inc_deaths() {
    DEATHS.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_completions() {
    COMPLETIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn action_counters_snapshot() -> HashMap<String, ActionCounter> {
    action_counter_lock()
        .lock()
        .expect("action counter mutex poisoned")
        .clone()
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub actions: HashMap<String, ActionCounter>,
    pub deaths: u64,
    pub completions: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        actions: action_counters_snapshot(),
        deaths: DEATHS.load(Ordering::Relaxed),
        completions: COMPLETIONS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_counters_accumulate_per_label() {
        // unique label so parallel tests do not interfere
        let label = "metrics-test-action";
        let first = record_submitted(label);
        assert!(first.submitted >= 1);
        record_succeeded(label);
        record_rejected(label);
        let after = record_blocked(label);
        assert_eq!(after.submitted, first.submitted);
        assert!(after.succeeded >= 1 && after.rejected >= 1 && after.blocked >= 1);

        let snap = snapshot();
        assert!(snap.actions.contains_key(label));
    }

    #[test]
    fn death_and_completion_counters_increase() {
        let before = snapshot();
        inc_deaths();
        inc_completions();
        let after = snapshot();
        assert!(after.deaths > before.deaths);
        assert!(after.completions > before.completions);
    }
}
