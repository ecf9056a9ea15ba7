//! Per-run join barrier.
//!
//! Holds the values that have arrived for each run until every required
//! constituent is present, then hands them out exactly once and forgets the
//! run. A constituent can also be *retired* (its producer failed); a run
//! with a retired constituent never completes, and its entry is dropped as
//! soon as every constituent has either arrived or been retired.

use crate::pipeline::RunId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct Pending<T> {
    arrived: HashMap<String, T>,
    retired: HashSet<String>,
}

impl<T> Default for Pending<T> {
    fn default() -> Self {
        Self {
            arrived: HashMap::new(),
            retired: HashSet::new(),
        }
    }
}

/// Barrier keyed by [`RunId`].
#[derive(Debug)]
pub struct JoinBarrier<T> {
    required: Vec<String>,
    pending: DashMap<RunId, Pending<T>>,
}

impl<T> JoinBarrier<T> {
    /// Create a barrier waiting on `required` constituent names.
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            pending: DashMap::new(),
        }
    }

    /// Constituent names this barrier waits on.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Number of runs with partial state.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn settled(&self, pending: &Pending<T>) -> bool {
        self.required
            .iter()
            .all(|c| pending.arrived.contains_key(c) || pending.retired.contains(c))
    }

    /// Record `value` for `constituent` in `run`.
    ///
    /// A later arrival of the same constituent replaces the earlier value.
    /// Returns every constituent's value once the set is complete, resetting
    /// the run. Unknown constituents are ignored.
    pub fn arrive(&self, run: RunId, constituent: &str, value: T) -> Option<HashMap<String, T>> {
        if !self.required.iter().any(|c| c == constituent) {
            return None;
        }

        match self.pending.entry(run) {
            Entry::Occupied(mut occupied) => {
                let pending = occupied.get_mut();
                pending.arrived.insert(constituent.to_string(), value);

                if !pending.retired.is_empty() {
                    if self.settled(pending) {
                        occupied.remove();
                    }
                    return None;
                }

                if pending.arrived.len() == self.required.len() {
                    return Some(occupied.remove().arrived);
                }
                None
            }
            Entry::Vacant(vacant) => {
                let mut arrived = HashMap::new();
                arrived.insert(constituent.to_string(), value);
                if self.required.len() == 1 {
                    return Some(arrived);
                }
                vacant.insert(Pending {
                    arrived,
                    retired: HashSet::new(),
                });
                None
            }
        }
    }

    /// Mark `constituent` as failed for `run`. The run will never complete.
    ///
    /// Returns `true` if this is the first retirement recorded for the run.
    pub fn retire(&self, run: RunId, constituent: &str) -> bool {
        if !self.required.iter().any(|c| c == constituent) {
            return true;
        }

        match self.pending.entry(run) {
            Entry::Occupied(mut occupied) => {
                let pending = occupied.get_mut();
                let first = pending.retired.is_empty();
                pending.arrived.remove(constituent);
                pending.retired.insert(constituent.to_string());
                if self.settled(pending) {
                    occupied.remove();
                }
                first
            }
            Entry::Vacant(vacant) => {
                if self.required.len() > 1 {
                    let mut pending = Pending::default();
                    pending.retired.insert(constituent.to_string());
                    vacant.insert(pending);
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barrier() -> JoinBarrier<i32> {
        JoinBarrier::new(["userPreferences", "device"])
    }

    #[test]
    fn test_completes_in_either_order() {
        let b = barrier();

        let run = RunId::new();
        assert!(b.arrive(run, "userPreferences", 1).is_none());
        let done = b.arrive(run, "device", 2).unwrap();
        assert_eq!(done["userPreferences"], 1);
        assert_eq!(done["device"], 2);

        let run = RunId::new();
        assert!(b.arrive(run, "device", 2).is_none());
        let done = b.arrive(run, "userPreferences", 1).unwrap();
        assert_eq!(done["userPreferences"], 1);
        assert_eq!(done["device"], 2);

        assert_eq!(b.pending_len(), 0);
    }

    #[test]
    fn test_latest_value_wins() {
        let b = barrier();
        let run = RunId::new();
        b.arrive(run, "device", 1);
        b.arrive(run, "device", 7);
        let done = b.arrive(run, "userPreferences", 0).unwrap();
        assert_eq!(done["device"], 7);
    }

    #[test]
    fn test_resets_after_completion() {
        let b = barrier();
        let run = RunId::new();
        b.arrive(run, "device", 1);
        assert!(b.arrive(run, "userPreferences", 1).is_some());

        // Same run id again needs both constituents again
        assert!(b.arrive(run, "device", 2).is_none());
        assert!(b.arrive(run, "userPreferences", 2).is_some());
    }

    #[test]
    fn test_runs_are_isolated() {
        let b = barrier();
        let run_a = RunId::new();
        let run_b = RunId::new();

        assert!(b.arrive(run_a, "userPreferences", 10).is_none());
        assert!(b.arrive(run_b, "device", 20).is_none());
        assert_eq!(b.pending_len(), 2);

        let done_b = b.arrive(run_b, "userPreferences", 21).unwrap();
        assert_eq!((done_b["userPreferences"], done_b["device"]), (21, 20));

        let done_a = b.arrive(run_a, "device", 11).unwrap();
        assert_eq!((done_a["userPreferences"], done_a["device"]), (10, 11));
    }

    #[test]
    fn test_unknown_constituent_ignored() {
        let b = barrier();
        let run = RunId::new();
        assert!(b.arrive(run, "match", 1).is_none());
        assert_eq!(b.pending_len(), 0);
    }

    #[test]
    fn test_retire_blocks_completion_and_cleans_up() {
        let b = barrier();
        let run = RunId::new();

        assert!(b.retire(run, "userPreferences"));
        assert_eq!(b.pending_len(), 1);

        assert!(b.arrive(run, "device", 5).is_none());
        assert_eq!(b.pending_len(), 0);
    }

    #[test]
    fn test_retire_after_arrival() {
        let b = barrier();
        let run = RunId::new();

        assert!(b.arrive(run, "device", 5).is_none());
        assert!(b.retire(run, "userPreferences"));
        assert_eq!(b.pending_len(), 0);
    }

    #[test]
    fn test_second_retire_is_not_first() {
        let b = barrier();
        let run = RunId::new();

        assert!(b.retire(run, "device"));
        assert!(!b.retire(run, "userPreferences"));
        assert_eq!(b.pending_len(), 0);
    }

    #[test]
    fn test_single_constituent_barrier() {
        let b: JoinBarrier<&str> = JoinBarrier::new(["only"]);
        let run = RunId::new();
        let done = b.arrive(run, "only", "x").unwrap();
        assert_eq!(done["only"], "x");
        assert!(b.retire(run, "only"));
        assert_eq!(b.pending_len(), 0);
    }
}
