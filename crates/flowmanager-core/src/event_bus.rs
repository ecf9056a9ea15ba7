//! EventBus - named-signal dispatch with per-run aggregate signals.
//!
//! Every firing carries the [`RunId`] of the run it belongs to and zero or
//! more JSON arguments. Listeners are plain synchronous callbacks; anything
//! slow (remote calls) must be spawned by the listener itself.
//!
//! Aggregate signals fire once per run when all of their constituent
//! signals have fired for that run since the aggregate last fired for it.
//!
//! Dispatch policy:
//! - Listeners run in registration order, outside of any lock, so a
//!   listener may fire, subscribe or define aggregates reentrantly.
//! - A panicking listener is logged and skipped; the remaining listeners
//!   still run.
//! - Aggregates are updated after the signal's own listeners have run.

use crate::barrier::JoinBarrier;
use crate::error::{Error, Result};
use crate::pipeline::RunId;
use serde_json::Value;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, trace};

/// Callback invoked with the run id and the firing's arguments.
pub type Listener = Arc<dyn Fn(RunId, &[Value]) + Send + Sync>;

/// Declaration of an aggregate signal.
///
/// ```ignore
/// let spec = AggregateSpec::new("onReadyToMatch")
///     .constituent("userPreferences", "onUserPreferences")
///     .constituent("device", "onDevice")
///     .forward("userPreferences", 0)
///     .forward("device", 0);
/// bus.define_aggregate(spec)?;
/// ```
#[derive(Debug, Clone)]
pub struct AggregateSpec {
    name: String,
    constituents: Vec<(String, String)>,
    forward: Vec<(String, usize)>,
}

impl AggregateSpec {
    /// Start declaring the aggregate `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constituents: Vec::new(),
            forward: Vec::new(),
        }
    }

    /// Add a constituent called `name`, satisfied by firings of `source`.
    #[must_use]
    pub fn constituent(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.constituents.push((name.into(), source.into()));
        self
    }

    /// Forward argument `index` of `constituent`'s latest firing, in
    /// declaration order. Missing arguments are forwarded as `null`.
    #[must_use]
    pub fn forward(mut self, constituent: impl Into<String>, index: usize) -> Self {
        self.forward.push((constituent.into(), index));
        self
    }

    fn validate(&self) -> Result<()> {
        if self.constituents.is_empty() {
            return Err(Error::Configuration(format!(
                "aggregate '{}' has no constituents",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for (name, _) in &self.constituents {
            if !seen.insert(name.as_str()) {
                return Err(Error::Configuration(format!(
                    "aggregate '{}' declares constituent '{}' twice",
                    self.name, name
                )));
            }
        }

        if let Some((unknown, _)) = self.forward.iter().find(|(c, _)| !seen.contains(c.as_str())) {
            return Err(Error::Configuration(format!(
                "aggregate '{}' forwards unknown constituent '{}'",
                self.name, unknown
            )));
        }

        Ok(())
    }
}

struct Aggregate {
    name: String,
    constituents: Vec<(String, String)>,
    forward: Vec<(String, usize)>,
    barrier: JoinBarrier<Vec<Value>>,
}

impl Aggregate {
    fn fed_by<'a>(&'a self, signal: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.constituents
            .iter()
            .filter(move |(_, source)| source == signal)
            .map(|(name, _)| name.as_str())
    }

    fn forwarded(&self, arrived: &HashMap<String, Vec<Value>>) -> Vec<Value> {
        self.forward
            .iter()
            .map(|(constituent, index)| {
                arrived
                    .get(constituent)
                    .and_then(|args| args.get(*index))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

/// In-process publish/subscribe bus with named signals.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    aggregates: RwLock<Vec<Arc<Aggregate>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `signal`.
    pub fn subscribe<F>(&self, signal: &str, listener: F)
    where
        F: Fn(RunId, &[Value]) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners
            .entry(signal.to_string())
            .or_default()
            .push(Arc::new(listener));
        debug!(signal, "Listener registered");
    }

    /// Declare an aggregate signal.
    pub fn define_aggregate(&self, spec: AggregateSpec) -> Result<()> {
        spec.validate()?;

        let mut aggregates = self.aggregates.write().unwrap_or_else(PoisonError::into_inner);
        if aggregates.iter().any(|a| a.name == spec.name) {
            return Err(Error::Configuration(format!(
                "aggregate '{}' is already defined",
                spec.name
            )));
        }

        let barrier = JoinBarrier::new(spec.constituents.iter().map(|(name, _)| name.clone()));
        debug!(aggregate = %spec.name, constituents = spec.constituents.len(), "Aggregate defined");
        aggregates.push(Arc::new(Aggregate {
            name: spec.name,
            constituents: spec.constituents,
            forward: spec.forward,
            barrier,
        }));
        Ok(())
    }

    /// Fire `signal` for `run`.
    pub fn fire(&self, signal: &str, run: RunId, args: Vec<Value>) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signal)
            .cloned()
            .unwrap_or_default();

        trace!(signal, run_id = %run, listeners = listeners.len(), "Firing");

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(run, args.as_slice()))) {
                error!(
                    signal,
                    run_id = %run,
                    panic = %panic_message(panic.as_ref()),
                    "Listener panicked"
                );
            }
        }

        for aggregate in self.aggregates_fed_by(signal) {
            for constituent in aggregate.fed_by(signal) {
                if let Some(arrived) = aggregate.barrier.arrive(run, constituent, args.clone()) {
                    debug!(aggregate = %aggregate.name, run_id = %run, "Aggregate complete");
                    self.fire(&aggregate.name, run, aggregate.forwarded(&arrived));
                }
            }
        }
    }

    /// Report that the producer of `signal` failed for `run`.
    ///
    /// Aggregates fed by `signal` will not fire for `run`, and drop their
    /// partial state for it once every other constituent has settled.
    /// Returns `true` if no earlier failure was recorded for the run.
    pub fn retire(&self, signal: &str, run: RunId) -> bool {
        let mut first = true;
        for aggregate in self.aggregates_fed_by(signal) {
            for constituent in aggregate.fed_by(signal) {
                first &= aggregate.barrier.retire(run, constituent);
            }
        }
        first
    }

    /// Number of listeners registered for `signal`.
    pub fn listener_count(&self, signal: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signal)
            .map_or(0, Vec::len)
    }

    /// Runs holding partial aggregate state, summed over all aggregates.
    pub fn pending_joins(&self) -> usize {
        self.aggregates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|a| a.barrier.pending_len())
            .sum()
    }

    fn aggregates_fed_by(&self, signal: &str) -> Vec<Arc<Aggregate>> {
        self.aggregates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| a.fed_by(signal).next().is_some())
            .cloned()
            .collect()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
