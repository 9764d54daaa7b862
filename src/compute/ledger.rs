//! The evaluation cache and the error type of the evaluation phase.
use super::population::{EntityInstance, PopulationError};
use crate::period::{Period, PeriodError, PeriodUnit};
use crate::store::EntityError;
use crate::type_system::{Value, ValueType};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Variable '{variable}' is defined on '{expected}', not on '{found}'")]
    EntityMismatch { variable: String, expected: String, found: String },
    #[error("Variable '{variable}' is defined per {definition_period} and cannot be evaluated for {period}")]
    IncompatiblePeriod { variable: String, period: Period, definition_period: PeriodUnit },
    #[error("Variable '{variable}' is defined per {definition_period} and has no rule to reconcile it over {period}")]
    AmbiguousAggregation { variable: String, period: Period, definition_period: PeriodUnit },
    #[error("Variable '{variable}' has no formula in force on {period}")]
    NoApplicableFormula { variable: String, period: Period },
    #[error("Circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },
    #[error("Variable '{variable}' holds {expected} values, got {found}")]
    ValueTypeMismatch { variable: String, expected: ValueType, found: ValueType },
    #[error("Variable '{variable}' holds {value_type} values, which cannot be summed or divided")]
    NonNumericAggregation { variable: String, value_type: ValueType },
    #[error("Input for '{variable}' over {period} does not fit its {definition_period} definition period")]
    InputPeriodMismatch { variable: String, period: Period, definition_period: PeriodUnit },
    #[error("Integer arithmetic on '{variable}' overflows")]
    Overflow { variable: String },
    #[error("Evaluation of '{variable}' exceeds the maximum depth of {depth}")]
    MaxDepthExceeded { variable: String, depth: usize },
    #[error("Evaluation aborted")]
    Aborted,
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error(transparent)]
    Population(#[from] PopulationError),
    #[error(transparent)]
    Entity(#[from] EntityError),
    /// Raised by formula bodies for domain failures of their own.
    #[error("{0}")]
    Custom(String),
}

/// Identity of one cached value: a variable, the instance it describes, and a
/// period already normalized to the variable's definition period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub variable: String,
    pub instance: EntityInstance,
    pub period: Period,
}

impl CacheKey {
    pub fn new(variable: impl Into<String>, instance: &EntityInstance, period: Period) -> Self {
        Self { variable: variable.into(), instance: instance.clone(), period }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>@{}", self.variable, self.instance, self.period)
    }
}

/// Identifies one top-level evaluation and every nested call it makes.
pub type RequestId = u64;

#[derive(Debug, Clone)]
enum Slot {
    InFlight(RequestId),
    Ready(Value),
}

#[derive(Debug, Default)]
struct State {
    slots: HashMap<CacheKey, Slot>,
    /// Request -> key it is blocked on.
    waiting: HashMap<RequestId, CacheKey>,
    /// Request -> nested requests it is blocked on until they return.
    children: HashMap<RequestId, Vec<RequestId>>,
}

impl State {
    /// Walks the wait-for graph from `owner`, through blocked keys and
    /// nested requests. Waiting on `owner` would deadlock if `request` is reachable.
    fn leads_back_to(&self, request: RequestId, owner: RequestId) -> bool {
        let mut pending = vec![owner];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if current == request {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(Slot::InFlight(next)) = self.waiting.get(&current).and_then(|key| self.slots.get(key)) {
                pending.push(*next);
            }
            if let Some(children) = self.children.get(&current) {
                pending.extend(children.iter().copied());
            }
        }
        false
    }
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub waits: u64,
    pub cycles: u64,
    pub input_reads: u64,
    pub ready: usize,
    pub inputs: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    waits: AtomicU64,
    cycles: AtomicU64,
    input_reads: AtomicU64,
}

/// Outcome of asking the ledger for a key.
pub(crate) enum Claim<'a> {
    Hit(Value),
    /// The caller now owns the key and must compute it.
    Compute(Reservation<'a>),
    /// The key is already being computed by this request, or by a request
    /// that is itself waiting on this one.
    Cycle,
}

/// Exclusive right to compute one key. Dropping it without completing
/// releases the key so waiting requests can retry.
pub(crate) struct Reservation<'a> {
    ledger: &'a Ledger,
    key: CacheKey,
    settled: bool,
}

impl Reservation<'_> {
    pub(crate) fn complete(mut self, value: Value) {
        let mut state = self.ledger.lock();
        state.slots.insert(self.key.clone(), Slot::Ready(value));
        self.settled = true;
        drop(state);
        self.ledger.ready.notify_all();
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.ledger.lock();
        if matches!(state.slots.get(&self.key), Some(Slot::InFlight(_))) {
            state.slots.remove(&self.key);
        }
        drop(state);
        self.ledger.ready.notify_all();
    }
}

/// Marks `parent` as blocked on a nested request until dropped.
pub(crate) struct Adoption<'a> {
    ledger: &'a Ledger,
    parent: RequestId,
    child: RequestId,
}

impl Drop for Adoption<'_> {
    fn drop(&mut self) {
        let mut state = self.ledger.lock();
        if let Some(children) = state.children.get_mut(&self.parent) {
            children.retain(|c| *c != self.child);
            if children.is_empty() {
                state.children.remove(&self.parent);
            }
        }
    }
}

/// Memoized results shared by every request of a resolver.
///
/// Each key is computed at most once: the first request to claim it
/// computes, concurrent requests for the same key block until the value is
/// ready. Inputs live apart from computed values and survive `reset`.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<State>,
    ready: Condvar,
    inputs: RwLock<HashMap<CacheKey, Value>>,
    counters: Counters,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Slots are only ever replaced whole, so a poisoned lock holds consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn claim(&self, key: &CacheKey, request: RequestId) -> Claim<'_> {
        let mut state = self.lock();
        loop {
            let owner = match state.slots.get(key) {
                None => {
                    state.slots.insert(key.clone(), Slot::InFlight(request));
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    return Claim::Compute(Reservation { ledger: self, key: key.clone(), settled: false });
                }
                Some(Slot::Ready(value)) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Claim::Hit(value.clone());
                }
                Some(Slot::InFlight(owner)) => *owner,
            };
            if state.leads_back_to(request, owner) {
                self.counters.cycles.fetch_add(1, Ordering::Relaxed);
                return Claim::Cycle;
            }
            self.counters.waits.fetch_add(1, Ordering::Relaxed);
            state.waiting.insert(request, key.clone());
            state = self.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
            state.waiting.remove(&request);
        }
    }

    /// Records that `parent` cannot progress until `child` returns, so that
    /// `child` waiting on a key held by `parent` is reported as a cycle.
    pub(crate) fn adopt(&self, parent: RequestId, child: RequestId) -> Adoption<'_> {
        self.lock().children.entry(parent).or_default().push(child);
        Adoption { ledger: self, parent, child }
    }

    /// A computed value, if ready.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        match self.lock().slots.get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn input(&self, key: &CacheKey) -> Option<Value> {
        let value = self.inputs.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned();
        if value.is_some() {
            self.counters.input_reads.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    pub fn set_input(&self, key: CacheKey, value: Value) {
        self.inputs.write().unwrap_or_else(PoisonError::into_inner).insert(key, value);
    }

    /// Drops every computed value. In-flight computations and inputs are kept.
    pub fn reset(&self) -> usize {
        let mut state = self.lock();
        let before = state.slots.len();
        state.slots.retain(|_, slot| matches!(slot, Slot::InFlight(_)));
        before - state.slots.len()
    }

    pub fn stats(&self) -> CacheStats {
        let ready = self.lock().slots.values().filter(|s| matches!(s, Slot::Ready(_))).count();
        let inputs = self.inputs.read().unwrap_or_else(PoisonError::into_inner).len();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            waits: self.counters.waits.load(Ordering::Relaxed),
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            input_reads: self.counters.input_reads.load(Ordering::Relaxed),
            ready,
            inputs,
        }
    }
}
