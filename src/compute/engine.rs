//! Resolution of variables for an instance and a period.
//!
//! A `Resolver` owns the evaluation cache and the runtime switches of a
//! simulation. Every `evaluate` opens a `Scope`, which formulas use to
//! request the values they depend on. The scope keeps the chain of keys
//! being computed so that re-entering one of them is reported as a cycle.
//!
//! A formula may also call back into the `Resolver` itself, directly or
//! through `evaluate_many`. Such a call opens a nested request that inherits
//! the caller's chain of keys, and the ledger records that the caller is
//! blocked on it.
use super::ledger::{CacheKey, CacheStats, Claim, EvaluationError, Ledger, RequestId};
use super::population::{EntityInstance, Membership, PopulationProvider};
use super::reconcile;
use crate::config::ResolverConfig;
use crate::period::{Period, PeriodUnit};
use crate::store::{CalculateOutputPolicy, EntityError, Variable, VariableCatalog};
use crate::type_system::Value;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// A top-level evaluation request, for batch evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub variable: String,
    pub instance: EntityInstance,
    pub period: Period,
}

impl Request {
    pub fn new(variable: impl Into<String>, instance: EntityInstance, period: Period) -> Self {
        Self { variable: variable.into(), instance, period }
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Computed by the formula version starting on that date.
    Formula(NaiveDate),
    Cache,
    Input,
    /// Input variable without a value for this key.
    Default,
}

/// One line of the computation log.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// Top-level request, shared by the requests nested in it.
    pub request: RequestId,
    pub depth: usize,
    pub key: CacheKey,
    /// The key whose formula asked for this one.
    pub parent: Option<CacheKey>,
    pub source: Source,
    /// Missing if the computation failed.
    pub value: Option<Value>,
}

/// How a requested period maps onto definition periods.
#[derive(Debug, PartialEq)]
enum Plan {
    Single(Period),
    Aggregate { parts: Vec<Period>, policy: CalculateOutputPolicy },
    Prorate { enclosing: Period, numerator: u32, denominator: u32 },
}

fn plan(variable: &Variable, period: &Period) -> Result<Plan, EvaluationError> {
    let definition = variable.definition_period;
    let incompatible = || EvaluationError::IncompatiblePeriod {
        variable: variable.name.clone(),
        period: *period,
        definition_period: definition,
    };
    let ambiguous = || EvaluationError::AmbiguousAggregation {
        variable: variable.name.clone(),
        period: *period,
        definition_period: definition,
    };

    if definition == PeriodUnit::Eternity {
        return Ok(Plan::Single(Period::eternity()));
    }
    if period.is_eternity() {
        return Err(incompatible());
    }
    if period.unit() == definition && period.size() == 1 {
        return Ok(Plan::Single(*period));
    }

    // Coarser (or several definition periods long): decompose.
    if !period.unit().is_finer_than(definition) {
        let mut parts = period.subperiods(definition)?;
        if parts.len() == 1 {
            return Ok(Plan::Single(parts.remove(0)));
        }
        return match variable.calculate_output {
            Some(policy) => Ok(Plan::Aggregate { parts, policy }),
            None => Err(ambiguous()),
        };
    }

    // Finer: only a share of one definition period.
    let enclosing = period.enclosing(definition).map_err(|_| incompatible())?;
    if variable.is_period_size_independent {
        return Ok(Plan::Single(enclosing));
    }
    match variable.calculate_output {
        Some(CalculateOutputPolicy::Divide) => Ok(Plan::Prorate {
            enclosing,
            numerator: period.size(),
            denominator: enclosing.size_in(period.unit())?,
        }),
        Some(CalculateOutputPolicy::Add) => Err(ambiguous()),
        None => Err(incompatible()),
    }
}

fn is_past_end(variable: &Variable, period: &Period) -> bool {
    variable.end.is_some_and(|end| period.start() > end)
}

/// Evaluates variables against a catalog and a population, memoizing every result.
///
/// A resolver is shared across threads: identical keys requested concurrently
/// are computed once, the other callers waiting for the result.
pub struct Resolver {
    catalog: Arc<VariableCatalog>,
    population: Arc<dyn PopulationProvider>,
    config: ResolverConfig,
    ledger: Ledger,
    neutralized: RwLock<HashSet<String>>,
    aborted: AtomicBool,
    next_request: AtomicU64,
    log: Mutex<Vec<TraceEntry>>,
}

impl Resolver {
    pub fn new(catalog: Arc<VariableCatalog>, population: Arc<dyn PopulationProvider>) -> Self {
        Self::with_config(catalog, population, ResolverConfig::default())
    }

    pub fn with_config(
        catalog: Arc<VariableCatalog>,
        population: Arc<dyn PopulationProvider>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            catalog,
            population,
            config,
            ledger: Ledger::new(),
            neutralized: RwLock::new(HashSet::new()),
            aborted: AtomicBool::new(false),
            next_request: AtomicU64::new(1),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &VariableCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn variable(&self, name: &str) -> Result<&Arc<Variable>, EvaluationError> {
        self.catalog.get(name).ok_or_else(|| EvaluationError::UnknownVariable(name.to_string()))
    }

    /// From now on `name` evaluates to its default value, whatever its formulas or inputs.
    pub fn neutralize(&self, name: &str) -> Result<(), EvaluationError> {
        self.variable(name)?;
        tracing::debug!(variable = name, "neutralizing variable");
        self.neutralized.write().unwrap_or_else(PoisonError::into_inner).insert(name.to_string());
        Ok(())
    }

    pub fn is_neutralized(&self, name: &str) -> bool {
        self.neutralized.read().unwrap_or_else(PoisonError::into_inner).contains(name)
    }

    /// Stores an externally supplied value.
    ///
    /// A period spanning several definition periods is spread with the
    /// variable's `set_input` policy. Values already computed from an older
    /// input are not invalidated; call `reset_cache` for that.
    pub fn set_input(
        &self,
        name: &str,
        instance: &EntityInstance,
        period: &Period,
        value: Value,
    ) -> Result<(), EvaluationError> {
        let variable = self.variable(name)?;
        check_entity(variable, instance)?;
        if !variable.accepts(&value) {
            return Err(EvaluationError::ValueTypeMismatch {
                variable: variable.name.clone(),
                expected: variable.value_type,
                found: value.value_type(),
            });
        }

        let definition = variable.definition_period;
        let mismatch = || EvaluationError::InputPeriodMismatch {
            variable: variable.name.clone(),
            period: *period,
            definition_period: definition,
        };
        let targets: Vec<(Period, Value)> = if definition == PeriodUnit::Eternity {
            vec![(Period::eternity(), value)]
        } else if period.is_eternity() || period.unit().is_finer_than(definition) {
            return Err(mismatch());
        } else {
            let parts = period.subperiods(definition)?;
            if parts.len() == 1 {
                parts.into_iter().map(|p| (p, value.clone())).collect()
            } else {
                let policy = variable.set_input.ok_or_else(mismatch)?;
                let values = reconcile::split(variable, &value, parts.len(), policy)?;
                parts.into_iter().zip(values).collect()
            }
        };

        tracing::debug!(variable = name, %instance, %period, parts = targets.len(), "storing input");
        for (part, value) in targets {
            self.ledger.set_input(CacheKey::new(name, instance, part), value);
        }
        Ok(())
    }

    /// Evaluates `name` for `instance` over `period`.
    ///
    /// Called from a formula of this resolver, the evaluation is part of the
    /// running request.
    pub fn evaluate(&self, name: &str, instance: &EntityInstance, period: &Period) -> Result<Value, EvaluationError> {
        let parent = Lineage::current(self);
        self.start(parent.as_ref(), name, instance, period)
    }

    /// Evaluates independent requests in parallel. Results are in request order.
    pub fn evaluate_many(&self, requests: &[Request]) -> Vec<Result<Value, EvaluationError>> {
        let parent = Lineage::current(self);
        requests
            .par_iter()
            .map(|r| self.start(parent.as_ref(), &r.variable, &r.instance, &r.period))
            .collect()
    }

    fn start(
        &self,
        parent: Option<&Lineage>,
        name: &str,
        instance: &EntityInstance,
        period: &Period,
    ) -> Result<Value, EvaluationError> {
        // Nested requests belong to a computation already in flight.
        if parent.is_none() && self.is_aborted() {
            tracing::warn!(variable = name, %instance, %period, "rejecting request after abort");
            return Err(EvaluationError::Aborted);
        }
        let request = self.next_request.fetch_add(1, Ordering::Relaxed);
        let _adoption = parent.map(|p| self.ledger.adopt(p.request, request));
        let scope = Scope::new(self, request, parent);
        scope.evaluate(name, instance, period)
    }

    fn id(&self) -> usize {
        self as *const Self as usize
    }

    /// Rejects every new top-level request. Computations already running finish.
    pub fn abort(&self) {
        tracing::warn!("aborting evaluation");
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Forgets every computed value, keeping inputs. Returns how many were dropped.
    pub fn reset_cache(&self) -> usize {
        let dropped = self.ledger.reset();
        tracing::debug!(dropped, "cache reset");
        dropped
    }

    pub fn stats(&self) -> CacheStats {
        self.ledger.stats()
    }

    /// Entries recorded so far, when tracing is enabled.
    pub fn computation_log(&self) -> Vec<TraceEntry> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn open_entry(&self, entry: TraceEntry) -> Option<usize> {
        if !self.config.trace {
            return None;
        }
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.push(entry);
        Some(log.len() - 1)
    }

    fn close_entry(&self, index: Option<usize>, value: &Value) {
        if let Some(index) = index {
            let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = log.get_mut(index) {
                entry.value = Some(value.clone());
            }
        }
    }
}

fn check_entity(variable: &Variable, instance: &EntityInstance) -> Result<(), EvaluationError> {
    if instance.entity() == variable.entity {
        Ok(())
    } else {
        Err(EvaluationError::EntityMismatch {
            variable: variable.name.clone(),
            expected: variable.entity.clone(),
            found: instance.entity().to_string(),
        })
    }
}

/// The request a nested evaluation descends from.
#[derive(Debug, Clone)]
struct Lineage {
    root: RequestId,
    request: RequestId,
    /// Keys being computed by the ancestors, outermost first.
    path: Vec<CacheKey>,
}

impl Lineage {
    /// The innermost request of `resolver` running on this thread, if any.
    fn current(resolver: &Resolver) -> Option<Self> {
        let id = resolver.id();
        ACTIVE.with(|active| {
            active.borrow().iter().rev().find(|frame| frame.resolver == id).map(|frame| Lineage {
                root: frame.root,
                request: frame.request,
                path: frame.inherited.iter().chain(frame.stack.borrow().iter()).cloned().collect(),
            })
        })
    }
}

/// State of one request, registered on the thread running it.
struct Frame {
    resolver: usize,
    /// Top-level request, used to group the computation log.
    root: RequestId,
    request: RequestId,
    inherited: Vec<CacheKey>,
    stack: RefCell<Vec<CacheKey>>,
}

thread_local! {
    static ACTIVE: RefCell<Vec<Rc<Frame>>> = RefCell::new(Vec::new());
}

/// The view of the resolver handed to formulas during one request.
///
/// Not shared across threads: a formula that fans out work calls
/// `Resolver::evaluate_many`, whose requests are nested in this one.
pub struct Scope<'r> {
    resolver: &'r Resolver,
    frame: Rc<Frame>,
}

impl<'r> Scope<'r> {
    fn new(resolver: &'r Resolver, request: RequestId, parent: Option<&Lineage>) -> Self {
        let frame = Rc::new(Frame {
            resolver: resolver.id(),
            root: parent.map_or(request, |p| p.root),
            request,
            inherited: parent.map(|p| p.path.clone()).unwrap_or_default(),
            stack: RefCell::new(Vec::new()),
        });
        ACTIVE.with(|active| active.borrow_mut().push(Rc::clone(&frame)));
        Self { resolver, frame }
    }

    /// The resolver behind this scope. Evaluations made through it from a
    /// formula are nested in the current request.
    pub fn resolver(&self) -> &'r Resolver {
        self.resolver
    }

    /// Number of formulas currently running in this request, nested requests
    /// counting their ancestors.
    pub fn depth(&self) -> usize {
        self.frame.inherited.len() + self.frame.stack.borrow().len()
    }

    pub fn evaluate(&self, name: &str, instance: &EntityInstance, period: &Period) -> Result<Value, EvaluationError> {
        let variable = Arc::clone(self.resolver.variable(name)?);
        check_entity(&variable, instance)?;
        if self.resolver.is_neutralized(name) || is_past_end(&variable, period) {
            return Ok(variable.default_value.clone());
        }

        match plan(&variable, period)? {
            Plan::Single(part) => self.resolve(&variable, instance, part),
            Plan::Aggregate { parts, policy } => {
                let values = parts
                    .into_iter()
                    .map(|part| self.resolve(&variable, instance, part))
                    .collect::<Result<Vec<_>, _>>()?;
                match policy {
                    CalculateOutputPolicy::Add => reconcile::sum(&variable, &values),
                    CalculateOutputPolicy::Divide => reconcile::mean(&variable, &values),
                }
            }
            Plan::Prorate { enclosing, numerator, denominator } => {
                let whole = self.resolve(&variable, instance, enclosing)?;
                reconcile::prorate(&variable, &whole, numerator, denominator)
            }
        }
    }

    /// Resolves one definition period: input, then cache, then formula.
    fn resolve(&self, variable: &Variable, instance: &EntityInstance, period: Period) -> Result<Value, EvaluationError> {
        if is_past_end(variable, &period) {
            return Ok(variable.default_value.clone());
        }
        let key = CacheKey::new(variable.name.as_str(), instance, period);
        if let Some(value) = self.resolver.ledger.input(&key) {
            self.record(&key, Source::Input, &value);
            return Ok(value);
        }

        let (start, formula) = match variable.formula_at(period.start()) {
            Some(found) => found,
            None if variable.is_input() => {
                self.record(&key, Source::Default, &variable.default_value);
                return Ok(variable.default_value.clone());
            }
            None => {
                return Err(EvaluationError::NoApplicableFormula { variable: variable.name.clone(), period })
            }
        };

        let depth = self.depth();
        if depth >= self.resolver.config.max_depth {
            return Err(EvaluationError::MaxDepthExceeded {
                variable: variable.name.clone(),
                depth: self.resolver.config.max_depth,
            });
        }

        match self.resolver.ledger.claim(&key, self.frame.request) {
            Claim::Hit(value) => {
                tracing::trace!(%key, "cache hit");
                self.record(&key, Source::Cache, &value);
                Ok(value)
            }
            Claim::Cycle => Err(EvaluationError::CircularDependency { cycle: self.cycle_through(&key) }),
            Claim::Compute(reservation) => {
                let entry = self.resolver.open_entry(self.entry(&key, Source::Formula(start), None));
                tracing::debug!(%key, since = %start, depth, "running formula");

                self.frame.stack.borrow_mut().push(key.clone());
                let result = formula.call(instance, &period, self);
                self.frame.stack.borrow_mut().pop();

                let value = result?;
                if !variable.accepts(&value) {
                    return Err(EvaluationError::ValueTypeMismatch {
                        variable: variable.name.clone(),
                        expected: variable.value_type,
                        found: value.value_type(),
                    });
                }
                reservation.complete(value.clone());
                self.resolver.close_entry(entry, &value);
                Ok(value)
            }
        }
    }

    fn cycle_through(&self, key: &CacheKey) -> Vec<String> {
        let stack = self.frame.stack.borrow();
        let chain: Vec<&CacheKey> = self.frame.inherited.iter().chain(stack.iter()).collect();
        let from = chain.iter().position(|k| *k == key).unwrap_or(0);
        chain[from..]
            .iter()
            .copied()
            .chain(std::iter::once(key))
            .map(|k| k.variable.clone())
            .collect()
    }

    fn entry(&self, key: &CacheKey, source: Source, value: Option<Value>) -> TraceEntry {
        let stack = self.frame.stack.borrow();
        TraceEntry {
            request: self.frame.root,
            depth: self.frame.inherited.len() + stack.len(),
            key: key.clone(),
            parent: stack.last().or(self.frame.inherited.last()).cloned(),
            source,
            value,
        }
    }

    fn record(&self, key: &CacheKey, source: Source, value: &Value) {
        if self.resolver.config.trace {
            self.resolver.open_entry(self.entry(key, source, Some(value.clone())));
        }
    }

    /// Members of a group instance with their roles.
    pub fn members(&self, group: &EntityInstance) -> Vec<Membership> {
        self.resolver.population.members(group)
    }

    /// Persons holding `role` in `group`. Asking for a role also returns the
    /// holders of its sub-roles.
    pub fn role_members(&self, group: &EntityInstance, role: &str) -> Result<Vec<EntityInstance>, EvaluationError> {
        let group_entity = self.resolver.catalog.entities().group(group.entity())?;
        let wanted: Vec<&str> = match group_entity.role(role) {
            Some(r) => std::iter::once(r.key.as_str()).chain(r.subroles.iter().map(String::as_str)).collect(),
            None if group_entity.role_covering(role).is_some() => vec![role],
            None => {
                return Err(EntityError::UnknownRole { entity: group.entity().to_string(), role: role.to_string() }.into())
            }
        };
        Ok(self
            .members(group)
            .into_iter()
            .filter(|m| wanted.contains(&m.role.as_str()))
            .map(|m| m.person)
            .collect())
    }

    /// Sum of a person variable over the holders of `role` in `group`.
    pub fn sum_by_role(
        &self,
        name: &str,
        group: &EntityInstance,
        role: &str,
        period: &Period,
    ) -> Result<Value, EvaluationError> {
        let variable = Arc::clone(self.resolver.variable(name)?);
        let values = self
            .role_members(group, role)?
            .iter()
            .map(|person| self.evaluate(name, person, period))
            .collect::<Result<Vec<_>, _>>()?;
        reconcile::sum(&variable, &values)
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|frame| Rc::ptr_eq(frame, &self.frame)) {
                active.remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::store::SetInputPolicy;
    use crate::type_system::ValueType;
    use rstest::rstest;

    fn p(text: &str) -> Period {
        text.parse().unwrap()
    }

    fn variable(
        definition_period: PeriodUnit,
        calculate_output: Option<CalculateOutputPolicy>,
        size_independent: bool,
    ) -> Variable {
        let mut variable = fixtures::variable("revenu", ValueType::Float);
        variable.definition_period = definition_period;
        variable.calculate_output = calculate_output;
        variable.is_period_size_independent = size_independent;
        variable.set_input = Some(SetInputPolicy::DivideByPeriod);
        variable
    }

    #[test]
    fn test_plan_same_period() {
        let monthly = variable(PeriodUnit::Month, None, false);
        assert_eq!(plan(&monthly, &p("2024-03")).unwrap(), Plan::Single(p("2024-03")));
    }

    #[test]
    fn test_plan_eternity() {
        let eternal = variable(PeriodUnit::Eternity, None, true);
        assert_eq!(plan(&eternal, &p("2024-03")).unwrap(), Plan::Single(Period::eternity()));

        let monthly = variable(PeriodUnit::Month, None, false);
        assert!(matches!(plan(&monthly, &Period::eternity()), Err(EvaluationError::IncompatiblePeriod { .. })));
    }

    #[test]
    fn test_plan_coarser_request() {
        let summed = variable(PeriodUnit::Month, Some(CalculateOutputPolicy::Add), false);
        match plan(&summed, &p("2024")).unwrap() {
            Plan::Aggregate { parts, policy } => {
                assert_eq!(parts.len(), 12);
                assert_eq!(policy, CalculateOutputPolicy::Add);
            }
            other => panic!("Wrong plan: {:?}", other),
        }

        let unreconciled = variable(PeriodUnit::Month, None, false);
        assert!(matches!(plan(&unreconciled, &p("2024")), Err(EvaluationError::AmbiguousAggregation { .. })));
        // A single definition period spelled differently is not an aggregation.
        assert_eq!(plan(&unreconciled, &p("month:2024-03:1")).unwrap(), Plan::Single(p("2024-03")));
    }

    #[rstest]
    #[case::size_independent(true, None)]
    #[case::size_independent_with_policy(true, Some(CalculateOutputPolicy::Add))]
    fn test_plan_finer_size_independent(#[case] independent: bool, #[case] policy: Option<CalculateOutputPolicy>) {
        let yearly = variable(PeriodUnit::Year, policy, independent);
        assert_eq!(plan(&yearly, &p("2024-03")).unwrap(), Plan::Single(p("2024")));
    }

    #[test]
    fn test_plan_finer_request() {
        let divided = variable(PeriodUnit::Year, Some(CalculateOutputPolicy::Divide), false);
        assert_eq!(
            plan(&divided, &p("month:2024-01:6")).unwrap(),
            Plan::Prorate { enclosing: p("2024"), numerator: 6, denominator: 12 }
        );

        let summed = variable(PeriodUnit::Year, Some(CalculateOutputPolicy::Add), false);
        assert!(matches!(
            plan(&summed, &p("month:2024-01:6")),
            Err(EvaluationError::AmbiguousAggregation { .. })
        ));

        let bare = variable(PeriodUnit::Year, None, false);
        assert!(matches!(plan(&bare, &p("2024-03")), Err(EvaluationError::IncompatiblePeriod { .. })));
        // Straddling two years has no enclosing definition period.
        assert!(matches!(plan(&divided, &p("month:2024-11:3")), Err(EvaluationError::IncompatiblePeriod { .. })));
    }
}
