//! Formula bodies supplied by the legislation side.
use super::engine::Scope;
use super::ledger::EvaluationError;
use super::population::EntityInstance;
use crate::period::Period;
use crate::type_system::Value;
use std::fmt;
use std::sync::Arc;

/// Signature of a formula body. The scope lets the body request the
/// variables it depends on.
pub type FormulaFn =
    dyn Fn(&EntityInstance, &Period, &Scope<'_>) -> Result<Value, EvaluationError> + Send + Sync;

/// A shared, cheaply clonable reference to a formula body.
///
/// Two `Formula`s are equal when they point at the same body, which keeps
/// compiled variables comparable.
#[derive(Clone)]
pub struct Formula {
    body: Arc<FormulaFn>,
}

impl Formula {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&EntityInstance, &Period, &Scope<'_>) -> Result<Value, EvaluationError> + Send + Sync + 'static,
    {
        Self { body: Arc::new(body) }
    }

    /// A formula returning the same value for every instance and period.
    pub fn constant(value: Value) -> Self {
        Self::new(move |_, _, _| Ok(value.clone()))
    }

    #[inline]
    pub fn call(&self, instance: &EntityInstance, period: &Period, scope: &Scope<'_>) -> Result<Value, EvaluationError> {
        (self.body)(instance, period, scope)
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.body) as *const ()
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Formula({:p})", self.address())
    }
}
