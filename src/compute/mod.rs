//! Evaluation of variables: formulas, the resolver and its cache.
pub mod engine;
pub mod formula;
pub mod ledger;
pub mod population;
pub mod reconcile;


pub use engine::{Request, Resolver, Scope, Source, TraceEntry};
pub use formula::{Formula, FormulaFn};
pub use ledger::{CacheKey, CacheStats, EvaluationError, Ledger, RequestId};
pub use population::{EntityInstance, Membership, Population, PopulationError, PopulationProvider};
