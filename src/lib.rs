//! Core of a legislative micro-simulation engine.
//!
//! Legislation is described as variables attached to entities (persons and
//! the groups they form). Declarations are compiled once into an immutable
//! `VariableCatalog`, then a `Resolver` evaluates any variable for an entity
//! instance and a period, running formulas on demand and memoizing every result.
//!
//! ```ignore
//! let catalog = Arc::new(VariableCatalog::from_declarations(entities, &declarations)?);
//! let resolver = Resolver::new(catalog, Arc::new(population));
//! let impot = resolver.evaluate("impot_revenu", &foyer, &"2024".parse()?)?;
//! ```

// --- MODULE DECLARATIONS ---
pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod period;
pub mod store;
pub mod type_system;
pub mod validation;

#[cfg(test)]
mod fixtures;

// --- PUBLIC API ---
pub use compute::{EntityInstance, EvaluationError, Formula, Population, PopulationProvider, Request, Resolver, Scope};
pub use config::{ConfigError, ResolverConfig};
pub use period::{Period, PeriodError, PeriodUnit};
pub use store::{Entity, EntityError, EntityRegistry, GroupEntity, Role, Variable, VariableCatalog};
pub use type_system::{PossibleValues, Value, ValueType};
pub use validation::{Declaration, DefinitionError};
