//! Entity definitions and compiled variables.
pub mod catalog;
pub mod entity;
pub mod registry;
pub mod variable;

pub use catalog::VariableCatalog;
pub use entity::{Entity, EntityError, EntityKind, GroupEntity, Role};
pub use registry::EntityRegistry;
pub use variable::{CalculateOutputPolicy, CerfaField, SetInputPolicy, Variable, FORMULA_INCEPTION};
