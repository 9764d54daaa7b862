//! Individual checks applied by the compiler, one family per file.
pub(crate) mod formulas;
pub(crate) mod metadata;
