//! Time granularities and concrete evaluation periods.
//!
//! A `PeriodUnit` is the granularity a variable is defined at. A `Period` is a
//! concrete span of time expressed in one unit: a start date plus a number of
//! units (e.g. `month:2024-01:6` is the first half of 2024).
pub mod span;
pub mod unit;

pub use span::Period;
pub use unit::PeriodUnit;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Cannot parse period '{0}'")]
    Unparsable(String),
    #[error("Unknown period unit '{0}'")]
    UnknownUnit(String),
    #[error("A period must span at least one {unit}")]
    ZeroSize { unit: PeriodUnit },
    #[error("A {unit} period cannot start on {start}")]
    Misaligned { unit: PeriodUnit, start: chrono::NaiveDate },
    #[error("Period arithmetic left the supported calendar range")]
    OutOfRange,
    #[error("Period '{period}' cannot be expressed in {unit}s")]
    Incompatible { period: String, unit: PeriodUnit },
}
