//! The compiled, immutable variable record.
use crate::compute::Formula;
use crate::display::description::VariableDescription;
use crate::period::PeriodUnit;
use crate::type_system::{PossibleValues, Value, ValueType};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Start key of a formula applying from the beginning of time.
pub const FORMULA_INCEPTION: NaiveDate = NaiveDate::MIN;

/// How an input given for a coarse period is spread over definition periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SetInputPolicy {
    #[serde(rename = "set_input_divide_by_period")]
    DivideByPeriod,
    #[serde(rename = "set_input_dispatch_by_period")]
    DispatchByPeriod,
}

impl SetInputPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "set_input_divide_by_period" => Some(Self::DivideByPeriod),
            "set_input_dispatch_by_period" => Some(Self::DispatchByPeriod),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DivideByPeriod => "set_input_divide_by_period",
            Self::DispatchByPeriod => "set_input_dispatch_by_period",
        }
    }
}

/// How values are reconciled when the requested period differs from the definition period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CalculateOutputPolicy {
    #[serde(rename = "calculate_output_add")]
    Add,
    #[serde(rename = "calculate_output_divide")]
    Divide,
}

impl CalculateOutputPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "calculate_output_add" => Some(Self::Add),
            "calculate_output_divide" => Some(Self::Divide),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "calculate_output_add",
            Self::Divide => "calculate_output_divide",
        }
    }
}

/// Tax-form box(es) a variable is reported in, either one box or one per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CerfaField {
    Single(String),
    ByRole(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value_type: ValueType,
    pub possible_values: Option<PossibleValues>,
    pub default_value: Value,
    pub entity: String,
    /// Role of the group entity the variable concerns, e.g. the
    /// `declarant_principal` of a `foyer_fiscal`. Descriptive only: it is
    /// checked at compile time and exported, evaluation ignores it.
    pub role: Option<String>,
    pub definition_period: PeriodUnit,
    pub label: Option<String>,
    /// Last day the variable is defined. Later periods evaluate to the default.
    pub end: Option<NaiveDate>,
    pub reference: Vec<String>,
    pub cerfa_field: Option<CerfaField>,
    pub unit: Option<String>,
    pub documentation: Option<String>,
    pub max_length: Option<usize>,
    pub is_period_size_independent: bool,
    pub set_input: Option<SetInputPolicy>,
    pub calculate_output: Option<CalculateOutputPolicy>,
    pub formulas: BTreeMap<NaiveDate, Formula>,
}

impl Variable {
    /// The formula in force on `date`: the one with the latest start not after it.
    pub fn formula_at(&self, date: NaiveDate) -> Option<(NaiveDate, &Formula)> {
        self.formulas.range(..=date).next_back().map(|(start, f)| (*start, f))
    }

    /// Variables without formulas are pure inputs.
    pub fn is_input(&self) -> bool {
        self.formulas.is_empty()
    }

    /// True if `value` is of this variable's type (and a declared variant for enums).
    pub fn accepts(&self, value: &Value) -> bool {
        if value.value_type() != self.value_type {
            return false;
        }
        match (value, &self.possible_values, self.max_length) {
            (Value::Enum(_), Some(pv), _) => pv.check(value).is_ok(),
            (Value::Str(s), _, Some(max)) => s.chars().count() <= max,
            _ => true,
        }
    }

    /// Renders a value the way it is serialized (enum values by key).
    pub fn render(&self, value: &Value) -> String {
        match self.possible_values.as_ref().and_then(|pv| pv.key_of(value)) {
            Some(key) => key.to_string(),
            None => value.to_string(),
        }
    }

    pub fn describe(&self) -> VariableDescription {
        VariableDescription::from_variable(self)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} per {}, on {})", self.name, self.value_type, self.definition_period, self.entity)
    }
}
