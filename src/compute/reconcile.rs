//! Arithmetic used to move values between period sizes.
use super::ledger::EvaluationError;
use crate::store::{SetInputPolicy, Variable};
use crate::type_system::{Value, ValueType};

fn non_numeric(variable: &Variable) -> EvaluationError {
    EvaluationError::NonNumericAggregation { variable: variable.name.clone(), value_type: variable.value_type }
}

fn overflow(variable: &Variable) -> EvaluationError {
    EvaluationError::Overflow { variable: variable.name.clone() }
}

/// Sum of the values of `variable`; zero when there are none.
pub fn sum(variable: &Variable, values: &[Value]) -> Result<Value, EvaluationError> {
    match variable.value_type {
        ValueType::Integer => values
            .iter()
            .try_fold(0i64, |total, v| {
                let v = v.as_int().ok_or_else(|| non_numeric(variable))?;
                total.checked_add(v).ok_or_else(|| overflow(variable))
            })
            .map(Value::Int),
        ValueType::Float => values
            .iter()
            .map(|v| v.as_f64().ok_or_else(|| non_numeric(variable)))
            .sum::<Result<f64, _>>()
            .map(Value::Float),
        _ => Err(non_numeric(variable)),
    }
}

/// Arithmetic mean. Integer means are truncated toward zero.
pub fn mean(variable: &Variable, values: &[Value]) -> Result<Value, EvaluationError> {
    let n = values.len().max(1);
    match sum(variable, values)? {
        Value::Int(total) => Ok(Value::Int(total / n as i64)),
        Value::Float(total) => Ok(Value::Float(total / n as f64)),
        _ => Err(non_numeric(variable)),
    }
}

/// The `numerator / denominator` share of `value`.
pub fn prorate(variable: &Variable, value: &Value, numerator: u32, denominator: u32) -> Result<Value, EvaluationError> {
    let denominator = denominator.max(1);
    match value {
        Value::Int(v) => v
            .checked_mul(i64::from(numerator))
            .map(|scaled| Value::Int(scaled / i64::from(denominator)))
            .ok_or_else(|| overflow(variable)),
        Value::Float(v) => Ok(Value::Float(v * f64::from(numerator) / f64::from(denominator))),
        _ => Err(non_numeric(variable)),
    }
}

/// Spreads an input over `parts` definition periods.
///
/// Dividing preserves the total: integer remainders go to the first parts.
pub fn split(variable: &Variable, value: &Value, parts: usize, policy: SetInputPolicy) -> Result<Vec<Value>, EvaluationError> {
    let parts = parts.max(1);
    match (policy, value) {
        (SetInputPolicy::DispatchByPeriod, _) => Ok(vec![value.clone(); parts]),
        (SetInputPolicy::DivideByPeriod, Value::Float(v)) => Ok(vec![Value::Float(v / parts as f64); parts]),
        (SetInputPolicy::DivideByPeriod, Value::Int(v)) => {
            let n = parts as i64;
            let (base, remainder) = (v.div_euclid(n), v.rem_euclid(n));
            Ok((0..n).map(|i| Value::Int(base + i64::from(i < remainder))).collect())
        }
        (SetInputPolicy::DivideByPeriod, _) => Err(non_numeric(variable)),
    }
}
