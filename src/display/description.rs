//! Static, serializable description of a compiled variable.
use crate::store::{CerfaField, Variable, FORMULA_INCEPTION};
use crate::type_system::describe;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDescription {
    pub name: String,
    pub value_type: String,
    /// JSON type used on the wire for this variable's values.
    pub json_type: &'static str,
    pub entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub definition_period: String,
    pub default_value: Json,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub possible_values: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cerfa_field: Option<CerfaField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reference: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// Start dates of the formula versions, oldest first. Empty for inputs.
    pub formulas: Vec<String>,
}

impl VariableDescription {
    pub fn from_variable(variable: &Variable) -> Self {
        let possible_values = variable.possible_values.as_ref();
        Self {
            name: variable.name.clone(),
            value_type: variable.value_type.to_string(),
            json_type: describe(variable.value_type).json_type,
            entity: variable.entity.clone(),
            role: variable.role.clone(),
            definition_period: variable.definition_period.to_string(),
            default_value: variable.default_value.to_json(possible_values),
            possible_values: possible_values
                .map(|pv| pv.iter().map(|v| (v.key.clone(), v.label.clone())).collect()),
            label: variable.label.clone(),
            unit: variable.unit.clone(),
            documentation: variable.documentation.clone(),
            cerfa_field: variable.cerfa_field.clone(),
            reference: variable.reference.clone(),
            end: variable.end,
            formulas: variable
                .formulas
                .keys()
                .map(|start| if *start == FORMULA_INCEPTION { "inception".to_string() } else { start.to_string() })
                .collect(),
        }
    }
}
