//! Rules for descriptive attributes and reconciliation strategies.
use crate::store::{CalculateOutputPolicy, CerfaField, SetInputPolicy};
use crate::validation::declaration::Attribute;
use crate::validation::error::DefinitionError;
use chrono::NaiveDate;
use serde_json::Value as Json;
use std::collections::BTreeMap;

fn invalid(variable: &str, attribute: &str, reason: impl Into<String>) -> DefinitionError {
    DefinitionError::InvalidAttribute {
        variable: variable.to_string(),
        attribute: attribute.to_string(),
        reason: reason.into(),
    }
}

fn json<'a>(variable: &str, attribute: &str, value: &'a Attribute) -> Result<&'a Json, DefinitionError> {
    value
        .as_json()
        .ok_or_else(|| invalid(variable, attribute, format!("expected data, found a {}", value.kind())))
}

pub(crate) fn string(variable: &str, attribute: &str, value: &Attribute) -> Result<String, DefinitionError> {
    json(variable, attribute, value)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(variable, attribute, "expected a string"))
}

pub(crate) fn boolean(variable: &str, attribute: &str, value: &Attribute) -> Result<bool, DefinitionError> {
    json(variable, attribute, value)?
        .as_bool()
        .ok_or_else(|| invalid(variable, attribute, "expected a boolean"))
}

pub(crate) fn positive_integer(variable: &str, attribute: &str, value: &Attribute) -> Result<usize, DefinitionError> {
    json(variable, attribute, value)?
        .as_u64()
        .filter(|&n| n > 0)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(variable, attribute, "expected a positive integer"))
}

pub(crate) fn date(variable: &str, attribute: &str, value: &Attribute) -> Result<NaiveDate, DefinitionError> {
    let text = string(variable, attribute, value)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map_err(|_| invalid(variable, attribute, format!("'{}' is not a YYYY-MM-DD date", text)))
}

/// A single reference or a list of them.
pub(crate) fn references(variable: &str, value: &Attribute) -> Result<Vec<String>, DefinitionError> {
    match json(variable, "reference", value)? {
        Json::String(s) => Ok(vec![s.clone()]),
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(variable, "reference", "expected strings"))
            })
            .collect(),
        _ => Err(invalid(variable, "reference", "expected a string or a list of strings")),
    }
}

/// One form box, or a role -> box mapping.
pub(crate) fn cerfa_field(variable: &str, value: &Attribute) -> Result<CerfaField, DefinitionError> {
    match json(variable, "cerfa_field", value)? {
        Json::String(s) => Ok(CerfaField::Single(s.clone())),
        Json::Object(map) => {
            let mut by_role = BTreeMap::new();
            for (role, field) in map {
                let field = field
                    .as_str()
                    .ok_or_else(|| invalid(variable, "cerfa_field", format!("field for '{}' must be a string", role)))?;
                by_role.insert(role.clone(), field.to_string());
            }
            Ok(CerfaField::ByRole(by_role))
        }
        _ => Err(invalid(variable, "cerfa_field", "expected a string or a role -> string mapping")),
    }
}

pub(crate) fn set_input(variable: &str, value: &Attribute) -> Result<SetInputPolicy, DefinitionError> {
    let name = string(variable, "set_input", value)?;
    SetInputPolicy::from_name(&name).ok_or(DefinitionError::UnknownStrategy {
        variable: variable.to_string(),
        attribute: "set_input",
        strategy: name,
    })
}

pub(crate) fn calculate_output(variable: &str, value: &Attribute) -> Result<CalculateOutputPolicy, DefinitionError> {
    let name = string(variable, "calculate_output", value)?;
    CalculateOutputPolicy::from_name(&name).ok_or(DefinitionError::UnknownStrategy {
        variable: variable.to_string(),
        attribute: "calculate_output",
        strategy: name,
    })
}

/// Strips the indentation shared by every non-blank line, then surrounding blank space.
pub(crate) fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| *c == ' ' || *c == '\t').count())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                let cut = line.char_indices().nth(indent).map_or(line.len(), |(i, _)| i);
                &line[cut..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
