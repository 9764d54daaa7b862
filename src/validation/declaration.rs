//! Raw variable declarations: a named bag of attributes.
use crate::compute::Formula;
use crate::type_system::PossibleValues;
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Reserved prefix of formula attributes (`formula`, `formula_2015_01_01`, ...).
pub const FORMULA_PREFIX: &str = "formula";

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Json(Json),
    PossibleValues(PossibleValues),
    Formula(Formula),
}

impl Attribute {
    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Attribute::Json(json) => Some(json),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Attribute::Json(_) => "data",
            Attribute::PossibleValues(_) => "possible values",
            Attribute::Formula(_) => "formula",
        }
    }
}

/// An unvalidated variable declaration, as written by legislation authors.
///
/// Nothing is checked here; `Compiler::compile` turns it into a `Variable`.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    name: String,
    attributes: BTreeMap<String, Attribute>,
}

impl Declaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: BTreeMap::new() }
    }

    /// Builds a declaration from a JSON object of metadata attributes.
    /// Formula bodies are attached afterwards with [`Declaration::formula`].
    pub fn from_json(name: impl Into<String>, json: &Json) -> Option<Self> {
        let object = json.as_object()?;
        let mut declaration = Self::new(name);
        for (key, value) in object {
            declaration.attributes.insert(key.clone(), Attribute::Json(value.clone()));
        }
        Some(declaration)
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.attributes.insert(key.into(), Attribute::Json(value.into()));
        self
    }

    pub fn possible_values(mut self, values: PossibleValues) -> Self {
        self.attributes.insert("possible_values".into(), Attribute::PossibleValues(values));
        self
    }

    /// Attaches a formula under `key`, e.g. `formula` or `formula_2015_01_01`.
    pub fn formula(mut self, key: impl Into<String>, formula: Formula) -> Self {
        self.attributes.insert(key.into(), Attribute::Formula(formula));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }
}
