//! Closed, ordered variant sets for enumerated variables.
use super::error::PossibleValuesError;
use super::value_type::Value;
use serde_json::Value as Json;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub key: String,
    pub label: String,
}

/// The closed set of variants an enum variable may take.
///
/// Enum values are stored as indices into this set, so a `Value::Enum` can
/// only be produced for a declared variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossibleValues {
    variants: Vec<Variant>,
}

impl PossibleValues {
    pub fn new<I, K, L>(pairs: I) -> Result<Self, PossibleValuesError>
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: Into<String>,
    {
        let variants: Vec<Variant> = pairs
            .into_iter()
            .map(|(key, label)| Variant { key: key.into(), label: label.into() })
            .collect();
        if variants.is_empty() {
            return Err(PossibleValuesError::Empty);
        }
        let mut seen = HashSet::new();
        for variant in &variants {
            if variant.key.is_empty() {
                return Err(PossibleValuesError::EmptyKey);
            }
            if !seen.insert(variant.key.as_str()) {
                return Err(PossibleValuesError::DuplicateVariant(variant.key.clone()));
            }
        }
        Ok(Self { variants })
    }

    /// Variants labelled by their own key.
    pub fn from_keys<I, K>(keys: I) -> Result<Self, PossibleValuesError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::new(keys.into_iter().map(|k| {
            let key = k.into();
            (key.clone(), key)
        }))
    }

    /// Reads `["a", "b"]`, `[["a", "Label"], ...]` or `[{"key": "a", "label": "Label"}, ...]`.
    pub fn from_json(json: &Json) -> Result<Self, PossibleValuesError> {
        let items = json
            .as_array()
            .ok_or_else(|| PossibleValuesError::Malformed("expected an array".into()))?;
        let mut pairs = Vec::with_capacity(items.len());
        for item in items {
            let pair = match item {
                Json::String(key) => (key.clone(), key.clone()),
                Json::Array(pair) => match pair.as_slice() {
                    [Json::String(key), Json::String(label)] => (key.clone(), label.clone()),
                    _ => return Err(PossibleValuesError::Malformed(format!("bad pair {}", item))),
                },
                Json::Object(map) => {
                    let key = map
                        .get("key")
                        .and_then(Json::as_str)
                        .ok_or_else(|| PossibleValuesError::Malformed(format!("missing key in {}", item)))?;
                    let label = map.get("label").and_then(Json::as_str).unwrap_or(key);
                    (key.to_string(), label.to_string())
                }
                other => return Err(PossibleValuesError::Malformed(format!("unexpected {}", other))),
            };
            pairs.push(pair);
        }
        Self::new(pairs)
    }

    pub fn len(&self) -> usize { self.variants.len() }
    pub fn is_empty(&self) -> bool { self.variants.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.key == key)
    }

    pub fn variant(&self, index: usize) -> Option<&Variant> {
        self.variants.get(index)
    }

    /// Resolves a variant key into an enum value.
    pub fn parse(&self, key: &str) -> Result<Value, PossibleValuesError> {
        self.index_of(key)
            .map(Value::Enum)
            .ok_or_else(|| PossibleValuesError::NotAMember(key.to_string()))
    }

    /// Checks that an enum value designates one of the variants.
    pub fn check(&self, value: &Value) -> Result<(), PossibleValuesError> {
        match value {
            Value::Enum(idx) if *idx < self.variants.len() => Ok(()),
            Value::Enum(idx) => Err(PossibleValuesError::OutOfRange(*idx)),
            other => Err(PossibleValuesError::NotAMember(other.to_string())),
        }
    }

    pub fn key_of(&self, value: &Value) -> Option<&str> {
        match value {
            Value::Enum(idx) => self.variants.get(*idx).map(|v| v.key.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;

    #[test]
    fn test_membership() {
        let statut = fixtures::statut_marital();
        assert_eq!(statut.len(), 7);
        assert_eq!(statut.parse("non_renseigne"), Ok(Value::Enum(0)));
        assert_eq!(statut.parse("jeune_veuf"), Ok(Value::Enum(6)));
        assert_eq!(statut.parse("mariee"), Err(PossibleValuesError::NotAMember("mariee".into())));
        assert_eq!(statut.variant(1).map(|v| v.label.as_str()), Some("Marié"));
        assert_eq!(statut.key_of(&Value::Enum(5)), Some("pacse"));
    }

    #[test]
    fn test_check_rejects_foreign_values() {
        let statut = fixtures::statut_marital();
        assert!(statut.check(&Value::Enum(3)).is_ok());
        assert_eq!(statut.check(&Value::Enum(7)), Err(PossibleValuesError::OutOfRange(7)));
        assert!(statut.check(&Value::Str("marie".into())).is_err());
    }

    #[test]
    fn test_closed_set_rules() {
        let empty: Vec<&str> = vec![];
        assert_eq!(PossibleValues::from_keys(empty), Err(PossibleValuesError::Empty));
        assert_eq!(
            PossibleValues::from_keys(["a", "b", "a"]),
            Err(PossibleValuesError::DuplicateVariant("a".into()))
        );
        assert_eq!(PossibleValues::from_keys(["a", ""]), Err(PossibleValuesError::EmptyKey));
    }

    #[test]
    fn test_from_json_forms() {
        let plain = PossibleValues::from_json(&json!(["actif", "chomeur"])).unwrap();
        assert_eq!(plain.variant(1).unwrap().label, "chomeur");

        let pairs = PossibleValues::from_json(&json!([["actif", "Actif occupé"], ["chomeur", "Chômeur"]])).unwrap();
        assert_eq!(pairs.variant(0).unwrap().label, "Actif occupé");

        let objects = PossibleValues::from_json(&json!([
            {"key": "artisan", "label": "Artisan"},
            {"key": "commercant"}
        ]))
        .unwrap();
        assert_eq!(objects.index_of("commercant"), Some(1));
        assert_eq!(objects.variant(1).unwrap().label, "commercant");

        assert!(PossibleValues::from_json(&json!({"a": "A"})).is_err());
        assert!(PossibleValues::from_json(&json!([1, 2])).is_err());
    }
}
