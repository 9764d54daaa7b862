//! Turns raw declarations into validated `Variable` records.
use super::declaration::{Attribute, Declaration};
use super::error::DefinitionError;
use super::rules::{formulas, metadata};
use crate::period::PeriodUnit;
use crate::store::{EntityRegistry, Variable};
use crate::type_system::{describe, PossibleValues, PossibleValuesError, Value, ValueType};
use std::collections::{BTreeMap, HashSet};

/// Accepted for compatibility, never honored: neutralization is a runtime switch.
const RUNTIME_ONLY: &str = "is_neutralized";

/// Validates declarations against the entity registry and the value type catalog.
///
/// Rules run in a fixed order and the first violated rule is reported, so a
/// given declaration always fails the same way. The one exception is the
/// unexpected-attribute rule, which lists every offending key at once.
pub struct Compiler<'a> {
    entities: &'a EntityRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(entities: &'a EntityRegistry) -> Self {
        Self { entities }
    }

    /// Compiles one declaration. Pure: the same declaration always yields an
    /// equal `Variable`.
    pub fn compile(&self, declaration: &Declaration) -> Result<Variable, DefinitionError> {
        let name = declaration.name();
        let mut bag: BTreeMap<String, Attribute> = declaration.attributes().clone();
        let mut take = |key: &str| bag.remove(key);

        // 1. Value type
        let value_type = match take("value_type") {
            None => return Err(DefinitionError::MissingAttribute { variable: name.into(), attribute: "value_type" }),
            Some(attr) => metadata::string(name, "value_type", &attr)?
                .parse::<ValueType>()
                .map_err(|source| DefinitionError::InvalidValueType { variable: name.into(), source })?,
        };
        let descriptor = describe(value_type);

        // 2. Possible values (enum only)
        let possible_values = self.possible_values(name, value_type, take("possible_values"))?;

        // 3. String width
        let max_length = match take("max_length") {
            Some(attr) if value_type == ValueType::String => Some(metadata::positive_integer(name, "max_length", &attr)?),
            Some(_) => {
                return Err(DefinitionError::InvalidAttribute {
                    variable: name.into(),
                    attribute: "max_length".into(),
                    reason: "only string variables have a max_length".into(),
                })
            }
            None => None,
        };

        // 4. Default value
        let default_value = match take("default_value") {
            None => {
                return Err(DefinitionError::InvalidDefaultValue { variable: name.into(), reason: "missing".into() })
            }
            Some(Attribute::Json(json)) => Value::from_json(value_type, &json, possible_values.as_ref(), max_length)
                .map_err(|e| DefinitionError::InvalidDefaultValue { variable: name.into(), reason: e.to_string() })?,
            Some(other) => {
                return Err(DefinitionError::InvalidDefaultValue {
                    variable: name.into(),
                    reason: format!("expected data, found a {}", other.kind()),
                })
            }
        };

        // 5. Entity, role restriction and definition period
        let entity = match take("entity") {
            None => return Err(DefinitionError::MissingAttribute { variable: name.into(), attribute: "entity" }),
            Some(attr) => metadata::string(name, "entity", &attr)?,
        };
        let entity_kind = self
            .entities
            .resolve(&entity)
            .map_err(|_| DefinitionError::UnknownEntity { variable: name.into(), entity: entity.clone() })?;
        let role = match take("role") {
            None => None,
            Some(attr) => {
                let role = metadata::string(name, "role", &attr)?;
                let known = entity_kind
                    .as_group()
                    .is_some_and(|group| group.flattened_roles().contains(&role.as_str()));
                if !known {
                    return Err(DefinitionError::UnknownRole { variable: name.into(), entity, role });
                }
                Some(role)
            }
        };
        let definition_period = match take("definition_period") {
            None => {
                return Err(DefinitionError::MissingAttribute { variable: name.into(), attribute: "definition_period" })
            }
            Some(attr) => {
                let text = metadata::string(name, "definition_period", &attr)?;
                text.parse::<PeriodUnit>().map_err(|e| DefinitionError::InvalidAttribute {
                    variable: name.into(),
                    attribute: "definition_period".into(),
                    reason: e.to_string(),
                })?
            }
        };

        // 6. Descriptive metadata
        let label = take("label").map(|a| metadata::string(name, "label", &a)).transpose()?;
        let unit = take("unit").map(|a| metadata::string(name, "unit", &a)).transpose()?;
        let documentation = take("documentation")
            .map(|a| metadata::string(name, "documentation", &a).map(|doc| metadata::dedent(&doc)))
            .transpose()?;
        let end = take("end").map(|a| metadata::date(name, "end", &a)).transpose()?;
        let reference = take("reference").map(|a| metadata::references(name, &a)).transpose()?.unwrap_or_default();
        let cerfa_field = take("cerfa_field").map(|a| metadata::cerfa_field(name, &a)).transpose()?;

        // 7. Reconciliation strategies
        let set_input = take("set_input").map(|a| metadata::set_input(name, &a)).transpose()?;
        let calculate_output = take("calculate_output").map(|a| metadata::calculate_output(name, &a)).transpose()?;

        // 8. Period size independence
        let is_period_size_independent = match take("is_period_size_independent") {
            Some(attr) => metadata::boolean(name, "is_period_size_independent", &attr)?,
            None => descriptor.is_period_size_independent,
        };

        if take(RUNTIME_ONLY).is_some() {
            tracing::warn!(variable = %name, "ignoring declared is_neutralized");
        }

        // 9. Formulas, and everything left over
        let (formula_attrs, unexpected): (Vec<_>, Vec<_>) =
            bag.into_iter().partition(|(key, _)| formulas::is_formula_key(key));
        if !unexpected.is_empty() {
            return Err(DefinitionError::UnexpectedAttributes {
                variable: name.into(),
                attributes: unexpected.into_iter().map(|(key, _)| key).collect(),
            });
        }

        let mut versions = BTreeMap::new();
        for (key, attr) in formula_attrs {
            let invalid = |reason: String| DefinitionError::InvalidFormula {
                variable: name.into(),
                attribute: key.clone(),
                reason,
            };
            let start = formulas::start_date(&key).map_err(invalid)?;
            let formula = match attr {
                Attribute::Formula(f) => f,
                other => return Err(invalid(format!("expected a formula, found {}", other.kind()))),
            };
            if let Some(end) = end {
                if start > end {
                    return Err(invalid(format!("starts on {} but the variable ends on {}", start, end)));
                }
            }
            if versions.insert(start, formula).is_some() {
                return Err(invalid(format!("another formula already starts on {}", start)));
            }
        }

        tracing::debug!(variable = %name, %value_type, entity = %entity, formulas = versions.len(), "compiled variable");

        Ok(Variable {
            name: name.to_string(),
            value_type,
            possible_values,
            default_value,
            entity,
            role,
            definition_period,
            label,
            end,
            reference,
            cerfa_field,
            unit,
            documentation,
            max_length,
            is_period_size_independent,
            set_input,
            calculate_output,
            formulas: versions,
        })
    }

    fn possible_values(
        &self,
        name: &str,
        value_type: ValueType,
        attr: Option<Attribute>,
    ) -> Result<Option<PossibleValues>, DefinitionError> {
        let missing = || DefinitionError::MissingAttribute { variable: name.into(), attribute: "possible_values" };
        let attr = match (value_type, attr) {
            (ValueType::Enum, None) => return Err(missing()),
            (ValueType::Enum, Some(attr)) => attr,
            (_, None) => return Ok(None),
            (_, Some(_)) => {
                return Err(DefinitionError::InvalidAttribute {
                    variable: name.into(),
                    attribute: "possible_values".into(),
                    reason: "only enum variables have possible values".into(),
                })
            }
        };
        let parsed = match attr {
            Attribute::PossibleValues(pv) => Ok(pv),
            Attribute::Json(json) => PossibleValues::from_json(&json),
            Attribute::Formula(_) => Err(PossibleValuesError::Malformed("expected variants, found a formula".into())),
        };
        match parsed {
            Ok(pv) if pv.is_empty() => Err(missing()),
            Ok(pv) => Ok(Some(pv)),
            Err(PossibleValuesError::Empty) => Err(missing()),
            Err(source) => Err(DefinitionError::InvalidPossibleValues { variable: name.into(), source }),
        }
    }
}

/// Distinct names of a batch, in order of first appearance.
pub(crate) fn duplicate_names(declarations: &[Declaration]) -> Vec<String> {
    let mut seen = HashSet::new();
    declarations
        .iter()
        .filter(|d| !seen.insert(d.name()))
        .map(|d| d.name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Formula;
    use crate::fixtures;
    use crate::store::{CalculateOutputPolicy, SetInputPolicy, FORMULA_INCEPTION};
    use chrono::NaiveDate;
    use rstest::rstest;
    use serde_json::json;

    fn salaire() -> Declaration {
        Declaration::new("salaire")
            .set("value_type", "float")
            .set("default_value", 0.0)
            .set("entity", "individu")
            .set("definition_period", "month")
            .set("label", "Salaire net")
            .set("set_input", "set_input_divide_by_period")
            .set("calculate_output", "calculate_output_add")
    }

    fn statut_marital() -> Declaration {
        Declaration::new("statut_marital")
            .set("value_type", "enum")
            .possible_values(fixtures::statut_marital())
            .set("default_value", "non_renseigne")
            .set("entity", "individu")
            .set("definition_period", "month")
    }

    #[test]
    fn test_compile_float_variable() {
        let entities = fixtures::entities();
        let variable = Compiler::new(&entities).compile(&salaire()).unwrap();
        assert_eq!(variable.name, "salaire");
        assert_eq!(variable.value_type, ValueType::Float);
        assert_eq!(variable.default_value, Value::Float(0.0));
        assert_eq!(variable.definition_period, PeriodUnit::Month);
        assert!(!variable.is_period_size_independent);
        assert_eq!(variable.set_input, Some(SetInputPolicy::DivideByPeriod));
        assert_eq!(variable.calculate_output, Some(CalculateOutputPolicy::Add));
        assert!(variable.is_input());
    }

    #[test]
    fn test_compile_is_idempotent() {
        let entities = fixtures::entities();
        let compiler = Compiler::new(&entities);
        let declaration = salaire().formula("formula_2015_01_01", Formula::constant(Value::Float(1.0)));
        assert_eq!(compiler.compile(&declaration).unwrap(), compiler.compile(&declaration).unwrap());
    }

    #[test]
    fn test_enum_default_must_be_a_variant() {
        let entities = fixtures::entities();
        let compiler = Compiler::new(&entities);

        let variable = compiler.compile(&statut_marital()).unwrap();
        assert_eq!(variable.default_value, Value::Enum(0));
        assert!(variable.is_period_size_independent);

        let err = compiler.compile(&statut_marital().set("default_value", "mariee")).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidDefaultValue { ref variable, .. } if variable == "statut_marital"));
    }

    #[test]
    fn test_missing_default_value() {
        let entities = fixtures::entities();
        let declaration = Declaration::new("salaire")
            .set("value_type", "float")
            .set("entity", "individu")
            .set("definition_period", "month");
        assert_eq!(
            Compiler::new(&entities).compile(&declaration).unwrap_err(),
            DefinitionError::InvalidDefaultValue { variable: "salaire".into(), reason: "missing".into() }
        );
    }

    #[test]
    fn test_enum_needs_possible_values() {
        let entities = fixtures::entities();
        let compiler = Compiler::new(&entities);
        let missing = Declaration::new("activite")
            .set("value_type", "enum")
            .set("default_value", "inactif")
            .set("entity", "individu")
            .set("definition_period", "month");
        assert_eq!(
            compiler.compile(&missing).unwrap_err(),
            DefinitionError::MissingAttribute { variable: "activite".into(), attribute: "possible_values" }
        );

        let empty = missing.clone().set("possible_values", json!([]));
        assert_eq!(
            compiler.compile(&empty).unwrap_err(),
            DefinitionError::MissingAttribute { variable: "activite".into(), attribute: "possible_values" }
        );

        let from_json = missing.set("possible_values", json!(["actif", "inactif"]));
        assert_eq!(compiler.compile(&from_json).unwrap().default_value, Value::Enum(1));
    }

    #[rstest]
    #[case::missing_value_type(Declaration::new("v"), "value_type")]
    #[case::missing_entity(
        Declaration::new("v").set("value_type", "boolean").set("default_value", false),
        "entity"
    )]
    #[case::missing_definition_period(
        Declaration::new("v").set("value_type", "boolean").set("default_value", false).set("entity", "individu"),
        "definition_period"
    )]
    fn test_missing_attributes(#[case] declaration: Declaration, #[case] attribute: &str) {
        let entities = fixtures::entities();
        match Compiler::new(&entities).compile(&declaration).unwrap_err() {
            DefinitionError::MissingAttribute { attribute: missing, .. } => assert_eq!(missing, attribute),
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[test]
    fn test_rule_order_first_violation_wins() {
        let entities = fixtures::entities();
        // Bad value type, bad entity and stray attributes: the value type is reported.
        let declaration = Declaration::new("v")
            .set("value_type", "decimal")
            .set("entity", "commune")
            .set("colour", "blue");
        assert!(matches!(
            Compiler::new(&entities).compile(&declaration).unwrap_err(),
            DefinitionError::InvalidValueType { .. }
        ));
    }

    #[test]
    fn test_unknown_entity() {
        let entities = fixtures::entities();
        let declaration = salaire().set("entity", "commune");
        assert_eq!(
            Compiler::new(&entities).compile(&declaration).unwrap_err(),
            DefinitionError::UnknownEntity { variable: "salaire".into(), entity: "commune".into() }
        );
    }

    #[test]
    fn test_role_restriction_uses_flattened_roles() {
        let entities = fixtures::entities();
        let compiler = Compiler::new(&entities);
        let base = Declaration::new("revenu_declarant")
            .set("value_type", "float")
            .set("default_value", 0)
            .set("entity", "foyer_fiscal")
            .set("definition_period", "year");

        let by_subrole = compiler.compile(&base.clone().set("role", "declarant_principal")).unwrap();
        assert_eq!(by_subrole.role.as_deref(), Some("declarant_principal"));

        assert_eq!(
            compiler.compile(&base.set("role", "parent")).unwrap_err(),
            DefinitionError::UnknownRole {
                variable: "revenu_declarant".into(),
                entity: "foyer_fiscal".into(),
                role: "parent".into(),
            }
        );
    }

    #[test]
    fn test_unknown_strategy() {
        let entities = fixtures::entities();
        let declaration = salaire().set("set_input", "set_input_spread");
        assert_eq!(
            Compiler::new(&entities).compile(&declaration).unwrap_err(),
            DefinitionError::UnknownStrategy {
                variable: "salaire".into(),
                attribute: "set_input",
                strategy: "set_input_spread".into(),
            }
        );
    }

    #[test]
    fn test_unexpected_attributes_are_all_reported() {
        let entities = fixtures::entities();
        let declaration = salaire()
            .set("colour", "blue")
            .set("base_function", "missing_value")
            .set("formulas", json!([]))
            .formula("formula", Formula::constant(Value::Float(0.0)));
        match Compiler::new(&entities).compile(&declaration).unwrap_err() {
            DefinitionError::UnexpectedAttributes { variable, attributes } => {
                assert_eq!(variable, "salaire");
                let found: HashSet<_> = attributes.into_iter().collect();
                let expected: HashSet<_> = ["colour", "base_function", "formulas"].iter().map(|s| s.to_string()).collect();
                assert_eq!(found, expected);
            }
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[test]
    fn test_formulas_keyed_by_start_date() {
        let entities = fixtures::entities();
        let declaration = salaire()
            .formula("formula", Formula::constant(Value::Float(1.0)))
            .formula("formula_2015_01_01", Formula::constant(Value::Float(2.0)))
            .formula("formula_2018", Formula::constant(Value::Float(3.0)));
        let variable = Compiler::new(&entities).compile(&declaration).unwrap();
        let starts: Vec<NaiveDate> = variable.formulas.keys().copied().collect();
        assert_eq!(
            starts,
            vec![
                FORMULA_INCEPTION,
                NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_invalid_formulas() {
        let entities = fixtures::entities();
        let compiler = Compiler::new(&entities);

        let bad_name = salaire().formula("formula_someday", Formula::constant(Value::Float(1.0)));
        assert!(matches!(compiler.compile(&bad_name), Err(DefinitionError::InvalidFormula { .. })));

        let data = salaire().set("formula_2015", 3);
        assert!(matches!(compiler.compile(&data), Err(DefinitionError::InvalidFormula { .. })));

        let after_end = salaire()
            .set("end", "2016-12-31")
            .formula("formula_2017", Formula::constant(Value::Float(1.0)));
        assert!(matches!(compiler.compile(&after_end), Err(DefinitionError::InvalidFormula { .. })));
    }

    #[test]
    fn test_metadata_attributes() {
        let entities = fixtures::entities();
        let declaration = salaire()
            .set("end", "2016-12-31")
            .set("unit", "currency")
            .set("cerfa_field", "1AJ")
            .set("reference", json!(["https://www.legifrance.gouv.fr"]))
            .set("documentation", "\n    Salaire net.\n      Hors primes.\n    ")
            .set("is_period_size_independent", true)
            .set("is_neutralized", true);
        let variable = Compiler::new(&entities).compile(&declaration).unwrap();
        assert_eq!(variable.end, NaiveDate::from_ymd_opt(2016, 12, 31));
        assert_eq!(variable.documentation.as_deref(), Some("Salaire net.\n  Hors primes."));
        assert!(variable.is_period_size_independent);
        assert_eq!(variable.reference.len(), 1);

        let bad_end = salaire().set("end", "31/12/2016");
        assert!(matches!(
            Compiler::new(&entities).compile(&bad_end),
            Err(DefinitionError::InvalidAttribute { ref attribute, .. }) if attribute == "end"
        ));
        let bad_flag = salaire().set("is_period_size_independent", "yes");
        assert!(Compiler::new(&entities).compile(&bad_flag).is_err());
    }

    #[test]
    fn test_string_max_length() {
        let entities = fixtures::entities();
        let compiler = Compiler::new(&entities);
        let code = Declaration::new("depcom")
            .set("value_type", "string")
            .set("max_length", 5)
            .set("default_value", "")
            .set("entity", "menage")
            .set("definition_period", "month");
        assert_eq!(compiler.compile(&code).unwrap().max_length, Some(5));

        let zero = code.clone().set("max_length", 0);
        assert!(matches!(compiler.compile(&zero), Err(DefinitionError::InvalidAttribute { .. })));

        let too_long = code.clone().set("default_value", "123456");
        assert!(matches!(compiler.compile(&too_long), Err(DefinitionError::InvalidDefaultValue { .. })));

        let not_a_string = salaire().set("max_length", 5);
        assert!(matches!(compiler.compile(&not_a_string), Err(DefinitionError::InvalidAttribute { .. })));
    }

    #[test]
    fn test_duplicate_names() {
        let batch = vec![salaire(), statut_marital(), salaire()];
        assert_eq!(duplicate_names(&batch), vec!["salaire".to_string()]);
    }
}
