//! Shared test model: the French tax-benefit entities and a few enumerations.
use crate::period::PeriodUnit;
use crate::store::{Entity, EntityRegistry, GroupEntity, Role, Variable};
use crate::type_system::{describe, PossibleValues, Value, ValueType};
use std::collections::BTreeMap;

fn group(key: &str, label: &str, plural: &str, roles: Vec<Role>) -> GroupEntity {
    GroupEntity::new(Entity::new(key, label, plural), roles).unwrap()
}

pub fn entities() -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    registry
        .register(Entity::new("individu", "Individu", "individus").with_documentation("Une personne physique."))
        .unwrap();
    registry
        .register(group(
            "famille",
            "Famille",
            "familles",
            vec![
                Role::new("parent", "Parent")
                    .with_plural("parents")
                    .with_max(2)
                    .with_subroles(["demandeur", "conjoint"]),
                Role::new("enfant", "Enfant").with_plural("enfants"),
            ],
        ))
        .unwrap();
    registry
        .register(group(
            "foyer_fiscal",
            "Foyer fiscal",
            "foyers_fiscaux",
            vec![
                Role::new("declarant", "Déclarant")
                    .with_plural("declarants")
                    .with_max(2)
                    .with_subroles(["declarant_principal", "conjoint"]),
                Role::new("personne_a_charge", "Personne à charge").with_plural("personnes_a_charge"),
            ],
        ))
        .unwrap();
    registry
        .register(group(
            "menage",
            "Ménage",
            "menages",
            vec![
                Role::new("personne_de_reference", "Personne de référence").with_max(1),
                Role::new("conjoint", "Conjoint").with_max(1),
                Role::new("enfant", "Enfant").with_plural("enfants"),
                Role::new("autre", "Autre").with_plural("autres"),
            ],
        ))
        .unwrap();
    registry
}

pub fn statut_marital() -> PossibleValues {
    PossibleValues::new([
        ("non_renseigne", "Non renseigné"),
        ("marie", "Marié"),
        ("celibataire", "Celibataire"),
        ("divorce", "Divorcé"),
        ("veuf", "Veuf"),
        ("pacse", "Pacsé"),
        ("jeune_veuf", "Jeune veuf"),
    ])
    .unwrap()
}

pub fn activite() -> PossibleValues {
    PossibleValues::new([
        ("actif", "Actif occupé"),
        ("chomeur", "Chômeur"),
        ("etudiant", "Étudiant, élève"),
        ("retraite", "Retraité"),
        ("inactif", "Autre, inactif"),
    ])
    .unwrap()
}

pub fn categorie_non_salarie() -> PossibleValues {
    PossibleValues::new([
        ("non_pertinent", "Non pertinent (l'individu n'est pas un travailleur indépendant)"),
        ("artisan", "Artisant"),
        ("commercant", "Commercant"),
        ("profession_liberale", "Profession libérale"),
    ])
    .unwrap()
}

pub fn categorie_salarie() -> PossibleValues {
    PossibleValues::from_keys([
        "prive_non_cadre",
        "prive_cadre",
        "public_titulaire_etat",
        "public_titulaire_militaire",
        "public_titulaire_territoriale",
        "public_titulaire_hospitaliere",
        "public_non_titulaire",
        "non_pertinent",
    ])
    .unwrap()
}

pub fn statut_occupation_logement() -> PossibleValues {
    PossibleValues::new([
        ("non_renseigne", "Non renseigné"),
        ("primo_accedant", "Accédant à la propriété"),
        ("proprietaire", "Propriétaire (non accédant) du logement"),
        ("locataire_hlm", "Locataire d'un logement HLM"),
        ("locataire_vide", "Locataire ou sous-locataire d'un logement loué vide non-HLM"),
        ("locataire_meuble", "Locataire ou sous-locataire d'un logement loué meublé ou d'une chambre d'hôtel"),
        ("loge_gratuitement", "Logé gratuitement par des parents, des amis ou l'employeur"),
        ("locataire_foyer", "Locataire d'un foyer (résidence universitaire, maison de retraite, foyer de jeune travailleur, résidence sociale...)"),
        ("sans_domicile", "Sans domicile stable"),
    ])
    .unwrap()
}

/// A monthly input variable on `individu` with the zero value of its type.
pub fn variable(name: &str, value_type: ValueType) -> Variable {
    let descriptor = describe(value_type);
    Variable {
        name: name.to_string(),
        value_type,
        possible_values: None,
        default_value: descriptor.default.unwrap_or(Value::Enum(0)),
        entity: "individu".to_string(),
        role: None,
        definition_period: PeriodUnit::Month,
        label: None,
        end: None,
        reference: Vec::new(),
        cerfa_field: None,
        unit: None,
        documentation: None,
        max_length: None,
        is_period_size_independent: descriptor.is_period_size_independent,
        set_input: None,
        calculate_output: None,
        formulas: BTreeMap::new(),
    }
}
