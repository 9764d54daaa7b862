use super::entity::{EntityError, EntityKind, GroupEntity, Role};
use std::collections::HashMap;

/// Process-wide table of entity definitions.
///
/// Append-only while the model is being assembled; once shared behind an
/// `Arc` it is read without locks.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<EntityKind>,
    by_key: HashMap<String, usize>,
}

impl EntityRegistry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.entities.len() }

    pub fn register(&mut self, entity: impl Into<EntityKind>) -> Result<(), EntityError> {
        let entity = entity.into();
        let key = entity.key().to_string();
        if self.by_key.contains_key(&key) {
            return Err(EntityError::DuplicateEntity(key));
        }
        tracing::debug!(entity = %key, person = entity.is_person(), "registering entity");
        self.by_key.insert(key, self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    pub fn resolve(&self, key: &str) -> Result<&EntityKind, EntityError> {
        self.by_key
            .get(key)
            .map(|&idx| &self.entities[idx])
            .ok_or_else(|| EntityError::UnknownEntity(key.to_string()))
    }

    pub fn group(&self, key: &str) -> Result<&GroupEntity, EntityError> {
        self.resolve(key)?
            .as_group()
            .ok_or_else(|| EntityError::NotAGroup(key.to_string()))
    }

    pub fn role(&self, entity: &str, role: &str) -> Result<&Role, EntityError> {
        self.group(entity)?.role(role).ok_or_else(|| EntityError::UnknownRole {
            entity: entity.to_string(),
            role: role.to_string(),
        })
    }

    pub fn flattened_roles(&self, entity: &str) -> Result<Vec<&str>, EntityError> {
        Ok(self.group(entity)?.flattened_roles())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityKind> {
        self.entities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::store::Entity;

    #[test]
    fn test_register_and_resolve() {
        let registry = fixtures::entities();
        assert_eq!(registry.count(), 4);
        assert!(registry.resolve("individu").unwrap().is_person());
        assert_eq!(registry.group("famille").unwrap().key(), "famille");
        assert_eq!(registry.role("famille", "parent").unwrap().max, Some(2));
    }

    #[test]
    fn test_duplicate_entity() {
        let mut registry = fixtures::entities();
        let err = registry.register(Entity::new("individu", "Individu", "individus")).unwrap_err();
        assert_eq!(err, EntityError::DuplicateEntity("individu".into()));
    }

    #[test]
    fn test_unknown_entity_and_role() {
        let registry = fixtures::entities();
        assert_eq!(registry.resolve("commune").unwrap_err(), EntityError::UnknownEntity("commune".into()));
        assert_eq!(registry.group("individu").unwrap_err(), EntityError::NotAGroup("individu".into()));
        assert!(matches!(
            registry.role("famille", "grand_parent"),
            Err(EntityError::UnknownRole { .. })
        ));
    }

    #[test]
    fn test_flattened_roles() {
        let registry = fixtures::entities();
        assert_eq!(
            registry.flattened_roles("foyer_fiscal").unwrap(),
            vec!["declarant", "declarant_principal", "conjoint", "personne_a_charge"]
        );
    }
}
