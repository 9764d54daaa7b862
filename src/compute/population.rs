//! Entity instances and their group memberships.
use crate::store::{EntityError, EntityRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PopulationError {
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error("'{0}' is not a person entity")]
    NotAPerson(String),
    #[error("Role '{role}' of {group} is full ({capacity} max)")]
    RoleCapacityExceeded { group: String, role: String, capacity: u32 },
    #[error("{person} already belongs to {group}")]
    AlreadyMember { person: String, group: String },
}

/// One simulated subject: a person or a group, identified within its entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityInstance {
    entity: String,
    id: String,
}

impl EntityInstance {
    pub fn new(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self { entity: entity.into(), id: id.into() }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.id)
    }
}

/// A person holding a role in a group instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub person: EntityInstance,
    pub role: String,
}

/// Source of group compositions for the resolver.
pub trait PopulationProvider: Send + Sync {
    /// Members of `group` with the role each holds, in a stable order.
    fn members(&self, group: &EntityInstance) -> Vec<Membership>;
}

/// In-memory population that enforces the entity model on every join.
#[derive(Debug, Clone)]
pub struct Population {
    entities: Arc<EntityRegistry>,
    groups: HashMap<EntityInstance, Vec<Membership>>,
    /// (group entity, person) -> group instance
    belongs_to: HashMap<(String, EntityInstance), EntityInstance>,
}

impl Population {
    pub fn new(entities: Arc<EntityRegistry>) -> Self {
        Self { entities, groups: HashMap::new(), belongs_to: HashMap::new() }
    }

    /// Adds `person` to `group` as `role` (a role key or a sub-role key).
    ///
    /// Sub-role holders count against their parent role's capacity, and each
    /// sub-role is a single slot.
    pub fn join(&mut self, group: &EntityInstance, person: &EntityInstance, role: &str) -> Result<(), PopulationError> {
        let group_entity = self.entities.group(group.entity())?;
        if !self.entities.resolve(person.entity())?.is_person() {
            return Err(PopulationError::NotAPerson(person.entity().to_string()));
        }
        let parent = group_entity.role_covering(role).ok_or_else(|| EntityError::UnknownRole {
            entity: group.entity().to_string(),
            role: role.to_string(),
        })?;

        let membership_key = (group.entity().to_string(), person.clone());
        if let Some(current) = self.belongs_to.get(&membership_key) {
            return Err(PopulationError::AlreadyMember { person: person.to_string(), group: current.to_string() });
        }

        let members = self.groups.get(group).map(Vec::as_slice).unwrap_or_default();
        let full = |role: &str, capacity: u32| PopulationError::RoleCapacityExceeded {
            group: group.to_string(),
            role: role.to_string(),
            capacity,
        };
        if parent.is_subrole(role) && members.iter().any(|m| m.role == role) {
            return Err(full(role, 1));
        }
        if let Some(capacity) = parent.capacity() {
            let held = members.iter().filter(|m| parent.covers(&m.role)).count();
            if held >= capacity as usize {
                return Err(full(&parent.key, capacity));
            }
        }

        tracing::debug!(%group, %person, role, "joining group");
        self.groups
            .entry(group.clone())
            .or_default()
            .push(Membership { person: person.clone(), role: role.to_string() });
        self.belongs_to.insert(membership_key, group.clone());
        Ok(())
    }

    /// The instance of `group_entity` that `person` belongs to.
    pub fn group_of(&self, group_entity: &str, person: &EntityInstance) -> Option<&EntityInstance> {
        self.belongs_to.get(&(group_entity.to_string(), person.clone()))
    }

    pub fn groups(&self) -> impl Iterator<Item = &EntityInstance> {
        self.groups.keys()
    }
}

impl PopulationProvider for Population {
    fn members(&self, group: &EntityInstance) -> Vec<Membership> {
        self.groups.get(group).cloned().unwrap_or_default()
    }
}
