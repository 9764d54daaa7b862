//! Atomic and group entities, and the roles partitioning group members.
use smallvec::SmallVec;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("Entity '{0}' is already registered")]
    DuplicateEntity(String),
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("Entity '{0}' is not a group entity")]
    NotAGroup(String),
    #[error("Group entity '{entity}' declares no role")]
    NoRoles { entity: String },
    #[error("Role key '{role}' is declared more than once in '{entity}'")]
    DuplicateRole { entity: String, role: String },
    #[error("Role '{role}' of '{entity}' has a zero maximum")]
    InvalidRoleCapacity { entity: String, role: String },
    #[error("Role '{role}' of '{entity}' is capped at {max} but declares {subroles} sub-roles")]
    InconsistentRoleCapacity { entity: String, role: String, max: u32, subroles: usize },
    #[error("Unknown role '{role}' in entity '{entity}'")]
    UnknownRole { entity: String, role: String },
}

/// A named slot within a group entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub key: String,
    pub label: String,
    pub plural: Option<String>,
    /// Single-holder slots partitioning the role (e.g. parent -> demandeur, conjoint).
    pub subroles: SmallVec<[String; 2]>,
    pub documentation: Option<String>,
    /// Maximum number of holders per group instance. `None` is unbounded.
    pub max: Option<u32>,
}

impl Role {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            plural: None,
            subroles: SmallVec::new(),
            documentation: None,
            max: None,
        }
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    pub fn with_max(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_subroles<I, S>(mut self, subroles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subroles = subroles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    /// Effective holder limit: the declared `max`, otherwise one holder per sub-role.
    pub fn capacity(&self) -> Option<u32> {
        match self.max {
            Some(max) => Some(max),
            None if !self.subroles.is_empty() => Some(self.subroles.len() as u32),
            None => None,
        }
    }

    /// True if `key` names this role or one of its sub-roles.
    pub fn covers(&self, key: &str) -> bool {
        self.key == key || self.is_subrole(key)
    }

    pub fn is_subrole(&self, key: &str) -> bool {
        self.subroles.iter().any(|s| s == key)
    }
}

/// An atomic simulation subject (one person).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub key: String,
    pub label: String,
    pub plural: String,
    pub documentation: String,
}

impl Entity {
    pub fn new(key: impl Into<String>, label: impl Into<String>, plural: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            plural: plural.into(),
            documentation: String::new(),
        }
    }

    pub fn with_documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = doc.into();
        self
    }
}

/// A container of persons partitioned by role (family, household, fiscal unit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntity {
    pub entity: Entity,
    roles: Vec<Role>,
    pub roles_description: Option<String>,
}

impl GroupEntity {
    /// Validates the role set: at least one role, unique keys across roles
    /// and sub-roles, positive caps, and caps that leave room for every sub-role.
    pub fn new(entity: Entity, roles: Vec<Role>) -> Result<Self, EntityError> {
        let name = || entity.key.clone();
        if roles.is_empty() {
            return Err(EntityError::NoRoles { entity: name() });
        }

        let mut seen = HashSet::new();
        for role in &roles {
            for key in std::iter::once(&role.key).chain(role.subroles.iter()) {
                if !seen.insert(key.as_str()) {
                    return Err(EntityError::DuplicateRole { entity: name(), role: key.clone() });
                }
            }
            match role.max {
                Some(0) => {
                    return Err(EntityError::InvalidRoleCapacity { entity: name(), role: role.key.clone() });
                }
                Some(max) if (max as usize) < role.subroles.len() => {
                    return Err(EntityError::InconsistentRoleCapacity {
                        entity: name(),
                        role: role.key.clone(),
                        max,
                        subroles: role.subroles.len(),
                    });
                }
                _ => {}
            }
        }

        Ok(Self { entity, roles, roles_description: None })
    }

    pub fn with_roles_description(mut self, description: impl Into<String>) -> Self {
        self.roles_description = Some(description.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.entity.key
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn role(&self, key: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.key == key)
    }

    /// The role owning `key`, whether `key` is a role or one of its sub-roles.
    pub fn role_covering(&self, key: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.covers(key))
    }

    /// Every role key followed by its sub-role keys, in declaration order.
    pub fn flattened_roles(&self) -> Vec<&str> {
        self.roles
            .iter()
            .flat_map(|r| std::iter::once(r.key.as_str()).chain(r.subroles.iter().map(String::as_str)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Person(Entity),
    Group(GroupEntity),
}

impl EntityKind {
    pub fn key(&self) -> &str {
        match self {
            EntityKind::Person(e) => &e.key,
            EntityKind::Group(g) => &g.entity.key,
        }
    }

    pub fn entity(&self) -> &Entity {
        match self {
            EntityKind::Person(e) => e,
            EntityKind::Group(g) => &g.entity,
        }
    }

    pub fn is_person(&self) -> bool {
        matches!(self, EntityKind::Person(_))
    }

    pub fn as_group(&self) -> Option<&GroupEntity> {
        match self {
            EntityKind::Group(g) => Some(g),
            EntityKind::Person(_) => None,
        }
    }
}

impl From<Entity> for EntityKind {
    fn from(entity: Entity) -> Self {
        EntityKind::Person(entity)
    }
}

impl From<GroupEntity> for EntityKind {
    fn from(group: GroupEntity) -> Self {
        EntityKind::Group(group)
    }
}
