use super::registry::EntityRegistry;
use super::variable::Variable;
use crate::display::description::VariableDescription;
use crate::validation::{Compiler, Declaration, DefinitionError, Validator};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;

/// The compiled model: every variable, keyed by name, with the entities they live on.
///
/// Variables are immutable once compiled and handed out as `Arc`s so that
/// resolvers on several threads can share them.
#[derive(Debug, Clone)]
pub struct VariableCatalog {
    entities: Arc<EntityRegistry>,
    variables: HashMap<String, Arc<Variable>>,
    order: Vec<String>,
}

impl VariableCatalog {
    pub fn new(entities: Arc<EntityRegistry>) -> Self {
        Self { entities, variables: HashMap::new(), order: Vec::new() }
    }

    /// Compiles and adds a single declaration.
    pub fn compile(&mut self, declaration: &Declaration) -> Result<Arc<Variable>, DefinitionError> {
        if self.variables.contains_key(declaration.name()) {
            return Err(DefinitionError::DuplicateVariable(declaration.name().to_string()));
        }
        let variable = Arc::new(Compiler::new(&self.entities).compile(declaration)?);
        self.insert(Arc::clone(&variable));
        Ok(variable)
    }

    /// Builds a catalog from a batch, reporting every broken declaration at once.
    pub fn from_declarations(
        entities: Arc<EntityRegistry>,
        declarations: &[Declaration],
    ) -> Result<Self, Vec<DefinitionError>> {
        let variables = Validator::new(&entities).validate(declarations)?;
        let mut catalog = Self::new(entities);
        for variable in variables {
            catalog.insert(Arc::new(variable));
        }
        tracing::info!(variables = catalog.len(), entities = catalog.entities.count(), "variable catalog ready");
        Ok(catalog)
    }

    fn insert(&mut self, variable: Arc<Variable>) {
        self.order.push(variable.name.clone());
        self.variables.insert(variable.name.clone(), variable);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Variable>> {
        self.variables.get(name)
    }

    pub fn entities(&self) -> &Arc<EntityRegistry> {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Variables in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Variable>> {
        self.order.iter().filter_map(move |name| self.variables.get(name))
    }

    /// Variables defined on `entity`.
    pub fn on_entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Arc<Variable>> + 'a {
        self.iter().filter(move |v| v.entity == entity)
    }

    pub fn describe_all(&self) -> Vec<VariableDescription> {
        self.iter().map(|v| v.describe()).collect()
    }

    /// Metadata of the whole catalog as a JSON object keyed by variable name.
    pub fn to_json(&self) -> Json {
        let map = self
            .iter()
            .map(|v| (v.name.clone(), serde_json::to_value(v.describe()).unwrap_or(Json::Null)))
            .collect();
        Json::Object(map)
    }
}
