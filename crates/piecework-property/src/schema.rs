use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::definition::PropertyDefinition;
use crate::error::SchemaError;
use crate::graph::DependencyGraph;

/// Refresher key that refers to the step's connection rather than a sibling
/// property.
pub const AUTH_REFRESHER: &str = "auth";

/// An ordered mapping of property keys to definitions.
///
/// Declaration order is kept: it is the tie-break for resolution order and
/// the order the builder renders fields in.
#[derive(Debug, Clone, Default)]
pub struct PropertySchema {
  properties: IndexMap<String, PropertyDefinition>,
}

impl PropertySchema {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a property. A later definition for the same key replaces the
  /// earlier one but keeps its position.
  pub fn with(mut self, key: impl Into<String>, definition: PropertyDefinition) -> Self {
    self.insert(key, definition);
    self
  }

  pub fn insert(&mut self, key: impl Into<String>, definition: PropertyDefinition) {
    self.properties.insert(key.into(), definition);
  }

  pub fn get(&self, key: &str) -> Option<&PropertyDefinition> {
    self.properties.get(key)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.properties.contains_key(key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &String> {
    self.properties.keys()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyDefinition)> {
    self.properties.iter()
  }

  pub fn len(&self) -> usize {
    self.properties.len()
  }

  pub fn is_empty(&self) -> bool {
    self.properties.is_empty()
  }

  /// Validate the refresher declarations and build the dependency graph.
  ///
  /// Fails if a refresher names an undeclared key (other than
  /// [`AUTH_REFRESHER`]), is listed twice, or the refreshers form a cycle.
  pub fn validate(&self) -> Result<DependencyGraph, SchemaError> {
    DependencyGraph::build(self)
  }
}

impl Serialize for PropertySchema {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.properties.serialize(serializer)
  }
}

impl FromIterator<(String, PropertyDefinition)> for PropertySchema {
  fn from_iter<T: IntoIterator<Item = (String, PropertyDefinition)>>(iter: T) -> Self {
    Self {
      properties: iter.into_iter().collect(),
    }
  }
}
