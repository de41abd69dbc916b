use std::collections::{HashMap, HashSet};

use crate::error::SchemaError;
use crate::schema::{AUTH_REFRESHER, PropertySchema};

/// Refresher dependencies of a validated schema.
///
/// An edge `upstream -> downstream` means `downstream` lists `upstream` in
/// its refreshers. The `auth` refresher is not a node.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
  /// Adjacency list: key -> keys that refresh on it.
  downstream: HashMap<String, Vec<String>>,
  /// All keys in topological order, ties broken by declaration order.
  order: Vec<String>,
  /// Keys grouped by depth. Keys in the same level never depend on each other.
  levels: Vec<Vec<String>>,
}

impl DependencyGraph {
  /// Build the graph for a schema, rejecting invalid refreshers.
  pub fn build(schema: &PropertySchema) -> Result<Self, SchemaError> {
    let mut downstream: HashMap<String, Vec<String>> = HashMap::new();
    let mut upstream: HashMap<String, Vec<String>> = HashMap::new();

    for key in schema.keys() {
      downstream.entry(key.clone()).or_default();
      upstream.entry(key.clone()).or_default();
    }

    for (key, definition) in schema.iter() {
      let mut seen = HashSet::new();
      for refresher in definition.refreshers() {
        if !seen.insert(refresher.as_str()) {
          return Err(SchemaError::DuplicateRefresher {
            property: key.clone(),
            refresher: refresher.clone(),
          });
        }
        if refresher == AUTH_REFRESHER && !schema.contains_key(AUTH_REFRESHER) {
          continue;
        }
        if !schema.contains_key(refresher) {
          return Err(SchemaError::UnknownRefresher {
            property: key.clone(),
            refresher: refresher.clone(),
          });
        }
        downstream
          .entry(refresher.clone())
          .or_default()
          .push(key.clone());
        upstream.entry(key.clone()).or_default().push(refresher.clone());
      }
    }

    if let Some(path) = find_cycle(schema, &downstream) {
      return Err(SchemaError::CycleDetected { path });
    }

    let (order, levels) = topological_levels(schema, &upstream);

    Ok(Self {
      downstream,
      order,
      levels,
    })
  }

  /// All keys in resolution order.
  pub fn order(&self) -> &[String] {
    &self.order
  }

  /// Keys grouped by dependency depth.
  pub fn levels(&self) -> &[Vec<String>] {
    &self.levels
  }

  /// Keys that list `key` directly in their refreshers.
  pub fn downstream(&self, key: &str) -> &[String] {
    self
      .downstream
      .get(key)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Everything transitively downstream of `key`, in resolution order.
  /// `key` itself is not included.
  pub fn affected_by(&self, key: &str) -> Vec<String> {
    let mut affected = HashSet::new();
    let mut stack: Vec<&str> = vec![key];

    while let Some(current) = stack.pop() {
      for next in self.downstream(current) {
        if affected.insert(next.as_str()) {
          stack.push(next.as_str());
        }
      }
    }

    self
      .order
      .iter()
      .filter(|k| affected.contains(k.as_str()))
      .cloned()
      .collect()
  }

  /// Depth of a key (0 for keys with no sibling refreshers).
  pub fn level_of(&self, key: &str) -> Option<usize> {
    self
      .levels
      .iter()
      .position(|level| level.iter().any(|k| k == key))
  }
}

/// DFS with coloring: 0 = unvisited, 1 = in progress, 2 = done.
/// Returns the keys along the first cycle found.
fn find_cycle<'a>(
  schema: &'a PropertySchema,
  downstream: &'a HashMap<String, Vec<String>>,
) -> Option<Vec<String>> {
  fn dfs<'b>(
    node: &'b str,
    downstream: &'b HashMap<String, Vec<String>>,
    color: &mut HashMap<&'b str, u8>,
    path: &mut Vec<&'b str>,
  ) -> Option<Vec<String>> {
    color.insert(node, 1);
    path.push(node);

    if let Some(neighbors) = downstream.get(node) {
      for neighbor in neighbors {
        match color.get(neighbor.as_str()) {
          Some(1) => {
            // Back edge: the cycle is the path suffix starting at `neighbor`.
            let start = path.iter().position(|k| *k == neighbor.as_str()).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|k| k.to_string()).collect();
            cycle.push(neighbor.clone());
            return Some(cycle);
          }
          Some(0) | None => {
            if let Some(cycle) = dfs(neighbor.as_str(), downstream, color, path) {
              return Some(cycle);
            }
          }
          _ => {}
        }
      }
    }

    path.pop();
    color.insert(node, 2);
    None
  }

  let mut color: HashMap<&'a str, u8> = schema.keys().map(|k| (k.as_str(), 0u8)).collect();
  for key in schema.keys() {
    if color.get(key.as_str()) == Some(&0) {
      let mut path = Vec::new();
      if let Some(cycle) = dfs(key.as_str(), downstream, &mut color, &mut path) {
        return Some(cycle);
      }
    }
  }
  None
}

/// Kahn-style leveling over an acyclic graph.
fn topological_levels(
  schema: &PropertySchema,
  upstream: &HashMap<String, Vec<String>>,
) -> (Vec<String>, Vec<Vec<String>>) {
  let mut depth: HashMap<&str, usize> = HashMap::new();
  let mut remaining: Vec<&str> = schema.keys().map(|k| k.as_str()).collect();

  while !remaining.is_empty() {
    let before = remaining.len();
    remaining.retain(|key| {
      let parents = upstream.get(*key).map(|v| v.as_slice()).unwrap_or(&[]);
      let mut max_parent = None;
      for parent in parents {
        match depth.get(parent.as_str()) {
          Some(d) => max_parent = Some(max_parent.map_or(*d, |m: usize| m.max(*d))),
          None => return true,
        }
      }
      depth.insert(*key, max_parent.map_or(0, |d| d + 1));
      false
    });
    if remaining.len() == before {
      // Unreachable for graphs that passed cycle detection.
      break;
    }
  }

  let level_count = depth.values().copied().max().map_or(0, |d| d + 1);
  let mut levels: Vec<Vec<String>> = vec![Vec::new(); level_count];
  for key in schema.keys() {
    if let Some(d) = depth.get(key.as_str()) {
      levels[*d].push(key.clone());
    }
  }
  let order = levels.iter().flatten().cloned().collect();

  (order, levels)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::definition::PropertyDefinition;
  use crate::dropdown::DropdownState;
  use crate::resolver::options_fn;

  fn dropdown(refreshers: &[&str]) -> PropertyDefinition {
    PropertyDefinition::dropdown(
      "Dropdown",
      refreshers.iter().copied(),
      options_fn(|_ctx| async { Ok(DropdownState::ready(vec![])) }),
    )
  }

  #[test]
  fn test_order_follows_refreshers() {
    // Declared out of dependency order on purpose.
    let schema = PropertySchema::new()
      .with("table", dropdown(&["auth", "base"]))
      .with("base", dropdown(&["auth"]))
      .with("view", dropdown(&["table"]))
      .with("note", PropertyDefinition::short_text("Note"));

    let graph = schema.validate().unwrap();
    assert_eq!(graph.order(), ["base", "note", "table", "view"]);
    assert_eq!(graph.levels().len(), 3);
    assert_eq!(graph.level_of("base"), Some(0));
    assert_eq!(graph.level_of("view"), Some(2));
  }

  #[test]
  fn test_affected_by_is_transitive_and_ordered() {
    let schema = PropertySchema::new()
      .with("base", dropdown(&["auth"]))
      .with("table", dropdown(&["base"]))
      .with("view", dropdown(&["table"]))
      .with("other", dropdown(&["auth"]));

    let graph = schema.validate().unwrap();
    assert_eq!(graph.affected_by("base"), vec!["table", "view"]);
    assert_eq!(graph.affected_by("view"), Vec::<String>::new());
    assert!(graph.affected_by("auth").is_empty());
  }

  #[test]
  fn test_cycle_is_rejected() {
    let schema = PropertySchema::new()
      .with("a", dropdown(&["c"]))
      .with("b", dropdown(&["a"]))
      .with("c", dropdown(&["b"]));

    let err = schema.validate().unwrap_err();
    match err {
      SchemaError::CycleDetected { path } => {
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 4);
      }
      other => panic!("expected cycle, got {other:?}"),
    }
  }

  #[test]
  fn test_self_refresh_is_a_cycle() {
    let schema = PropertySchema::new().with("a", dropdown(&["a"]));
    assert!(matches!(
      schema.validate(),
      Err(SchemaError::CycleDetected { .. })
    ));
  }

  #[test]
  fn test_unknown_refresher_is_rejected() {
    let schema = PropertySchema::new().with("table", dropdown(&["base"]));
    assert_eq!(
      schema.validate().unwrap_err(),
      SchemaError::UnknownRefresher {
        property: "table".to_string(),
        refresher: "base".to_string(),
      }
    );
  }

  #[test]
  fn test_duplicate_refresher_is_rejected() {
    let schema = PropertySchema::new()
      .with("base", dropdown(&[]))
      .with("table", dropdown(&["base", "base"]));
    assert!(matches!(
      schema.validate(),
      Err(SchemaError::DuplicateRefresher { .. })
    ));
  }
}
