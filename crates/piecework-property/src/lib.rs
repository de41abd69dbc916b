//! Piecework Property
//!
//! This crate contains the declaration types pieces use to describe the
//! inputs of their actions and triggers. A piece exports a [`PropertySchema`]:
//! an ordered map of property keys to [`PropertyDefinition`]s.
//!
//! Most definitions are plain typed fields (text, number, file, ...). Dependent
//! definitions (`Dropdown`, `MultiSelectDropdown`, `DynamicProperties`) declare
//! `refreshers` - the keys of sibling properties they read - and an async
//! callback that fetches their options or nested schema.
//!
//! # Example
//!
//! ```ignore
//! let schema = PropertySchema::new()
//!   .with("base_id", PropertyDefinition::dropdown("Base", ["auth"], options_fn(list_bases)))
//!   .with("table_id", PropertyDefinition::dropdown("Table", ["auth", "base_id"], options_fn(list_tables)))
//!   .with("fields", PropertyDefinition::dynamic("Fields", ["auth", "table_id"], props_fn(table_fields)));
//!
//! // Rejects cyclic or dangling refreshers before anything runs.
//! let graph = schema.validate()?;
//! ```

mod declaration;
mod definition;
mod dropdown;
mod error;
mod graph;
mod resolver;
mod schema;

pub use declaration::PropertyDeclaration;
pub use definition::{PropertyDefinition, PropertyKind, PropertyType};
pub use dropdown::{DropdownOption, DropdownState};
pub use error::SchemaError;
pub use graph::DependencyGraph;
pub use resolver::{
  OptionsFn, OptionsResolver, PropsFn, PropsResolver, ResolveContext, ResolverError, options_fn,
  props_fn,
};
pub use schema::{AUTH_REFRESHER, PropertySchema};
