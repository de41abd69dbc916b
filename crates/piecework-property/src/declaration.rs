//! Loading schemas from JSON step definitions.
//!
//! Only declarative kinds can be loaded this way. Dependent kinds carry a
//! resolver callback and must be built in code.
//!
//! ```json
//! {
//!   "to": { "displayName": "To", "type": "SHORT_TEXT", "required": true },
//!   "rows": {
//!     "displayName": "Rows",
//!     "type": "ARRAY",
//!     "properties": { "qty": { "displayName": "Qty", "type": "NUMBER" } }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::definition::{PropertyDefinition, PropertyKind, PropertyType};
use crate::dropdown::DropdownOption;
use crate::error::SchemaError;
use crate::schema::PropertySchema;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDeclaration {
  pub display_name: String,
  #[serde(rename = "type")]
  pub property_type: PropertyType,
  #[serde(default)]
  pub required: bool,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub default_value: Option<serde_json::Value>,
  #[serde(default)]
  pub options: Vec<DropdownOption>,
  #[serde(default)]
  pub properties: Option<IndexMap<String, PropertyDeclaration>>,
  /// Markdown body.
  #[serde(default)]
  pub value: Option<String>,
}

impl PropertyDeclaration {
  pub fn into_definition(self, key: &str) -> Result<PropertyDefinition, SchemaError> {
    let kind = match self.property_type {
      PropertyType::ShortText => PropertyKind::ShortText,
      PropertyType::LongText => PropertyKind::LongText,
      PropertyType::Markdown => PropertyKind::Markdown {
        value: self.value.unwrap_or_default(),
      },
      PropertyType::Number => PropertyKind::Number,
      PropertyType::Checkbox => PropertyKind::Checkbox,
      PropertyType::DateTime => PropertyKind::DateTime,
      PropertyType::Json => PropertyKind::Json,
      PropertyType::File => PropertyKind::File,
      PropertyType::SecretText => PropertyKind::SecretText,
      PropertyType::Object => PropertyKind::Object,
      PropertyType::Array => PropertyKind::Array {
        properties: self.properties.map(PropertySchema::from_declarations).transpose()?,
      },
      PropertyType::StaticDropdown => PropertyKind::StaticDropdown {
        options: self.options,
      },
      PropertyType::StaticMultiSelectDropdown => PropertyKind::StaticMultiSelectDropdown {
        options: self.options,
      },
      property_type @ (PropertyType::Dropdown
      | PropertyType::MultiSelectDropdown
      | PropertyType::DynamicProperties) => {
        return Err(SchemaError::ResolverRequired {
          property: key.to_string(),
          property_type,
        });
      }
    };

    let mut definition = PropertyDefinition::new(self.display_name, kind).required(self.required);
    definition.description = self.description;
    definition.default_value = self.default_value;
    Ok(definition)
  }
}

impl PropertySchema {
  /// Build a schema from declarations, keeping their order.
  pub fn from_declarations(
    declarations: IndexMap<String, PropertyDeclaration>,
  ) -> Result<Self, SchemaError> {
    let mut schema = PropertySchema::new();
    for (key, declaration) in declarations {
      let definition = declaration.into_definition(&key)?;
      schema.insert(key, definition);
    }
    Ok(schema)
  }
}

/// Deserializes from declarations. See [`PropertySchema::from_declarations`].
impl<'de> Deserialize<'de> for PropertySchema {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let declarations = IndexMap::<String, PropertyDeclaration>::deserialize(deserializer)?;
    PropertySchema::from_declarations(declarations).map_err(serde::de::Error::custom)
  }
}
