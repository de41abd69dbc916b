use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::dropdown::DropdownOption;
use crate::resolver::{OptionsResolver, PropsResolver};
use crate::schema::PropertySchema;

/// The type tag of a property.
///
/// Every variant has exactly one coercion rule in the variables pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
  ShortText,
  LongText,
  Markdown,
  Number,
  Checkbox,
  DateTime,
  Json,
  File,
  SecretText,
  Object,
  Array,
  StaticDropdown,
  StaticMultiSelectDropdown,
  Dropdown,
  MultiSelectDropdown,
  DynamicProperties,
}

impl PropertyType {
  /// Whether values of this type are loaded by a resolver callback.
  pub fn is_dependent(&self) -> bool {
    matches!(
      self,
      PropertyType::Dropdown | PropertyType::MultiSelectDropdown | PropertyType::DynamicProperties
    )
  }
}

/// Type-specific part of a property definition.
#[derive(Clone)]
pub enum PropertyKind {
  ShortText,
  LongText,
  /// Display-only text shown in the builder. Carries no input value.
  Markdown {
    value: String,
  },
  Number,
  Checkbox,
  DateTime,
  Json,
  File,
  SecretText,
  Object,
  /// A list of values. With `properties`, every item is an object whose
  /// fields follow the nested schema.
  Array {
    properties: Option<PropertySchema>,
  },
  StaticDropdown {
    options: Vec<DropdownOption>,
  },
  StaticMultiSelectDropdown {
    options: Vec<DropdownOption>,
  },
  Dropdown {
    refreshers: Vec<String>,
    options: Arc<dyn OptionsResolver>,
  },
  MultiSelectDropdown {
    refreshers: Vec<String>,
    options: Arc<dyn OptionsResolver>,
  },
  DynamicProperties {
    refreshers: Vec<String>,
    props: Arc<dyn PropsResolver>,
  },
}

impl PropertyKind {
  pub fn property_type(&self) -> PropertyType {
    match self {
      PropertyKind::ShortText => PropertyType::ShortText,
      PropertyKind::LongText => PropertyType::LongText,
      PropertyKind::Markdown { .. } => PropertyType::Markdown,
      PropertyKind::Number => PropertyType::Number,
      PropertyKind::Checkbox => PropertyType::Checkbox,
      PropertyKind::DateTime => PropertyType::DateTime,
      PropertyKind::Json => PropertyType::Json,
      PropertyKind::File => PropertyType::File,
      PropertyKind::SecretText => PropertyType::SecretText,
      PropertyKind::Object => PropertyType::Object,
      PropertyKind::Array { .. } => PropertyType::Array,
      PropertyKind::StaticDropdown { .. } => PropertyType::StaticDropdown,
      PropertyKind::StaticMultiSelectDropdown { .. } => PropertyType::StaticMultiSelectDropdown,
      PropertyKind::Dropdown { .. } => PropertyType::Dropdown,
      PropertyKind::MultiSelectDropdown { .. } => PropertyType::MultiSelectDropdown,
      PropertyKind::DynamicProperties { .. } => PropertyType::DynamicProperties,
    }
  }

  /// Keys of the sibling properties this property reads. Empty for
  /// non-dependent kinds.
  pub fn refreshers(&self) -> &[String] {
    match self {
      PropertyKind::Dropdown { refreshers, .. }
      | PropertyKind::MultiSelectDropdown { refreshers, .. }
      | PropertyKind::DynamicProperties { refreshers, .. } => refreshers,
      _ => &[],
    }
  }
}

impl fmt::Debug for PropertyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("PropertyKind");
    s.field("type", &self.property_type());
    match self {
      PropertyKind::Array { properties } => {
        s.field("properties", properties);
      }
      PropertyKind::StaticDropdown { options } | PropertyKind::StaticMultiSelectDropdown { options } => {
        s.field("options", options);
      }
      PropertyKind::Dropdown { refreshers, .. }
      | PropertyKind::MultiSelectDropdown { refreshers, .. }
      | PropertyKind::DynamicProperties { refreshers, .. } => {
        s.field("refreshers", refreshers);
      }
      _ => {}
    }
    s.finish()
  }
}

/// A declared input of a piece action or trigger.
#[derive(Debug, Clone)]
pub struct PropertyDefinition {
  pub display_name: String,
  pub description: Option<String>,
  pub required: bool,
  pub default_value: Option<serde_json::Value>,
  pub kind: PropertyKind,
}

impl PropertyDefinition {
  /// Create an optional property of the given kind.
  pub fn new(display_name: impl Into<String>, kind: PropertyKind) -> Self {
    Self {
      display_name: display_name.into(),
      description: None,
      required: false,
      default_value: None,
      kind,
    }
  }

  pub fn short_text(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::ShortText)
  }

  pub fn long_text(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::LongText)
  }

  pub fn markdown(display_name: impl Into<String>, value: impl Into<String>) -> Self {
    Self::new(
      display_name,
      PropertyKind::Markdown {
        value: value.into(),
      },
    )
  }

  pub fn number(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::Number)
  }

  pub fn checkbox(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::Checkbox)
  }

  pub fn date_time(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::DateTime)
  }

  pub fn json(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::Json)
  }

  pub fn file(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::File)
  }

  pub fn secret_text(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::SecretText)
  }

  pub fn object(display_name: impl Into<String>) -> Self {
    Self::new(display_name, PropertyKind::Object)
  }

  pub fn array(display_name: impl Into<String>, properties: Option<PropertySchema>) -> Self {
    Self::new(display_name, PropertyKind::Array { properties })
  }

  pub fn static_dropdown(display_name: impl Into<String>, options: Vec<DropdownOption>) -> Self {
    Self::new(display_name, PropertyKind::StaticDropdown { options })
  }

  pub fn static_multi_select_dropdown(
    display_name: impl Into<String>,
    options: Vec<DropdownOption>,
  ) -> Self {
    Self::new(display_name, PropertyKind::StaticMultiSelectDropdown { options })
  }

  pub fn dropdown<I, S>(
    display_name: impl Into<String>,
    refreshers: I,
    options: Arc<dyn OptionsResolver>,
  ) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::new(
      display_name,
      PropertyKind::Dropdown {
        refreshers: refreshers.into_iter().map(Into::into).collect(),
        options,
      },
    )
  }

  pub fn multi_select_dropdown<I, S>(
    display_name: impl Into<String>,
    refreshers: I,
    options: Arc<dyn OptionsResolver>,
  ) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::new(
      display_name,
      PropertyKind::MultiSelectDropdown {
        refreshers: refreshers.into_iter().map(Into::into).collect(),
        options,
      },
    )
  }

  pub fn dynamic<I, S>(
    display_name: impl Into<String>,
    refreshers: I,
    props: Arc<dyn PropsResolver>,
  ) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::new(
      display_name,
      PropertyKind::DynamicProperties {
        refreshers: refreshers.into_iter().map(Into::into).collect(),
        props,
      },
    )
  }

  /// Mark the property as required (or not).
  pub fn required(mut self, required: bool) -> Self {
    self.required = required;
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
    self.default_value = Some(value.into());
    self
  }

  pub fn property_type(&self) -> PropertyType {
    self.kind.property_type()
  }

  pub fn refreshers(&self) -> &[String] {
    self.kind.refreshers()
  }
}

/// Serializes the declarative part of the definition. Resolver callbacks
/// are skipped.
impl Serialize for PropertyDefinition {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("PropertyDefinition", 7)?;
    s.serialize_field("displayName", &self.display_name)?;
    s.serialize_field("type", &self.property_type())?;
    s.serialize_field("required", &self.required)?;
    if let Some(description) = &self.description {
      s.serialize_field("description", description)?;
    }
    if let Some(default_value) = &self.default_value {
      s.serialize_field("defaultValue", default_value)?;
    }
    match &self.kind {
      PropertyKind::StaticDropdown { options } | PropertyKind::StaticMultiSelectDropdown { options } => {
        s.serialize_field("options", options)?;
      }
      PropertyKind::Array {
        properties: Some(properties),
      } => {
        s.serialize_field("properties", properties)?;
      }
      PropertyKind::Markdown { value } => {
        s.serialize_field("value", value)?;
      }
      _ => {}
    }
    if !self.refreshers().is_empty() {
      s.serialize_field("refreshers", self.refreshers())?;
    }
    s.end()
  }
}
