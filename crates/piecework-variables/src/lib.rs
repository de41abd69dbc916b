//! Piecework Variables
//!
//! Turns a step's stored configuration into the concrete property bag an
//! action receives.
//!
//! # Flow
//! 1. Template rendering ([`resolve_inputs`]): input templates are rendered
//!    with minijinja against upstream step output. An input that is a single
//!    `{{ expression }}` keeps the JSON type of the expression.
//! 2. Coercion ([`Coercer`]): every value is coerced by its property type.
//!    File-shaped values (data URIs, URLs) are materialized as [`ApFile`]s.
//!    Malformed values become `None`; coercion itself never fails.
//! 3. Processing ([`process_inputs`]): defaults are applied, values are
//!    coerced in schema order, and missing required properties are reported.
//! 4. Zipping ([`zip`]): an object of parallel arrays fans out into one
//!    object per array index.

mod coerce;
mod error;
mod file;
mod mime;
mod process;
mod template;
mod zip;

pub use coerce::{CoercedValue, Coercer, CoercionConfig, CoercionRule, rule_for};
pub use error::VariablesError;
pub use file::{ApFile, filename_from_content_disposition, parse_data_uri};
pub use mime::extension_for_media_type;
pub use process::process_inputs;
pub use template::resolve_inputs;
pub use zip::{zip, zip_object};
