//! Piecework Refresh
//!
//! Resolves the options of dependent properties (`Dropdown`,
//! `MultiSelectDropdown`, `DynamicProperties`) in refresher order.
//!
//! - [`resolve_properties`] resolves a whole schema once.
//! - [`RefreshSession`] keeps results for a builder session and recomputes
//!   only what a value change affects. A newer change supersedes an
//!   in-flight call; late results from superseded calls are discarded.
//!
//! Callbacks are never invoked while a required upstream is missing, and a
//! failing callback yields a disabled result instead of an error.

mod config;
mod error;
mod resolve;
mod result;
mod session;

pub use config::ResolverConfig;
pub use error::RefreshError;
pub use resolve::resolve_properties;
pub use result::{DynamicFields, ResolutionResult};
pub use session::RefreshSession;
