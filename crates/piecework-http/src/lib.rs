//! Piecework HTTP
//!
//! The HTTP fetch collaborator. Resolver callbacks, URL-based file coercion,
//! and piece actions all go through the [`HttpClient`] trait so tests can
//! substitute a scripted client.
//!
//! [`ReqwestClient`] is the production implementation. It enforces a URL
//! policy before any request leaves the process: the URL must be absolute
//! and use an allowed scheme.

mod client;
mod error;
mod policy;
mod types;

pub use client::{HttpClient, HttpClientConfig, ReqwestClient};
pub use error::HttpError;
pub use policy::check_url;
pub use types::{Authentication, HttpMethod, HttpRequest, HttpResponse, RequestBody};
