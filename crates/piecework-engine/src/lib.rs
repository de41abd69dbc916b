//! Piecework Engine
//!
//! Drives piece steps and hands the resulting work to a [`FlowDispatcher`].
//!
//! # Architecture
//!
//! ```text
//! upstream output ──► ActionRunner ──► render ─► coerce ─► zip ──► FlowDispatcher
//!                                                                     ▲
//! PollingRunner ──tick──► PollingTrigger::run ──► new items ──────────┘
//! ```
//!
//! - [`ActionRunner`] turns an action step's input templates into one or
//!   more coerced property bags and dispatches each as its own run.
//! - [`PollingRunner`] runs a polling trigger on an interval and dispatches
//!   every new item as its own run.
//!
//! Both emit [`EngineEvent`]s to an [`EventNotifier`].

mod action;
mod dispatcher;
mod error;
mod events;
mod runner;

pub use action::{ActionRunner, ActionStep};
pub use dispatcher::{ChannelDispatcher, DispatchError, FlowDispatcher, FlowRun};
pub use error::EngineError;
pub use events::{ChannelNotifier, EngineEvent, EventNotifier, NoopNotifier};
pub use runner::{PollingRunner, PollingRunnerConfig};
