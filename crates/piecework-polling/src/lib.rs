//! Piecework Polling
//!
//! Deduplication for polling triggers. A trigger's [`Poller`] fetches a batch
//! of recent items; [`PollingTrigger`] keeps a persisted [`PollingCursor`]
//! and hands back only the items not delivered before.
//!
//! # Strategies
//! - [`DedupeStrategy::Timebased`]: items carry `epochMilliSeconds`. An item
//!   is new when it is strictly newer than the cursor. The cursor advances to
//!   the newest timestamp fetched and never moves backwards.
//! - [`DedupeStrategy::LastItem`]: items carry an `id` and come newest first.
//!   Items ahead of the last delivered id are new.
//!
//! # Lifecycle
//! `on_enable` stores the initial cursor without delivering anything,
//! `run` delivers and advances, `test` delivers without advancing, and
//! `on_disable` deletes the cursor.
//!
//! The cursor is written before items are returned, and a failed fetch
//! leaves it untouched: delivery is at-least-once.

mod clock;
mod config;
mod cursor;
mod error;
mod item;
mod poller;
mod trigger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PollingConfig;
pub use cursor::{DedupeStrategy, PollingCursor};
pub use error::{FetchError, PollError};
pub use item::PolledItem;
pub use poller::{PollContext, Poller, PollerFn, poller_fn};
pub use trigger::{PollInput, PollingTrigger, TriggerState};
