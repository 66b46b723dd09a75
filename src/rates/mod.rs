//! Rate aggregation, persistence, and lookup.

pub mod lookup;
pub mod store;
pub mod updater;

pub use lookup::{quote, resolve_rate, ResolvedRate};
pub use store::{HistoryRecord, RateCache, RateEntry, RatesStore};
pub use updater::{RatesUpdater, UpdateSummary};
