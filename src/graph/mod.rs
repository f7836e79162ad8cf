//! Graph persistence.

pub mod store;

pub use store::{GraphStats, GraphStore, StoreSearchOptions};
