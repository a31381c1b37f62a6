//! Asset health intelligence engine.
//!
//! Turns raw sensor readings for industrial assets into risk scores,
//! statistically detected anomalies and plant-level executive summaries.
//! The crate follows the Explicit Module Boundary Pattern (EMBP): each
//! directory module exposes its public surface through its `mod.rs`
//! gateway, and the binary only wires `config`, `schema`, `store`,
//! `engine` and `routes` together.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::Config;
pub use engine::{Engine, EngineSettings};
pub use error::{EngineError, StoreError};
pub use store::{MemoryStore, PgStore, Store};
