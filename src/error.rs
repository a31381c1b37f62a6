//! Error taxonomy for the engine and its store.
//!
//! Missing data is not an error here: risk scoring degrades to the cold-start
//! baseline and anomaly detection returns an empty result. What remains is
//! the one user-facing condition (a plant with no assets) and storage
//! failures, which are fatal and handed back to the caller untouched.

use crate::models::UnknownVariant;

// ---

/// Failure reported by a [`Store`](crate::store::Store) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // ---
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored value: {0}")]
    Decode(#[from] UnknownVariant),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure returned by the engine services.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // ---
    #[error("No assets found for plant {plant_id}")]
    NoAssets { plant_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type EngineResult<T> = Result<T, EngineError>;
