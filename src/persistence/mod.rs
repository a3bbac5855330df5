//! Save-file persistence for game sessions.
//!
//! One JSON file holds many session slots keyed by an integer ID.

pub mod format;
pub mod reader;
pub mod writer;

use std::path::PathBuf;

use crate::shop::MismatchedStockLists;

pub use format::{SaveFile, SessionSummary};
pub use reader::PersistenceReader;
pub use writer::PersistenceWriter;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to access save file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed save data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot find session ID {0}")]
    SessionNotFound(u32),
    #[error("unknown item '{name}' of type '{item_type}'")]
    UnknownItem { name: String, item_type: String },
    #[error("unknown pet type '{0}'")]
    UnknownSpecies(String),
    #[error("unknown pet state '{0}'")]
    UnknownPetState(String),
    #[error("inventory lists differ in length: {items} items, {quantities} quantities")]
    InventoryMismatch { items: usize, quantities: usize },
    #[error(transparent)]
    ShopMismatch(#[from] MismatchedStockLists),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }
}
