use std::{fmt::Debug, hash::Hash};

use serde_json::Value;

pub mod config;
pub mod controller;
pub mod error;
pub mod source;
pub mod transport;
pub mod view;

pub use controller::{
    ControllerOptions, ControllerPhase, PaginationFilterController, ReloadRequest, ReloadStream,
};
pub use error::ListError;
pub use source::{LoadOutcome, RemoteListSource, RowTransform, SourceConfig, SourceEvent};
pub use transport::{HttpListTransport, ListTransport};
pub use view::{ListView, ViewSnapshot, ViewUpdate};

/// A view-model row with a primary key, used to de-duplicate accumulated pages.
pub trait ListRow: Clone + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync;

    fn row_key(&self) -> Self::Key;
}

/// Untyped rows are keyed by their `id` field, falling back to the whole document.
impl ListRow for Value {
    type Key = String;

    fn row_key(&self) -> String {
        match self.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(id) => id.to_string(),
            None => self.to_string(),
        }
    }
}
