pub mod error;
pub mod lock;
pub mod snapshot;

pub use error::PersistenceError;
pub use snapshot::{write_atomic, SnapshotStore};
