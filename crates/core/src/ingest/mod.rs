pub mod feed;
pub mod fx;
pub mod index;
pub mod provider;
pub mod retry;
pub mod sources;
pub mod types;

pub use provider::SourceAdapter;
pub use types::{CloseSeries, GroupResult, RateQuotes, SourceError};
