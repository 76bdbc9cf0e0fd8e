pub mod change;
pub mod digest;
pub mod forecast;
pub mod pipeline;
pub mod reconcile;
pub mod sanitize;
