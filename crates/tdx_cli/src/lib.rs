pub mod logging;
pub mod pipeline;

pub use pipeline::{now_rfc3339_utc, Pipeline, RunOutcome};
