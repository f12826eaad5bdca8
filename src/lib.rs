pub mod config;
pub mod executor;
pub mod harvest;
pub mod model;
pub mod sink;
pub mod telemetry;
pub mod traits;
pub mod webdriver;

// Re-export common types for convenience
pub use config::HarvestConfig;
pub use executor::*;
pub use harvest::{HarvestError, HarvestPipeline, HarvestReport};
pub use model::*;
pub use sink::{JsonlSink, Sink, SinkError};
pub use traits::*;
