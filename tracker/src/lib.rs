pub mod config;
pub mod fetcher;
pub mod pipeline;
pub mod render;
pub mod sources;
pub mod traits;
pub mod types;

pub use config::{Config, Credentials};
pub use fetcher::Fetcher;
pub use pipeline::{RunOptions, RunReport, SourceFailure, Tracker};
pub use traits::SourceFetcher;
pub use types::*;
