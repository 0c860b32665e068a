#![doc = include_str!("../README.md")]

pub mod checks;
pub mod config;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod feed;
pub mod image;
pub mod report;
pub mod state;

pub use config::EngineSettings;
pub use correlate::{CorrelationOutcome, Correlator, KeyFindings};
pub use engine::{ScanEngine, ScanEngineBuilder};
pub use error::ScanEngineError;
pub use feed::{FeedBackend, FileVulnFeed, HttpVulnFeed, VulnFeed};
pub use image::{CanonicalImageKey, ImageReference};
pub use report::{build as build_report, ScanReport};
pub use state::ScanStateHandle;
