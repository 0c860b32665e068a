#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod reader;
pub mod sampler;

pub use client::{ClusterApi, HttpClusterClient, NodeRecord, NodeUsage, PodDetail};
pub use config::{InventoryConfig, SamplerSettings};
pub use error::InventoryError;
pub use host::HostStats;
pub use reader::{InventoryReader, WorkloadInventory};
pub use sampler::{MetricsSampler, SamplerHandle};
