//! Configuration models for the pool and the file pipeline.

pub mod pool;

pub use pool::{PipelineConfig, PoolConfig};
