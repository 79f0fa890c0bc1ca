//! Benchmark profile storage

pub mod cache;

pub use cache::{BenchmarkCache, InMemoryBenchmarkCache, PersistentBenchmarkCache};
