//! gRPC surface

pub mod service;

pub use service::{PricingGrpcService, PricingService};
