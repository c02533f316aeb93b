//! Core library for the Cloud Foundry app stats proxy
//!
//! This crate provides:
//! - A control plane client (UAA login, app lookup, instance stats)
//! - Normalization of loosely-typed instance stats into a fixed schema
//! - Datacenter-level aggregation of instance usage
//! - The report pipeline with failure classification
//! - Health checks and observability

pub mod aggregate;
pub mod error;
pub mod health;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod upstream;

pub use aggregate::aggregate;
pub use error::{ProxyError, Result, Stage, UpstreamFault};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use normalize::normalize;
pub use observability::{ProxyMetrics, StructuredLogger};
pub use pipeline::{Credentials, StatsPipeline};
pub use upstream::{CloudFoundryClient, ControlPlane, UpstreamConfig};
