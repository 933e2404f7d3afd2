//! Infrastructure provider integration.
//!
//! This module provides:
//! - The [`ProviderClient`] trait the orchestrator drives
//! - A GraphQL client for the Railway API
//! - Wire types for services, instances and deployments
//! - An instance inspector for diagnosing provider-side asynchrony

mod api;
mod client;
mod health;
mod types;

pub use api::ProviderClient;
#[cfg(test)]
pub use api::MockProviderClient;
pub use client::{DEFAULT_CACHE_SERVICE, RAILWAY_API_URL, RailwayClient};
pub use health::{HealthState, InstanceDiagnosis, InstanceInspector, PollSettings};
pub use types::{
    CreateServiceRequest, DeploymentRef, DeploymentStatus, InstanceSource, ServiceInstance,
    ServiceRef, ServiceSource, SharedCache, mask_url_password,
};
