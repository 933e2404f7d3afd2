//! Configuration module for railyard.
//!
//! This module handles everything read from disk before a run starts:
//! - Parsing the YAML deployment spec
//! - Loading the JSON credential store
//! - Validating the spec against the service catalog
//! - Computing plan checksums

mod credentials;
mod hash;
mod parser;
mod spec;
mod validator;

pub use credentials::{
    Credentials, RAILWAY_PROJECT_ID, RAILWAY_TOKEN, REDIS_HOST, REDIS_PASSWORD, REDIS_PORT,
    REDIS_SERVICE_ID, REDIS_URL, REQUIRED_PROVIDER_KEYS,
};
pub use hash::{ConfigHasher, PlanFingerprint};
pub use parser::{SpecParser, TARGET_ENV_VAR, resolve_environment, target_env_override};
pub use spec::{DeploymentSpec, ResourceRequest, ServiceConfig};
pub use validator::{SpecValidator, ValidationError, ValidationResult};
