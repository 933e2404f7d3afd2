//! Static service catalog.
//!
//! Every deployable service is described at build time: where its source
//! lives, which port it listens on, which services it depends on and which
//! variables it needs. The catalog also owns the fixed deployment order.

mod descriptor;
mod variables;

pub use descriptor::{
    DEFAULT_INTERNAL_DOMAIN, DEFAULT_PREFIX, SecretBinding, ServiceCatalog, ServiceDescriptor,
    ServiceLink,
};
pub use variables::{OPENAI_API_KEY, ServiceVariables};
