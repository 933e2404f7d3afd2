//! Checksums binding plans to the configuration that produced them.
//!
//! A plan carries the checksum of its inputs; recomputing it later from the
//! current configuration reveals drift between planning and execution.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::spec::{DeploymentSpec, ResourceRequest};

/// Inputs that fully determine one service's plan.
#[derive(Debug, Clone, Copy)]
pub struct PlanFingerprint<'a> {
    /// Logical service name.
    pub service: &'a str,
    /// Remote service name.
    pub remote_name: &'a str,
    /// Target environment.
    pub environment: &'a str,
    /// Source repository.
    pub repo: &'a str,
    /// Source branch.
    pub branch: &'a str,
    /// Resource request.
    pub resources: &'a ResourceRequest,
    /// Full desired variable set.
    pub variables: &'a BTreeMap<String, String>,
}

/// Hasher for computing configuration checksums.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the checksum of a plan's inputs.
    #[must_use]
    pub fn hash_plan(&self, fingerprint: &PlanFingerprint<'_>) -> String {
        let mut hasher = Sha256::new();

        for field in [
            fingerprint.service,
            fingerprint.remote_name,
            fingerprint.environment,
            fingerprint.repo,
            fingerprint.branch,
        ] {
            update_field(&mut hasher, field.as_bytes());
        }

        hasher.update(fingerprint.resources.memory_mb.to_be_bytes());
        hasher.update(fingerprint.resources.cpu_millicores.to_be_bytes());
        hasher.update(fingerprint.resources.replicas.to_be_bytes());

        // BTreeMap iteration is already sorted
        for (key, value) in fingerprint.variables {
            update_field(&mut hasher, key.as_bytes());
            update_field(&mut hasher, value.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a checksum of the whole spec, used to tag run reports.
    #[must_use]
    pub fn hash_spec(&self, spec: &DeploymentSpec) -> String {
        let mut hasher = Sha256::new();

        update_field(&mut hasher, spec.environment.as_bytes());
        update_field(&mut hasher, spec.region.as_deref().unwrap_or_default().as_bytes());
        update_field(&mut hasher, spec.version.as_bytes());

        for (name, config) in &spec.services {
            update_field(&mut hasher, name.as_bytes());
            hasher.update([u8::from(config.enabled)]);
            hasher.update(config.resources.memory_mb.to_be_bytes());
            hasher.update(config.resources.cpu_millicores.to_be_bytes());
            hasher.update(config.resources.replicas.to_be_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Length-prefixes a field so adjacent fields cannot run together.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
