//! Stable provider identity
//!
//! The identity is a SHA-256 digest over the identifying fields of a
//! [`ProviderDescriptor`]. Each field is length-prefixed so that moving
//! characters between adjacent fields always changes the digest.

use crate::error::{ForgeError, Result};
use crate::provider::ProviderDescriptor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Fixed-width identity of a provider
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId([u8; 32]);

impl ProviderId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 hex characters, for tables and log lines
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderId({})", self.short())
    }
}

impl FromStr for ProviderId {
    type Err = ForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| ForgeError::Config(format!("Invalid provider id '{}': {}", s, e)))?;
        Ok(ProviderId(bytes))
    }
}

impl Serialize for ProviderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the stable identity of a provider
///
/// Fails with a configuration error when the engine or mechanism is absent.
pub fn compute_identity(descriptor: &ProviderDescriptor) -> Result<ProviderId> {
    let engine = descriptor.engine()?;
    let mechanism = descriptor.mechanism()?;

    let mut hasher = Sha256::new();
    feed(&mut hasher, Some(engine.id()));
    feed(&mut hasher, Some(mechanism.name()));
    feed(&mut hasher, descriptor.short_name.as_deref());
    feed(&mut hasher, descriptor.full_name.as_deref());
    feed(&mut hasher, descriptor.version.as_deref());
    hasher.update((descriptor.extensions.len() as u64).to_le_bytes());
    for ext in &descriptor.extensions {
        feed(&mut hasher, Some(ext));
    }
    feed(&mut hasher, descriptor.data_source.as_deref());
    feed(&mut hasher, descriptor.class_id.as_deref());

    Ok(ProviderId(hasher.finalize().into()))
}

fn feed(hasher: &mut Sha256, field: Option<&str>) {
    match field {
        Some(value) => {
            hasher.update([1u8]);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}
