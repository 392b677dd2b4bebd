//! Reference-digest collaborator interface.
//!
//! Known-good digests are published out of band (typically fetched over a
//! network channel by the embedding application). The core consumes them
//! through this seam and never retries: a fetch error is reported as
//! `ReferenceUnavailable` and folded into the check outcome.

use crate::error::Result;

/// Supplies the two published known-good digests.
///
/// The two retrievals are independent; the engine requests both and treats
/// the pair as unavailable unless both succeed. Each digest is returned as
/// lowercase hex, trimmed of surrounding whitespace.
pub trait ReferenceHashProvider: Send + Sync {
    /// The published digest of the executable's code section.
    fn code_reference(&self) -> Result<String>;

    /// The published digest of the provisioning manifest.
    fn manifest_reference(&self) -> Result<String>;
}

/// Fixed reference digests, for tests and deployments that pin the
/// expected values at build time.
#[derive(Debug, Clone)]
pub struct StaticReferenceProvider {
    code: String,
    manifest: String,
}

impl StaticReferenceProvider {
    pub fn new(code: impl Into<String>, manifest: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            manifest: manifest.into(),
        }
    }
}

impl ReferenceHashProvider for StaticReferenceProvider {
    fn code_reference(&self) -> Result<String> {
        Ok(self.code.clone())
    }

    fn manifest_reference(&self) -> Result<String> {
        Ok(self.manifest.clone())
    }
}
