//! Integrity engine: orchestrates reference retrieval and the two local
//! verifications, and publishes one immutable report per run.
//!
//! The two checks are independent. Reference retrieval is the only
//! network-bound step; it is bounded by a timeout and must succeed for
//! *both* endpoints before any local hashing happens — a partial fetch is
//! never trusted. Overlapping runs are serialized so interleaved partial
//! results cannot overwrite each other.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SealError};
use crate::hashing::{self, Digest};
use crate::image::ImageSource;
use crate::macho::walker::{self, ImageView};
use crate::macho::RawName;
use crate::manifest;
use crate::provider::ReferenceHashProvider;
use crate::timeout::{with_timeout, TimeoutConfig, DEFAULT_FETCH_TIMEOUT_SECONDS};

/// Terminal outcome of one integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityOutcome {
    /// Computed digest matched the published reference.
    Verified,
    /// Confirmed mismatch, or a structural failure resolving the input
    /// (missing image/section/file, malformed layout).
    Failed,
    /// The check could not run: reference digests were unavailable.
    Indeterminate,
}

impl IntegrityOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, IntegrityOutcome::Verified)
    }
}

impl std::fmt::Display for IntegrityOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityOutcome::Verified => write!(f, "verified"),
            IntegrityOutcome::Failed => write!(f, "failed"),
            IntegrityOutcome::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Per-check state machine: `Pending → Running → Done(outcome)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckState {
    Pending,
    Running,
    Done(IntegrityOutcome),
}

impl CheckState {
    /// Three-valued view for callers that poll: `None` until a terminal
    /// state is reached, then whether the check verified.
    pub fn verified(&self) -> Option<bool> {
        match self {
            CheckState::Done(outcome) => Some(outcome.is_verified()),
            _ => None,
        }
    }
}

/// Snapshot of both check states, readable at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksSnapshot {
    pub code: CheckState,
    pub manifest: CheckState,
}

impl Default for ChecksSnapshot {
    fn default() -> Self {
        Self {
            code: CheckState::Pending,
            manifest: CheckState::Pending,
        }
    }
}

/// Immutable result record, delivered once per `perform_checks` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub code: IntegrityOutcome,
    pub manifest: IntegrityOutcome,
    pub checked_at: DateTime<Utc>,
}

impl IntegrityReport {
    pub fn all_verified(&self) -> bool {
        self.code.is_verified() && self.manifest.is_verified()
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Location of the bundled provisioning manifest.
    pub manifest_path: PathBuf,
    /// Cap on manifest size.
    pub max_manifest_bytes: u64,
    /// Segment holding the executable code.
    pub code_segment: RawName,
    /// Section holding the compiled machine instructions.
    pub code_section: RawName,
    /// Bound on reference retrieval; `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            manifest_path: manifest::default_manifest_path()
                .unwrap_or_else(|_| PathBuf::from(manifest::DEFAULT_MANIFEST_NAME)),
            max_manifest_bytes: manifest::DEFAULT_MAX_MANIFEST_BYTES,
            code_segment: RawName::new("__TEXT"),
            code_section: RawName::new("__text"),
            fetch_timeout: Some(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS)),
        }
    }
}

/// Orchestrates self-integrity verification.
pub struct IntegrityEngine {
    source: Arc<dyn ImageSource>,
    provider: Arc<dyn ReferenceHashProvider>,
    config: EngineConfig,
    state: RwLock<ChecksSnapshot>,
    latest: RwLock<Option<IntegrityReport>>,
    flight: tokio::sync::Mutex<()>,
}

impl IntegrityEngine {
    pub fn new(source: Arc<dyn ImageSource>, provider: Arc<dyn ReferenceHashProvider>) -> Self {
        Self::with_config(source, provider, EngineConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn ImageSource>,
        provider: Arc<dyn ReferenceHashProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            provider,
            config,
            state: RwLock::new(ChecksSnapshot::default()),
            latest: RwLock::new(None),
            flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Engine inspecting the current process through the live loader.
    #[cfg(target_os = "macos")]
    pub fn for_current_process(provider: Arc<dyn ReferenceHashProvider>) -> Self {
        Self::new(Arc::new(crate::image::DyldImageSource::new()), provider)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current per-check states. `Pending` before the first run.
    pub fn snapshot(&self) -> ChecksSnapshot {
        *self.state.read().expect("state lock poisoned")
    }

    /// The most recently published report, if any run has completed.
    pub fn latest(&self) -> Option<IntegrityReport> {
        self.latest.read().expect("latest lock poisoned").clone()
    }

    /// Verify the running executable's code section against a reference
    /// digest. Any structural failure resolving the section is `Failed`.
    pub fn verify_code_integrity(&self, reference_hex: &str) -> IntegrityOutcome {
        check_code(self.source.as_ref(), &self.config, reference_hex)
    }

    /// Verify the provisioning manifest at `path` against a reference
    /// digest.
    pub fn verify_provisioning_file(&self, path: &Path, reference_hex: &str) -> IntegrityOutcome {
        check_manifest(path, self.config.max_manifest_bytes, reference_hex)
    }

    /// Run the full check: fetch both references, then both local
    /// verifications concurrently, and publish one immutable report.
    ///
    /// If either reference fetch fails, both outcomes are `Indeterminate`
    /// and no local hashing is attempted. Safe to call repeatedly;
    /// overlapping invocations are serialized.
    pub async fn perform_checks(&self) -> IntegrityReport {
        let _flight = self.flight.lock().await;

        {
            let mut state = self.state.write().expect("state lock poisoned");
            state.code = CheckState::Running;
            state.manifest = CheckState::Running;
        }
        info!("integrity check started");

        let report = match self.fetch_references().await {
            Err(err) => {
                warn!(error = %err, "reference retrieval failed; skipping local verification");
                self.publish(IntegrityOutcome::Indeterminate, IntegrityOutcome::Indeterminate)
            }
            Ok((code_reference, manifest_reference)) => {
                let source = Arc::clone(&self.source);
                let config = self.config.clone();
                let code_task = tokio::task::spawn_blocking(move || {
                    check_code(source.as_ref(), &config, &code_reference)
                });

                let path = self.config.manifest_path.clone();
                let limit = self.config.max_manifest_bytes;
                let manifest_task = tokio::task::spawn_blocking(move || {
                    check_manifest(&path, limit, &manifest_reference)
                });

                let (code, manifest) = tokio::join!(code_task, manifest_task);
                let code = code.unwrap_or(IntegrityOutcome::Indeterminate);
                let manifest = manifest.unwrap_or(IntegrityOutcome::Indeterminate);
                self.publish(code, manifest)
            }
        };

        info!(code = %report.code, manifest = %report.manifest, "integrity check complete");
        report
    }

    /// Fetch both reference digests. The pair is unavailable unless both
    /// fetches succeed.
    async fn fetch_references(&self) -> Result<(String, String)> {
        let provider = Arc::clone(&self.provider);
        let code = tokio::task::spawn_blocking(move || provider.code_reference());
        let provider = Arc::clone(&self.provider);
        let manifest = tokio::task::spawn_blocking(move || provider.manifest_reference());

        let retrieval = async move {
            let (code, manifest) = tokio::join!(code, manifest);
            let code = code
                .map_err(|err| SealError::ReferenceUnavailable(err.to_string()))??;
            let manifest = manifest
                .map_err(|err| SealError::ReferenceUnavailable(err.to_string()))??;
            Ok((code.trim().to_string(), manifest.trim().to_string()))
        };

        match self.config.fetch_timeout {
            Some(duration) => {
                let config = TimeoutConfig {
                    duration,
                    log_errors: true,
                    operation_name: "reference retrieval".to_string(),
                };
                with_timeout(config, retrieval).await
            }
            None => retrieval.await,
        }
    }

    fn publish(&self, code: IntegrityOutcome, manifest: IntegrityOutcome) -> IntegrityReport {
        let report = IntegrityReport {
            code,
            manifest,
            checked_at: Utc::now(),
        };
        {
            let mut state = self.state.write().expect("state lock poisoned");
            state.code = CheckState::Done(code);
            state.manifest = CheckState::Done(manifest);
        }
        *self.latest.write().expect("latest lock poisoned") = Some(report.clone());
        report
    }
}

/// Resolve the code section of the running executable and digest it in
/// place.
fn compute_code_digest(source: &dyn ImageSource, config: &EngineConfig) -> Result<Digest> {
    let image = source.locate_self()?;
    debug!(path = %image.path.display(), slide = image.slide, "located self image");

    let bytes = source.image_bytes(&image)?;
    let view = ImageView {
        data: &bytes,
        base: image.base,
        slide: image.slide,
    };
    let region = walker::find_section(&view, &config.code_segment, &config.code_section)?;
    debug!(address = region.address, len = region.len, "resolved code section");

    let data = source.region_bytes(&region)?;
    Ok(hashing::sha256(&data))
}

fn check_code(
    source: &dyn ImageSource,
    config: &EngineConfig,
    reference_hex: &str,
) -> IntegrityOutcome {
    let span = tracing::info_span!("code_check", segment = %config.code_segment, section = %config.code_section);
    let _guard = span.enter();
    match compute_code_digest(source, config) {
        Ok(digest) => {
            if digest.matches_hex(reference_hex) {
                IntegrityOutcome::Verified
            } else {
                warn!(computed = %digest, "code digest does not match the published reference");
                IntegrityOutcome::Failed
            }
        }
        Err(err) => {
            warn!(error = %err, "code section could not be resolved");
            IntegrityOutcome::Failed
        }
    }
}

fn check_manifest(path: &Path, limit: u64, reference_hex: &str) -> IntegrityOutcome {
    let span = tracing::info_span!("manifest_check", path = %path.display());
    let _guard = span.enter();
    match manifest::read_manifest_bytes(path, limit) {
        Ok(bytes) => {
            let digest = hashing::sha256(&bytes);
            if digest.matches_hex(reference_hex) {
                IntegrityOutcome::Verified
            } else {
                warn!(computed = %digest, "manifest digest does not match the published reference");
                IntegrityOutcome::Failed
            }
        }
        Err(err) => {
            warn!(error = %err, "provisioning manifest could not be read");
            IntegrityOutcome::Failed
        }
    }
}
