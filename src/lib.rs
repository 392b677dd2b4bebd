//! codeseal — runtime self-integrity verification for native executables.
//!
//! Proves that the code bytes currently mapped into the process, and a
//! bundled provisioning manifest, match previously published known-good
//! SHA-256 digests — detecting binary patching, code injection, or
//! repackaging.
//!
//! The pipeline: [`image::ImageSource::locate_self`] finds the running
//! executable among the loaded images and its ASLR slide;
//! [`macho::walker::find_section`] walks the load-command table with
//! bounds-checked reads to resolve the code section;
//! [`hashing::sha256`] digests the mapped bytes in place; and
//! [`engine::IntegrityEngine`] compares both digests against references
//! supplied by a [`provider::ReferenceHashProvider`], publishing one
//! immutable [`engine::IntegrityReport`] per run.
//!
//! Everything downstream of the loader treats the image as untrusted
//! input: a hostile `cmdsize` or section count yields a typed error, never
//! an out-of-bounds read. All failures are captured as outcome values —
//! the check never terminates the host process.

pub mod engine;
pub mod error;
pub mod hashing;
pub mod image;
pub mod logging;
pub mod macho;
pub mod manifest;
pub mod provider;
pub mod timeout;

pub use engine::{
    CheckState, ChecksSnapshot, EngineConfig, IntegrityEngine, IntegrityOutcome, IntegrityReport,
};
pub use error::{Result, SealError};
