//! Loaded-image model and the source abstraction over the host loader.

use std::borrow::Cow;
use std::path::PathBuf;

use crate::error::Result;

#[cfg(target_os = "macos")]
pub mod dyld;

#[cfg(target_os = "macos")]
pub use self::dyld::DyldImageSource;

/// One binary module mapped into the process.
///
/// Valid only for the lifetime of the enumeration that produced it:
/// addresses change across process runs but not within one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// File path the loader reports for this image.
    pub path: PathBuf,
    /// Runtime address at which the image header is mapped.
    pub header_addr: u64,
    /// Static address origin for the image's section addresses. Mach-O
    /// section addresses are link-absolute, so the live loader reports 0
    /// here; synthetic images may use any origin.
    pub base: u64,
    /// Per-load ASLR displacement reported by the loader.
    pub slide: i64,
}

/// Non-owning descriptor of bytes belonging to a live process image.
///
/// Valid only while that image remains loaded, which for self-inspection
/// is the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Absolute address of the first byte.
    pub address: u64,
    /// Region length in bytes.
    pub len: u64,
}

/// Access to the process's loaded images.
///
/// The production implementation reads live loader state; tests supply
/// synthetic images. For live sources `region_bytes` borrows the mapped
/// bytes directly — hashing a code section must not allocate a copy
/// proportional to its size.
pub trait ImageSource: Send + Sync {
    /// Identify the image corresponding to the running executable itself.
    fn locate_self(&self) -> Result<LoadedImage>;

    /// The mapped header + load-command extent of an image.
    fn image_bytes(&self, image: &LoadedImage) -> Result<Cow<'_, [u8]>>;

    /// The bytes of a resolved region.
    fn region_bytes(&self, region: &MemoryRegion) -> Result<Cow<'_, [u8]>>;
}
