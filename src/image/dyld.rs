//! Live image source backed by the macOS dynamic loader.
//!
//! dyld provides an image count, and per-index accessors for each image's
//! path, header address, and ASLR slide. The process's own image is found
//! by matching each image path against the running executable's path.

use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ImageSource, LoadedImage, MemoryRegion};
use crate::error::{Result, SealError};
use crate::macho::{MachHeader, HEADER_SIZE_64};

extern "C" {
    fn _dyld_image_count() -> u32;
    fn _dyld_get_image_name(image_index: u32) -> *const c_char;
    fn _dyld_get_image_header(image_index: u32) -> *const u8;
    fn _dyld_get_image_vmaddr_slide(image_index: u32) -> isize;
}

/// Enumerates the dyld image list and reads regions of the process's own
/// already-mapped image in place.
#[derive(Debug, Default)]
pub struct DyldImageSource;

impl DyldImageSource {
    pub fn new() -> Self {
        Self
    }
}

impl ImageSource for DyldImageSource {
    fn locate_self(&self) -> Result<LoadedImage> {
        let exe = std::env::current_exe()?;
        let count = unsafe { _dyld_image_count() };
        for index in 0..count {
            let name = unsafe { _dyld_get_image_name(index) };
            if name.is_null() {
                continue;
            }
            let path = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
            if !path_matches(&path, &exe) {
                continue;
            }
            let header = unsafe { _dyld_get_image_header(index) };
            if header.is_null() {
                continue;
            }
            let slide = unsafe { _dyld_get_image_vmaddr_slide(index) } as i64;
            debug!(path = %path, slide, "located self image in dyld list");
            // Mach-O section addresses are link-absolute, so the static
            // origin is zero and `slide + addr` is the mapped address.
            return Ok(LoadedImage {
                path: PathBuf::from(path),
                header_addr: header as u64,
                base: 0,
                slide,
            });
        }
        Err(SealError::ImageNotFound)
    }

    fn image_bytes(&self, image: &LoadedImage) -> Result<Cow<'_, [u8]>> {
        // SAFETY: dyld keeps the header mapped for as long as the image is
        // loaded, and the process's own image is never unloaded.
        let prefix = unsafe {
            std::slice::from_raw_parts(image.header_addr as *const u8, HEADER_SIZE_64)
        };
        let header = MachHeader::parse(prefix)?;
        // SAFETY: the loader maps the header together with the full
        // load-command table it declares; `commands_extent` is exactly that
        // mapped extent.
        let mapped = unsafe {
            std::slice::from_raw_parts(image.header_addr as *const u8, header.commands_extent())
        };
        Ok(Cow::Borrowed(mapped))
    }

    fn region_bytes(&self, region: &MemoryRegion) -> Result<Cow<'_, [u8]>> {
        // SAFETY: the region was resolved from this image's own section
        // table and stays mapped for the life of the process. The bytes are
        // read in place; no copy proportional to the region is made.
        let bytes = unsafe {
            std::slice::from_raw_parts(region.address as *const u8, region.len as usize)
        };
        Ok(Cow::Borrowed(bytes))
    }
}

/// dyld may report a resolved path that differs textually from
/// `current_exe()`; fall back to matching the trailing file name.
fn path_matches(image_path: &str, exe: &Path) -> bool {
    if Path::new(image_path) == exe {
        return true;
    }
    match exe.file_name().and_then(|n| n.to_str()) {
        Some(name) => image_path.ends_with(name),
        None => false,
    }
}
