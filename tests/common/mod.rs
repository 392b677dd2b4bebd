//! Common test utilities and helpers.
//!
//! Builds synthetic 64-bit Mach-O images in memory and serves them through
//! an in-memory `ImageSource`, so the full locate → walk → hash pipeline
//! can run without a live loader.

#![allow(dead_code)]

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use codeseal::error::{Result, SealError};
use codeseal::image::{ImageSource, LoadedImage, MemoryRegion};
use codeseal::macho::{
    RawName, HEADER_SIZE_64, LC_SEGMENT_64, MH_MAGIC_64, SECTION_64_SIZE, SEGMENT_COMMAND_64_SIZE,
};

struct SectionSpec {
    name: String,
    payload: Vec<u8>,
}

struct SegmentSpec {
    name: String,
    sections: Vec<SectionSpec>,
}

/// Builder for synthetic images: segments, sections with payload bytes,
/// configurable base/slide and byte order.
pub struct ImageBuilder {
    base: u64,
    slide: i64,
    big_endian: bool,
    segments: Vec<SegmentSpec>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            base: 0,
            slide: 0,
            big_endian: false,
            segments: Vec::new(),
        }
    }

    pub fn base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    pub fn slide(mut self, slide: i64) -> Self {
        self.slide = slide;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    /// Add a segment with no sections.
    pub fn segment(mut self, name: &str) -> Self {
        self.segments.push(SegmentSpec {
            name: name.to_string(),
            sections: Vec::new(),
        });
        self
    }

    /// Add a segment carrying the given (name, payload) sections.
    pub fn segment_with_sections(mut self, name: &str, sections: &[(&str, &[u8])]) -> Self {
        self.segments.push(SegmentSpec {
            name: name.to_string(),
            sections: sections
                .iter()
                .map(|(n, p)| SectionSpec {
                    name: n.to_string(),
                    payload: p.to_vec(),
                })
                .collect(),
        });
        self
    }

    pub fn build(self) -> SyntheticImage {
        let be = self.big_endian;
        let push32 = |data: &mut Vec<u8>, v: u32| {
            if be {
                data.extend_from_slice(&v.to_be_bytes());
            } else {
                data.extend_from_slice(&v.to_le_bytes());
            }
        };
        let push64 = |data: &mut Vec<u8>, v: u64| {
            if be {
                data.extend_from_slice(&v.to_be_bytes());
            } else {
                data.extend_from_slice(&v.to_le_bytes());
            }
        };

        let sizeofcmds: usize = self
            .segments
            .iter()
            .map(|s| SEGMENT_COMMAND_64_SIZE + s.sections.len() * SECTION_64_SIZE)
            .sum();
        let header_extent = HEADER_SIZE_64 + sizeofcmds;

        // Lay payloads out after the command table, 16-byte aligned, and
        // pick each section's static address so that
        // base + slide + addr == payload offset in the buffer.
        let mut placements = Vec::new();
        let mut payload_off = header_extent;
        for segment in &self.segments {
            for section in &segment.sections {
                payload_off = (payload_off + 15) & !15;
                placements.push((
                    segment.name.clone(),
                    section.name.clone(),
                    payload_off,
                    section.payload.len(),
                ));
                payload_off += section.payload.len();
            }
        }

        let mut data = Vec::with_capacity(payload_off);
        push32(&mut data, MH_MAGIC_64);
        push32(&mut data, 0x0100000c); // cputype
        push32(&mut data, 0); // cpusubtype
        push32(&mut data, 2); // filetype: executable
        push32(&mut data, self.segments.len() as u32);
        push32(&mut data, sizeofcmds as u32);
        push32(&mut data, 0); // flags
        push32(&mut data, 0); // reserved

        let mut placement_iter = placements.iter();
        for segment in &self.segments {
            let cmdsize = SEGMENT_COMMAND_64_SIZE + segment.sections.len() * SECTION_64_SIZE;
            push32(&mut data, LC_SEGMENT_64);
            push32(&mut data, cmdsize as u32);
            data.extend_from_slice(RawName::new(&segment.name).as_bytes());
            push64(&mut data, 0); // vmaddr
            push64(&mut data, 0); // vmsize
            push64(&mut data, 0); // fileoff
            push64(&mut data, 0); // filesize
            push32(&mut data, 5); // maxprot
            push32(&mut data, 5); // initprot
            push32(&mut data, segment.sections.len() as u32);
            push32(&mut data, 0); // flags

            for section in &segment.sections {
                let (_, _, offset, len) = placement_iter
                    .next()
                    .expect("placement recorded for every section");
                let addr = (*offset as u64)
                    .wrapping_sub(self.base)
                    .wrapping_sub(self.slide as u64);
                data.extend_from_slice(RawName::new(&section.name).as_bytes());
                data.extend_from_slice(RawName::new(&segment.name).as_bytes());
                push64(&mut data, addr);
                push64(&mut data, *len as u64);
                push32(&mut data, 0); // offset
                push32(&mut data, 0); // align
                push32(&mut data, 0); // reloff
                push32(&mut data, 0); // nreloc
                push32(&mut data, 0); // flags
                push32(&mut data, 0); // reserved1
                push32(&mut data, 0); // reserved2
                push32(&mut data, 0); // reserved3
            }
        }

        for (segment, section, offset, _) in &placements {
            data.resize(*offset, 0);
            let spec = self
                .segments
                .iter()
                .find(|s| s.name == *segment)
                .and_then(|s| s.sections.iter().find(|sec| sec.name == *section))
                .expect("placement refers to a built section");
            data.extend_from_slice(&spec.payload);
        }

        SyntheticImage {
            data,
            base: self.base,
            slide: self.slide,
            header_extent,
            placements,
        }
    }
}

/// A built synthetic image: raw bytes plus where each section's payload
/// landed in the buffer.
pub struct SyntheticImage {
    pub data: Vec<u8>,
    pub base: u64,
    pub slide: i64,
    pub header_extent: usize,
    placements: Vec<(String, String, usize, usize)>,
}

impl SyntheticImage {
    /// Buffer offset and length of a section's payload.
    pub fn placement(&self, segment: &str, section: &str) -> Option<(usize, usize)> {
        self.placements
            .iter()
            .find(|(seg, sec, _, _)| seg == segment && sec == section)
            .map(|(_, _, off, len)| (*off, *len))
    }
}

/// In-memory `ImageSource` over one synthetic image. Region reads are
/// counted so tests can assert that no hashing happened.
pub struct FixtureImageSource {
    image: SyntheticImage,
    region_reads: AtomicUsize,
}

impl FixtureImageSource {
    pub fn new(image: SyntheticImage) -> Self {
        Self {
            image,
            region_reads: AtomicUsize::new(0),
        }
    }

    pub fn region_reads(&self) -> usize {
        self.region_reads.load(Ordering::SeqCst)
    }
}

impl ImageSource for FixtureImageSource {
    fn locate_self(&self) -> Result<LoadedImage> {
        Ok(LoadedImage {
            path: PathBuf::from("/fixtures/testapp"),
            header_addr: 0,
            base: self.image.base,
            slide: self.image.slide,
        })
    }

    fn image_bytes(&self, _image: &LoadedImage) -> Result<Cow<'_, [u8]>> {
        let extent = self.image.header_extent.min(self.image.data.len());
        Ok(Cow::Borrowed(&self.image.data[..extent]))
    }

    fn region_bytes(&self, region: &MemoryRegion) -> Result<Cow<'_, [u8]>> {
        self.region_reads.fetch_add(1, Ordering::SeqCst);
        let start = region.address as usize;
        let end = start.checked_add(region.len as usize);
        match end {
            Some(end) if end <= self.image.data.len() => {
                Ok(Cow::Borrowed(&self.image.data[start..end]))
            }
            _ => Err(SealError::malformed(
                region.address as usize,
                "fixture region outside the synthetic image",
            )),
        }
    }
}
