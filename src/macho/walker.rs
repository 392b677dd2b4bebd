//! Load-command walk: locate a named section inside a named segment.
//!
//! The walk operates on the mapped header + load-command extent of a live
//! image. The layout is self-describing and untrusted: a hostile `cmdsize`
//! must produce `MalformedImage`, never a read past the validated bound.

use tracing::trace;

use crate::error::{Result, SealError};
use crate::image::MemoryRegion;
use crate::macho::{
    cursor::Cursor, MachHeader, RawName, HEADER_SIZE_64, LC_SEGMENT_64, LOAD_COMMAND_MIN_SIZE,
    SECTION_64_SIZE, SECTION_ADDR_OFFSET, SEGMENT_COMMAND_64_SIZE, SEGMENT_NSECTS_OFFSET,
};

/// A borrowed view of one image's mapped header region, together with the
/// address parameters needed to turn static section addresses into
/// absolute ones.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    /// Header + load-command bytes, starting at the Mach-O magic.
    pub data: &'a [u8],
    /// Static address origin of the image.
    pub base: u64,
    /// Per-load ASLR displacement.
    pub slide: i64,
}

/// Walk the load-command table of `view` looking for `section` within
/// `segment`, both compared exactly over their full 16 bytes.
///
/// Returns the section's absolute region:
/// `address = base + slide + section.addr`.
pub fn find_section(
    view: &ImageView<'_>,
    segment: &RawName,
    section: &RawName,
) -> Result<MemoryRegion> {
    let header = MachHeader::parse(view.data)?;
    let lc_end = header.commands_extent().min(view.data.len());

    let mut off = HEADER_SIZE_64;
    for index in 0..header.ncmds {
        if off + LOAD_COMMAND_MIN_SIZE > lc_end {
            return Err(SealError::malformed(
                off,
                format!("load command {index} of {} begins past the command-table extent", header.ncmds),
            ));
        }
        let mut cur = Cursor::new(&view.data[..lc_end], header.endian);
        cur.seek(off)?;
        let cmd = cur.read_u32()?;
        let cmdsize = cur.read_u32()? as usize;

        if cmdsize < LOAD_COMMAND_MIN_SIZE {
            return Err(SealError::malformed(
                off,
                format!("load command {index} declares cmdsize {cmdsize}, below the {LOAD_COMMAND_MIN_SIZE}-byte minimum"),
            ));
        }
        let cmd_end = off.checked_add(cmdsize).ok_or_else(|| {
            SealError::malformed(off, format!("load command {index} cmdsize {cmdsize} overflows"))
        })?;
        if cmd_end > lc_end {
            return Err(SealError::malformed(
                off,
                format!("load command {index} cmdsize {cmdsize} runs past the command-table extent ({lc_end} bytes)"),
            ));
        }

        if cmd == LC_SEGMENT_64 {
            if let Some(region) = match_segment(view, &mut cur, off, cmdsize, segment, section)? {
                return Ok(region);
            }
        }

        off = cmd_end;
    }

    Err(SealError::SectionNotFound {
        segment: segment.to_string(),
        section: section.to_string(),
    })
}

/// Inspect one `LC_SEGMENT_64` command. Returns the resolved region when
/// both names match, `None` when this segment is not the one (or holds no
/// matching section — a later segment command may still match).
fn match_segment(
    view: &ImageView<'_>,
    cur: &mut Cursor<'_>,
    off: usize,
    cmdsize: usize,
    segment: &RawName,
    section: &RawName,
) -> Result<Option<MemoryRegion>> {
    if cmdsize < SEGMENT_COMMAND_64_SIZE {
        return Err(SealError::malformed(
            off,
            format!("segment command of {cmdsize} bytes is smaller than segment_command_64"),
        ));
    }
    let name = cur.read_name()?;
    if name != *segment {
        return Ok(None);
    }
    trace!(segment = %name, "segment name matched");

    cur.seek(off + SEGMENT_NSECTS_OFFSET)?;
    let nsects = cur.read_u32()? as usize;
    let sections_len = nsects.checked_mul(SECTION_64_SIZE).ok_or_else(|| {
        SealError::malformed(off, format!("nsects {nsects} overflows"))
    })?;
    if SEGMENT_COMMAND_64_SIZE + sections_len > cmdsize {
        return Err(SealError::malformed(
            off,
            format!("{nsects} section headers run past the {cmdsize}-byte segment command"),
        ));
    }

    // Section headers are laid out contiguously after the segment command.
    for s in 0..nsects {
        let soff = off + SEGMENT_COMMAND_64_SIZE + s * SECTION_64_SIZE;
        cur.seek(soff)?;
        let sectname = cur.read_name()?;
        if sectname != *section {
            continue;
        }
        cur.seek(soff + SECTION_ADDR_OFFSET)?;
        let addr = cur.read_u64()?;
        let size = cur.read_u64()?;
        let address = view.base.wrapping_add(view.slide as u64).wrapping_add(addr);
        trace!(section = %sectname, address, size, "section resolved");
        return Ok(Some(MemoryRegion { address, len: size }));
    }
    Ok(None)
}
