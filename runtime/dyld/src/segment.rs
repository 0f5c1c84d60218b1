//! # Segment Loader
//!
//! Copies every `PT_LOAD` segment of a validated image to
//! `base + p_vaddr` and finds the `PT_DYNAMIC` segment.
//!
//! All program headers are checked against the image and the destination
//! before the first byte is copied. Segments may overlap each other in the
//! destination; the image's own layout is trusted.

use crate::bytes::{Reader, Region, Writer};
use crate::error::LoadError;
use crate::header::{Elf32Header, ProgramHeader, PT_DYNAMIC, PT_LOAD};

/// Outcome of copying the segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segments {
    /// Number of `PT_LOAD` segments copied.
    pub loaded: usize,
    /// The dynamic segment's bytes, as a region of the image file.
    pub dynamic: Option<Region>,
}

/// Bytes of the destination a segment occupies.
fn destination(phdr: &ProgramHeader, zero_fill_bss: bool) -> Region {
    let len = if zero_fill_bss {
        phdr.p_filesz.max(phdr.p_memsz)
    } else {
        phdr.p_filesz
    };
    Region::new(phdr.p_vaddr as usize, len as usize)
}

/// Copies the loadable segments of `image` into `dest`.
///
/// `dest` index 0 is the load base. With `zero_fill_bss`, the bytes between
/// `p_filesz` and `p_memsz` are cleared as well.
pub fn load_segments(
    header: &Elf32Header,
    image: Reader<'_>,
    dest: &mut Writer<'_>,
    zero_fill_bss: bool,
) -> Result<Segments, LoadError> {
    let count = header.program_header_count();

    // Validate everything first so a bad header leaves `dest` untouched.
    for index in 0..count {
        let phdr = header.program_header(image, index)?;
        match phdr.p_type {
            PT_LOAD => {
                let src = phdr.file_region();
                Region::within(src.start, src.len, image.len(), "segment")?;
                let dst = destination(&phdr, zero_fill_bss);
                Region::within(dst.start, dst.len, dest.len(), "segment destination")?;
            }
            PT_DYNAMIC => {
                let src = phdr.file_region();
                Region::within(src.start, src.len, image.len(), "dynamic segment")?;
            }
            _ => {}
        }
    }

    let mut segments = Segments {
        loaded: 0,
        dynamic: None,
    };

    for index in 0..count {
        let phdr = header.program_header(image, index)?;

        if phdr.p_type == PT_DYNAMIC {
            segments.dynamic = Some(phdr.file_region());
        }

        if phdr.p_type != PT_LOAD {
            continue;
        }

        let src = phdr.file_region();
        let bytes = image.bytes(src.start, src.len, "segment")?;
        dest.copy_from(phdr.p_vaddr as usize, bytes, "segment destination")?;

        if zero_fill_bss && phdr.p_memsz > phdr.p_filesz {
            let bss = (phdr.p_memsz - phdr.p_filesz) as usize;
            dest.zero(src.len + phdr.p_vaddr as usize, bss, "segment destination")?;
        }

        log::debug!(
            "dyld: segment {:#x} filesz {:#x} memsz {:#x} {:?}",
            phdr.p_vaddr,
            phdr.p_filesz,
            phdr.p_memsz,
            phdr.flags
        );
        segments.loaded += 1;
    }

    Ok(segments)
}
