//! # ELF32 Header Validation
//!
//! Checks the identification bytes and the fixed header fields of an image,
//! and parses its program header table. Nothing is copied until
//! [`Elf32Header::parse`] has accepted the whole header and located the
//! program header table inside the image.

use bitflags::bitflags;

use crate::arch::Machine;
use crate::bytes::{Reader, Region};
use crate::error::LoadError;

/// ELF magic number.
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// ELF class: 32-bit.
pub const ELFCLASS32: u8 = 1;

/// ELF version: current.
pub const EV_CURRENT: u8 = 1;

/// OS/ABI: none (System V).
pub const ELFOSABI_NONE: u8 = 0;

/// ELF type: shared object.
pub const ET_DYN: u16 = 3;

/// Program header type: loadable segment.
pub const PT_LOAD: u32 = 1;

/// Program header type: dynamic linking info.
pub const PT_DYNAMIC: u32 = 2;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_VERSION: usize = 6;
const EI_OSABI: usize = 7;
const EI_ABIVERSION: usize = 8;
const EI_PAD: usize = 9;
const EI_NIDENT: usize = 16;

/// Size of an `Elf32_Ehdr`.
pub const ELF32_EHDR_SIZE: usize = 52;

/// Size of an `Elf32_Phdr`.
pub const ELF32_PHDR_SIZE: usize = 32;

const NOT_SHARED_LIBRARY: &str = "ELF object is not a shared library";

bitflags! {
    /// Segment permission flags (`p_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        const EXECUTE = 1;
        const WRITE = 2;
        const READ = 4;
    }
}

/// Validated ELF32 file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Header {
    /// Object file type, always `ET_DYN` once validated.
    pub e_type: u16,
    /// Machine architecture.
    pub e_machine: u16,
    /// Program header table file offset.
    pub e_phoff: u32,
    /// Program header entry size.
    pub e_phentsize: u16,
    /// Number of program headers.
    pub e_phnum: u16,
}

impl Elf32Header {
    /// Validates the header of `data` for `machine`.
    ///
    /// Checks, in order: magic, class, byte order, version, OS/ABI and
    /// padding of `e_ident`, then object type and machine, then that the program header table lies inside
    /// `data`. The first violation is returned.
    pub fn parse(data: &[u8], machine: Machine) -> Result<Self, LoadError> {
        if !data.starts_with(&ELF_MAGIC) {
            return Err(LoadError::Format("ELF object has an invalid magic number"));
        }
        let ident = data
            .get(..EI_NIDENT)
            .ok_or(LoadError::Format(NOT_SHARED_LIBRARY))?;

        if ident[EI_CLASS] != ELFCLASS32 {
            return Err(LoadError::Format("ELF object is not 32-bit"));
        }
        if ident[EI_DATA] != machine.byte_order().ident() {
            return Err(LoadError::Format("ELF object has the wrong byte order"));
        }
        if ident[EI_VERSION] != EV_CURRENT {
            return Err(LoadError::Format("ELF object has an unknown version"));
        }
        if ident[EI_OSABI] != ELFOSABI_NONE || ident[EI_ABIVERSION] != 0 {
            return Err(LoadError::Format("ELF object targets an unsupported ABI"));
        }
        if ident[EI_PAD..].iter().any(|&b| b != 0) {
            return Err(LoadError::Format("ELF object has non-zero identification padding"));
        }

        if data.len() < ELF32_EHDR_SIZE {
            return Err(LoadError::OutOfBounds("header"));
        }

        let reader = Reader::new(data, machine.byte_order());
        let e_type = reader.u16(16, "header")?;
        if e_type != ET_DYN {
            return Err(LoadError::Format(NOT_SHARED_LIBRARY));
        }

        let e_machine = reader.u16(18, "header")?;
        if e_machine != machine.code() {
            log::debug!(
                "dyld: image machine {} ({:?}), expected {}",
                e_machine,
                Machine::from_code(e_machine),
                machine.name()
            );
            return Err(LoadError::Format(machine.mismatch_message()));
        }

        let header = Self {
            e_type,
            e_machine,
            e_phoff: reader.u32(28, "header")?,
            e_phentsize: reader.u16(42, "header")?,
            e_phnum: reader.u16(44, "header")?,
        };

        if header.e_phnum > 0 && (header.e_phentsize as usize) < ELF32_PHDR_SIZE {
            return Err(LoadError::Format("ELF object has malformed program headers"));
        }
        header.program_header_table(data.len())?;

        Ok(header)
    }

    /// The program header table as a region of the image.
    pub fn program_header_table(&self, image_len: usize) -> Result<Region, LoadError> {
        let len = (self.e_phnum as usize)
            .checked_mul(self.e_phentsize as usize)
            .ok_or(LoadError::OutOfBounds("program header table"))?;
        Region::within(self.e_phoff as usize, len, image_len, "program header table")
    }

    /// Parses program header `index`.
    pub fn program_header(&self, image: Reader<'_>, index: usize) -> Result<ProgramHeader, LoadError> {
        let entry = self
            .program_header_table(image.len())?
            .entry(index, self.e_phentsize as usize)
            .ok_or(LoadError::OutOfBounds("program header table"))?;
        ProgramHeader::parse(image, entry.start)
    }

    /// Number of program headers.
    pub fn program_header_count(&self) -> usize {
        self.e_phnum as usize
    }
}

/// Parsed `Elf32_Phdr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Segment type.
    pub p_type: u32,
    /// File offset.
    pub p_offset: u32,
    /// Virtual address, relative to the load base.
    pub p_vaddr: u32,
    /// Bytes present in the file.
    pub p_filesz: u32,
    /// Bytes occupied in memory.
    pub p_memsz: u32,
    /// Permissions.
    pub flags: SegmentFlags,
}

impl ProgramHeader {
    fn parse(image: Reader<'_>, offset: usize) -> Result<Self, LoadError> {
        let what = "program header";
        Ok(Self {
            p_type: image.u32(offset, what)?,
            p_offset: image.u32(offset + 4, what)?,
            p_vaddr: image.u32(offset + 8, what)?,
            // p_paddr at 12 is unused
            p_filesz: image.u32(offset + 16, what)?,
            p_memsz: image.u32(offset + 20, what)?,
            flags: SegmentFlags::from_bits_truncate(image.u32(offset + 24, what)?),
        })
    }

    /// The file-backed bytes of this segment as a region of the image.
    pub fn file_region(&self) -> Region {
        Region::new(self.p_offset as usize, self.p_filesz as usize)
    }
}
