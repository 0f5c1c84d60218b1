//! # Dynamic Section Parser
//!
//! Walks the `Elf32_Dyn` array of the `PT_DYNAMIC` segment and collects the
//! table locations the relocation stage needs.

use crate::bytes::{Reader, Region};
use crate::error::LoadError;
use crate::Addr;

/// Dynamic tags.
pub const DT_NULL: i32 = 0;
pub const DT_PLTRELSZ: i32 = 2;
pub const DT_HASH: i32 = 4;
pub const DT_STRTAB: i32 = 5;
pub const DT_SYMTAB: i32 = 6;
pub const DT_RELA: i32 = 7;
pub const DT_RELASZ: i32 = 8;
pub const DT_RELAENT: i32 = 9;
pub const DT_STRSZ: i32 = 10;
pub const DT_SYMENT: i32 = 11;
pub const DT_INIT: i32 = 12;
pub const DT_REL: i32 = 17;
pub const DT_PLTREL: i32 = 20;
pub const DT_JMPREL: i32 = 23;

/// Size of an `Elf32_Dyn`.
pub const ELF32_DYN_SIZE: usize = 8;

/// Size of an `Elf32_Sym`.
pub const ELF32_SYM_SIZE: usize = 16;

/// Size of an `Elf32_Rela`.
pub const ELF32_RELA_SIZE: usize = 12;

/// Table locations found in the dynamic section.
///
/// Addresses are relative to the load base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicInfo {
    /// `DT_STRTAB`.
    pub strtab: Addr,
    /// `DT_STRSZ`, if present.
    pub strsz: Option<u32>,
    /// `DT_SYMTAB`.
    pub symtab: Addr,
    /// `DT_HASH`.
    pub hash: Addr,
    /// `DT_RELA` and the number of entries from `DT_RELASZ`.
    pub rela: Option<Addr>,
    /// Entries in the `DT_RELA` table.
    pub rela_count: usize,
    /// `DT_JMPREL`.
    pub jmprel: Option<Addr>,
    /// Entries in the `DT_JMPREL` table.
    pub jmprel_count: usize,
    /// `DT_INIT`.
    pub init: Option<Addr>,
}

/// Raw values as seen during the walk, before the required ones are checked.
#[derive(Debug, Clone, Copy)]
struct RawDynamic {
    strtab: Option<Addr>,
    strsz: Option<u32>,
    symtab: Option<Addr>,
    syment: u32,
    hash: Option<Addr>,
    rela: Option<Addr>,
    relasz: u32,
    relaent: u32,
    jmprel: Option<Addr>,
    pltrelsz: u32,
    pltrel: Option<u32>,
    init: Option<Addr>,
}

impl Default for RawDynamic {
    fn default() -> Self {
        Self {
            strtab: None,
            strsz: None,
            symtab: None,
            syment: ELF32_SYM_SIZE as u32,
            hash: None,
            rela: None,
            relasz: 0,
            relaent: ELF32_RELA_SIZE as u32,
            jmprel: None,
            pltrelsz: 0,
            pltrel: None,
            init: None,
        }
    }
}

impl DynamicInfo {
    /// Parses the dynamic entries stored in `region` of `image`.
    pub fn parse(image: Reader<'_>, region: Region) -> Result<Self, LoadError> {
        let mut raw = RawDynamic::default();
        let mut index = 0;

        loop {
            let entry = region
                .entry(index, ELF32_DYN_SIZE)
                .ok_or(LoadError::OutOfBounds("dynamic section"))?;
            let d_tag = image.i32(entry.start, "dynamic section")?;
            let d_val = image.u32(entry.start + 4, "dynamic section")?;

            match d_tag {
                DT_NULL => break,
                DT_STRTAB => raw.strtab = Some(d_val),
                DT_STRSZ => raw.strsz = Some(d_val),
                DT_SYMTAB => raw.symtab = Some(d_val),
                DT_SYMENT => raw.syment = d_val,
                DT_HASH => raw.hash = Some(d_val),
                DT_RELA => raw.rela = Some(d_val),
                DT_RELASZ => raw.relasz = d_val,
                DT_RELAENT => raw.relaent = d_val,
                DT_JMPREL => raw.jmprel = Some(d_val),
                DT_PLTRELSZ => raw.pltrelsz = d_val,
                DT_PLTREL => raw.pltrel = Some(d_val),
                DT_INIT => raw.init = Some(d_val),
                DT_REL => {
                    return Err(LoadError::UnsupportedRelocationFormat(
                        "ELF object uses Rel relocations, which are not supported",
                    ))
                }
                _ => {}
            }

            index += 1;
        }

        let (strtab, symtab) = match (raw.strtab, raw.symtab) {
            (Some(strtab), Some(symtab)) if raw.syment != 0 => (strtab, symtab),
            _ => return Err(LoadError::MissingSymbolTable),
        };

        if raw.syment as usize != ELF32_SYM_SIZE || raw.relaent as usize != ELF32_RELA_SIZE {
            return Err(LoadError::UnsupportedRelocationFormat(
                "ELF object uses an unknown format for symbols and relocations",
            ));
        }

        if raw.pltrel.is_some_and(|kind| kind != DT_RELA as u32) {
            return Err(LoadError::UnsupportedRelocationFormat(
                "ELF object uses Rel relocations for its PLT",
            ));
        }

        let hash = raw.hash.ok_or(LoadError::MissingHashTable)?;

        let info = Self {
            strtab,
            strsz: raw.strsz,
            symtab,
            hash,
            rela: raw.rela,
            rela_count: raw.relasz as usize / ELF32_RELA_SIZE,
            jmprel: raw.jmprel,
            jmprel_count: raw.pltrelsz as usize / ELF32_RELA_SIZE,
            init: raw.init,
        };

        log::debug!(
            "dyld: strtab {:#x} symtab {:#x} hash {:#x} rela {} jmprel {}",
            info.strtab,
            info.symtab,
            info.hash,
            info.rela_count,
            info.jmprel_count
        );

        Ok(info)
    }

    /// The general relocation table inside a destination of `dest_len` bytes.
    pub fn rela_region(&self, dest_len: usize) -> Result<Region, LoadError> {
        table_region(self.rela, self.rela_count, dest_len, "relocation table")
    }

    /// The PLT relocation table inside a destination of `dest_len` bytes.
    pub fn jmprel_region(&self, dest_len: usize) -> Result<Region, LoadError> {
        table_region(self.jmprel, self.jmprel_count, dest_len, "PLT relocation table")
    }
}

fn table_region(
    addr: Option<Addr>,
    count: usize,
    dest_len: usize,
    what: &'static str,
) -> Result<Region, LoadError> {
    let Some(addr) = addr else {
        return Ok(Region::default());
    };
    let len = count
        .checked_mul(ELF32_RELA_SIZE)
        .ok_or(LoadError::OutOfBounds(what))?;
    Region::within(addr as usize, len, dest_len, what)
}
