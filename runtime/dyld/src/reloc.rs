//! # Relocation Engine
//!
//! Applies `Elf32_Rela` records to the copied image. Each record is
//! classified through the machine's table, its 32-bit patch value is
//! computed, and the value is stored at `base + r_offset` in the image's
//! byte order.
//!
//! Symbol-resolving records try the image's own hash table first and the
//! external [`Resolver`] second. Records already applied when a later one
//! fails are left in place.

use alloc::string::String;

use crate::arch::{Machine, RelocKind};
use crate::bytes::{Reader, Region, Writer};
use crate::dynamic::ELF32_RELA_SIZE;
use crate::error::LoadError;
use crate::hash::{self, STN_UNDEF};
use crate::image::Tables;
use crate::resolve::{resolve_external, Resolver};
use crate::Addr;

/// Relocation entry with addend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Rela {
    /// Offset from the load base to patch.
    pub r_offset: u32,
    /// Symbol index and relocation type.
    pub r_info: u32,
    /// Addend.
    pub r_addend: i32,
}

impl Elf32Rela {
    /// Reads the record at `offset`.
    pub fn parse(mem: Reader<'_>, offset: usize) -> Result<Self, LoadError> {
        let what = "relocation";
        Ok(Self {
            r_offset: mem.u32(offset, what)?,
            r_info: mem.u32(offset + 4, what)?,
            r_addend: mem.i32(offset + 8, what)?,
        })
    }

    /// Get symbol index.
    pub fn r_sym(&self) -> u32 {
        self.r_info >> 8
    }

    /// Get relocation type.
    pub fn r_type(&self) -> u8 {
        (self.r_info & 0xff) as u8
    }
}

/// Everything a relocation needs besides the record and the memory.
pub struct RelocContext<'r, R: Resolver + ?Sized> {
    /// Architecture whose relocation table applies.
    pub machine: Machine,
    /// Load base.
    pub base: Addr,
    /// The image's own tables, for self-resolution.
    pub tables: &'r Tables,
    /// Fallback for symbols the image does not define.
    pub resolver: &'r mut R,
}

/// Computes and stores the patch for one record.
pub fn apply<R: Resolver + ?Sized>(
    rela: &Elf32Rela,
    mem: &mut Writer<'_>,
    ctx: &mut RelocContext<'_, R>,
) -> Result<(), LoadError> {
    let kind = ctx
        .machine
        .reloc_kind(rela.r_type())
        .ok_or(LoadError::UnsupportedRelocationType(rela.r_type()))?;

    let value = match kind {
        RelocKind::None => return Ok(()),
        RelocKind::Relative => ctx.base.wrapping_add_signed(rela.r_addend),
        RelocKind::Absolute | RelocKind::GlobalData | RelocKind::JumpSlot => {
            resolve_symbol(rela.r_sym(), mem.reader(), ctx)?
        }
    };

    log::trace!(
        "dyld: {:?} at {:#x} = {:#x}",
        kind,
        rela.r_offset,
        value
    );
    mem.put_u32(rela.r_offset as usize, value, "relocation target")
}

fn resolve_symbol<R: Resolver + ?Sized>(
    index: u32,
    mem: Reader<'_>,
    ctx: &mut RelocContext<'_, R>,
) -> Result<Addr, LoadError> {
    if index == STN_UNDEF {
        return Err(LoadError::UnresolvedSymbol(String::new()));
    }

    let sym = ctx
        .tables
        .symtab
        .get(mem, index)
        .ok_or(LoadError::OutOfBounds("symbol table"))?;
    let name = ctx
        .tables
        .strtab
        .get(mem, sym.st_name)
        .ok_or(LoadError::OutOfBounds("string table"))?;

    if let Some(addr) = hash::lookup(mem, ctx.tables, ctx.base, name) {
        log::trace!("dyld: {:?} resolved by the image", name);
        return Ok(addr);
    }

    let Ok(name) = core::str::from_utf8(name) else {
        return Err(LoadError::UnresolvedSymbol(
            String::from_utf8_lossy(name).into_owned(),
        ));
    };
    resolve_external(&mut *ctx.resolver, name)
        .ok_or_else(|| LoadError::UnresolvedSymbol(String::from(name)))
}

/// Applies every record of the table in `table`, in order.
///
/// Stops at the first failure. Returns the number of records processed.
pub fn apply_all<R: Resolver + ?Sized>(
    table: Region,
    mem: &mut Writer<'_>,
    ctx: &mut RelocContext<'_, R>,
) -> Result<usize, LoadError> {
    let count = table.count(ELF32_RELA_SIZE);
    for index in 0..count {
        let entry = table
            .entry(index, ELF32_RELA_SIZE)
            .ok_or(LoadError::OutOfBounds("relocation table"))?;
        let rela = Elf32Rela::parse(mem.reader(), entry.start)?;
        apply(&rela, mem, ctx)?;
    }
    Ok(count)
}
