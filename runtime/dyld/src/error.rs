//! Loader errors.

use alloc::string::String;
use core::fmt;

/// Why a load failed.
///
/// Every variant is fatal to the load attempt that produced it. The
/// destination memory may already hold copied segments and applied
/// relocations and must not be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// A header field does not describe a supported ELF32 shared object.
    Format(&'static str),
    /// No `PT_DYNAMIC` program header.
    MissingDynamicSegment,
    /// The string table or symbol table is absent from the dynamic section.
    MissingSymbolTable,
    /// `DT_HASH` is absent from the dynamic section.
    MissingHashTable,
    /// `DT_REL` is present, or record sizes do not match `Elf32_Sym`/`Elf32_Rela`.
    UnsupportedRelocationFormat(&'static str),
    /// Relocation code not in the machine's table.
    UnsupportedRelocationType(u8),
    /// Neither the image nor the external resolver defines this symbol.
    UnresolvedSymbol(String),
    /// An offset, count or address does not fit the image or the destination.
    OutOfBounds(&'static str),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Format(msg) => f.write_str(msg),
            LoadError::MissingDynamicSegment => {
                write!(f, "ELF object does not have a PT_DYNAMIC header")
            }
            LoadError::MissingSymbolTable => write!(f, "ELF object must contain a symbol table"),
            LoadError::MissingHashTable => write!(f, "ELF object must contain a DT_HASH table"),
            LoadError::UnsupportedRelocationFormat(msg) => f.write_str(msg),
            LoadError::UnsupportedRelocationType(code) => {
                write!(f, "ELF object uses an unsupported relocation type ({})", code)
            }
            LoadError::UnresolvedSymbol(name) => {
                write!(f, "ELF object has an unresolved symbol: {}", name)
            }
            LoadError::OutOfBounds(what) => write!(f, "ELF object {} is out of bounds", what),
        }
    }
}

impl core::error::Error for LoadError {}
