//! # Loaded Image
//!
//! [`LoadedImage`] is what a successful load hands back: the load base plus
//! borrowed views of the string table, symbol table and hash table inside
//! the destination memory. It owns nothing; the destination must outlive it.

use crate::bytes::{ByteOrder, Reader, Region};
use crate::dynamic::{DynamicInfo, ELF32_SYM_SIZE};
use crate::error::LoadError;
use crate::hash::{self, HashTable};
use crate::Addr;

/// Parsed `Elf32_Sym`, reduced to what the loader uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Sym {
    /// Offset of the name in the string table.
    pub st_name: u32,
    /// Value relative to the load base; 0 means no value.
    pub st_value: u32,
}

/// View of the `DT_STRTAB` string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTable {
    region: Region,
}

impl StringTable {
    /// Name at `offset`, without its terminator.
    pub fn get<'a>(&self, mem: Reader<'a>, offset: u32) -> Option<&'a [u8]> {
        mem.c_str(self.region, offset as usize)
    }

    /// Bytes of the table.
    pub fn region(&self) -> Region {
        self.region
    }
}

/// View of the `DT_SYMTAB` symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTable {
    region: Region,
}

impl SymbolTable {
    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.region.count(ELF32_SYM_SIZE)
    }

    /// Whether the table holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Symbol `index`.
    pub fn get(&self, mem: Reader<'_>, index: u32) -> Option<Elf32Sym> {
        let entry = self.region.entry(index as usize, ELF32_SYM_SIZE)?;
        Some(Elf32Sym {
            st_name: mem.u32(entry.start, "symbol").ok()?,
            st_value: mem.u32(entry.start + 4, "symbol").ok()?,
        })
    }
}

/// The three tables symbol lookup needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tables {
    /// String table.
    pub strtab: StringTable,
    /// Symbol table, sized by the hash table's chain count.
    pub symtab: SymbolTable,
    /// Hash table.
    pub hash: HashTable,
}

impl Tables {
    /// Resolves the dynamic section's addresses into regions of `mem`.
    pub fn locate(info: &DynamicInfo, mem: Reader<'_>) -> Result<Self, LoadError> {
        let hash = HashTable::locate(mem, info.hash)?;

        let strtab_start = info.strtab as usize;
        let strtab_len = match info.strsz {
            Some(size) => size as usize,
            None => mem
                .len()
                .checked_sub(strtab_start)
                .ok_or(LoadError::OutOfBounds("string table"))?,
        };
        let strtab = Region::within(strtab_start, strtab_len, mem.len(), "string table")?;

        let symtab_len = (hash.chain_count as usize)
            .checked_mul(ELF32_SYM_SIZE)
            .ok_or(LoadError::OutOfBounds("symbol table"))?;
        let symtab = Region::within(info.symtab as usize, symtab_len, mem.len(), "symbol table")?;

        Ok(Self {
            strtab: StringTable { region: strtab },
            symtab: SymbolTable { region: symtab },
            hash,
        })
    }
}

/// An image that has been copied and relocated.
#[derive(Debug, Clone, Copy)]
pub struct LoadedImage<'a> {
    memory: &'a [u8],
    order: ByteOrder,
    base: Addr,
    tables: Tables,
    init: Option<Addr>,
}

impl<'a> LoadedImage<'a> {
    pub(crate) fn new(
        memory: &'a [u8],
        order: ByteOrder,
        base: Addr,
        tables: Tables,
        init: Option<Addr>,
    ) -> Self {
        Self {
            memory,
            order,
            base,
            tables,
            init,
        }
    }

    fn reader(&self) -> Reader<'a> {
        Reader::new(self.memory, self.order)
    }

    /// Address the image was loaded at.
    pub fn base(&self) -> Addr {
        self.base
    }

    /// Address of the `DT_INIT` function, if the image has one.
    pub fn init(&self) -> Option<Addr> {
        self.init
    }

    /// Resolves a symbol defined by this image.
    ///
    /// Returns `base + st_value`, or `None` if the name is not in the hash
    /// table or its value is 0.
    pub fn lookup(&self, name: &str) -> Option<Addr> {
        hash::lookup(self.reader(), &self.tables, self.base, name.as_bytes())
    }

    /// The string table bytes.
    pub fn string_table(&self) -> &'a [u8] {
        self.tables
            .strtab
            .region()
            .slice(self.memory)
            .unwrap_or_default()
    }

    /// Number of entries in the symbol table.
    pub fn symbol_count(&self) -> usize {
        self.tables.symtab.len()
    }

    /// Symbol `index`.
    pub fn symbol(&self, index: u32) -> Option<Elf32Sym> {
        self.tables.symtab.get(self.reader(), index)
    }

    /// Name of `sym`, if it is valid UTF-8.
    pub fn symbol_name(&self, sym: &Elf32Sym) -> Option<&'a str> {
        let bytes = self.tables.strtab.get(self.reader(), sym.st_name)?;
        core::str::from_utf8(bytes).ok()
    }

    /// The hash table.
    pub fn hash_table(&self) -> &HashTable {
        &self.tables.hash
    }

    /// The destination memory the views point into.
    pub fn memory(&self) -> &'a [u8] {
        self.memory
    }
}
