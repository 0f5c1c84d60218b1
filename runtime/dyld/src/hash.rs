//! # Symbol Hash Table
//!
//! System V `DT_HASH` lookup: the ELF string hash picks a bucket, and the
//! chain array links every symbol sharing that bucket until `STN_UNDEF`.

use alloc::string::String;

use crate::bytes::{Reader, Region};
use crate::error::LoadError;
use crate::image::Tables;
use crate::Addr;

/// Undefined symbol index; terminates hash chains.
pub const STN_UNDEF: u32 = 0;

/// The System V ELF string hash.
pub fn elf_hash(name: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &byte in name {
        h = (h << 4).wrapping_add(byte as u32);
        let g = h & 0xf000_0000;
        if g != 0 {
            h ^= g >> 24;
        }
        h &= !g;
    }
    h
}

/// View of a `DT_HASH` table in the loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTable {
    /// `nbucket`.
    pub bucket_count: u32,
    /// `nchain`, equal to the number of symbols.
    pub chain_count: u32,
    buckets: Region,
    chain: Region,
}

impl HashTable {
    /// Locates the table whose header sits at `addr` in `mem`.
    pub(crate) fn locate(mem: Reader<'_>, addr: Addr) -> Result<Self, LoadError> {
        let what = "hash table";
        let start = addr as usize;
        let bucket_count = mem.u32(start, what)?;
        let chain_count = mem.u32(start + 4, what)?;

        let buckets_len = (bucket_count as usize)
            .checked_mul(4)
            .ok_or(LoadError::OutOfBounds(what))?;
        let buckets = Region::within(start + 8, buckets_len, mem.len(), what)?;

        let chain_len = (chain_count as usize)
            .checked_mul(4)
            .ok_or(LoadError::OutOfBounds(what))?;
        let chain = Region::within(start + 8 + buckets_len, chain_len, mem.len(), what)?;

        Ok(Self {
            bucket_count,
            chain_count,
            buckets,
            chain,
        })
    }

    /// `bucket[index]`.
    pub fn bucket(&self, mem: Reader<'_>, index: u32) -> Option<u32> {
        let entry = self.buckets.entry(index as usize, 4)?;
        mem.u32(entry.start, "hash bucket").ok()
    }

    /// `chain[index]`.
    pub fn chain(&self, mem: Reader<'_>, index: u32) -> Option<u32> {
        let entry = self.chain.entry(index as usize, 4)?;
        mem.u32(entry.start, "hash chain").ok()
    }
}

/// Finds `name` among the symbols of an image loaded at `base`.
///
/// Returns `base + st_value` for a match. A matching symbol whose value is
/// 0 counts as not found, like a name missing from its chain.
pub(crate) fn lookup(mem: Reader<'_>, tables: &Tables, base: Addr, name: &[u8]) -> Option<Addr> {
    let hash = &tables.hash;
    if hash.bucket_count == 0 {
        return None;
    }

    let mut index = hash.bucket(mem, elf_hash(name) % hash.bucket_count)?;

    // A well-formed chain visits each symbol at most once.
    for _ in 0..=hash.chain_count {
        if index == STN_UNDEF {
            return None;
        }
        let sym = tables.symtab.get(mem, index)?;
        if tables.strtab.get(mem, sym.st_name)? == name {
            return match sym.st_value {
                0 => None,
                value => Some(base.wrapping_add(value)),
            };
        }
        index = hash.chain(mem, index)?;
    }

    log::debug!(
        "dyld: hash chain for {} does not terminate",
        String::from_utf8_lossy(name)
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Machine;
    use crate::loader::Loader;
    use crate::config::LoaderConfig;
    use crate::resolve::NoImports;
    use crate::testutil::ImageBuilder;
    use alloc::vec;

    #[test]
    fn test_elf_hash_known_values() {
        assert_eq!(elf_hash(b""), 0);
        assert_eq!(elf_hash(b"a"), 0x61);
        assert_eq!(elf_hash(b"sym"), 0x7afd);
        assert_eq!(elf_hash(b"printf"), 0x077905a6);
        assert_eq!(elf_hash(b"exit"), 0x0006cf04);
    }

    #[test]
    fn test_elf_hash_masks_high_nibble() {
        let h = elf_hash(b"a_very_long_symbol_name_for_hashing");
        assert_eq!(h & 0xf000_0000, 0);
    }

    #[test]
    fn test_lookup_many_symbols_few_buckets() {
        let names = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];
        let mut builder = ImageBuilder::new().buckets(2);
        for (i, name) in names.iter().enumerate() {
            builder = builder.symbol(name, 0x100 + i as u32 * 4);
        }
        let image = builder.build();
        let mut dest = vec![0u8; 0x800];
        let loaded = Loader::new(LoaderConfig::default())
            .load(&image, &mut dest, 0x8000, &mut NoImports)
            .unwrap();

        for (i, name) in names.iter().enumerate() {
            assert_eq!(loaded.lookup(name), Some(0x8100 + i as u32 * 4), "{}", name);
        }
        assert_eq!(loaded.lookup("eta"), None);
        assert_eq!(loaded.lookup(""), None);
    }

    #[test]
    fn test_lookup_cyclic_chain_terminates() {
        let image = ImageBuilder::new()
            .symbol("a", 0x10)
            .symbol("b", 0x14)
            .buckets(1)
            .cyclic_chain()
            .build();
        let mut dest = vec![0u8; 0x400];
        let loaded = Loader::new(LoaderConfig::new(Machine::OpenRisc))
            .load(&image, &mut dest, 0x1000, &mut NoImports)
            .unwrap();
        assert_eq!(loaded.lookup("missing"), None);
    }
}
