//! Synthetic ELF32 shared objects for tests.
//!
//! Layout of a built image:
//!
//! ```text
//! 0x00   Elf32_Ehdr
//! 0x34   Elf32_Phdr[]      PT_LOAD, then PT_DYNAMIC
//! 0x80   segment (vaddr 0) payload | dynamic | strtab | symtab | hash | rela | jmprel
//! ```

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::arch::Machine;
use crate::bytes::ByteOrder;
use crate::dynamic::*;
use crate::hash::elf_hash;
use crate::header::{ELF32_EHDR_SIZE, ELF32_PHDR_SIZE, PT_DYNAMIC, PT_LOAD};

/// File offset of the loadable segment.
pub(crate) const SEGMENT_OFFSET: usize = 128;

/// A relocation record to emit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rela {
    offset: u32,
    sym: u32,
    ty: u8,
    addend: i32,
}

impl Rela {
    pub(crate) fn new(offset: u32, sym: u32, ty: u8, addend: i32) -> Self {
        Self {
            offset,
            sym,
            ty,
            addend,
        }
    }
}

/// Builds an image with one loadable segment holding every table.
#[derive(Debug, Clone)]
pub(crate) struct ImageBuilder {
    machine: Machine,
    payload: Vec<u8>,
    symbols: Vec<(String, u32)>,
    buckets: u32,
    cyclic_chain: bool,
    rela: Vec<Rela>,
    jmprel: Vec<Rela>,
    init: Option<u32>,
    strsz: Option<u32>,
    bss: u32,
    dynamic_segment: bool,
    omitted: Vec<i32>,
    extra: Vec<(i32, u32)>,
}

impl ImageBuilder {
    pub(crate) fn new() -> Self {
        Self {
            machine: Machine::OpenRisc,
            payload: vec![0; 16],
            symbols: Vec::new(),
            buckets: 1,
            cyclic_chain: false,
            rela: Vec::new(),
            jmprel: Vec::new(),
            init: None,
            strsz: None,
            bss: 0,
            dynamic_segment: true,
            omitted: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub(crate) fn machine(mut self, machine: Machine) -> Self {
        self.machine = machine;
        self
    }

    pub(crate) fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Adds a symbol; the first one added gets index 1.
    pub(crate) fn symbol(mut self, name: &str, value: u32) -> Self {
        self.symbols.push((String::from(name), value));
        self
    }

    pub(crate) fn buckets(mut self, count: u32) -> Self {
        self.buckets = count;
        self
    }

    /// Links every symbol into one loop instead of terminating chains.
    pub(crate) fn cyclic_chain(mut self) -> Self {
        self.cyclic_chain = true;
        self
    }

    pub(crate) fn rela(mut self, rela: Rela) -> Self {
        self.rela.push(rela);
        self
    }

    pub(crate) fn jmprel(mut self, rela: Rela) -> Self {
        self.jmprel.push(rela);
        self
    }

    pub(crate) fn init(mut self, offset: u32) -> Self {
        self.init = Some(offset);
        self
    }

    /// Overrides `DT_STRSZ`.
    pub(crate) fn strsz(mut self, size: u32) -> Self {
        self.strsz = Some(size);
        self
    }

    /// Makes `p_memsz` exceed `p_filesz` by `len`.
    pub(crate) fn bss(mut self, len: u32) -> Self {
        self.bss = len;
        self
    }

    pub(crate) fn without_dynamic_segment(mut self) -> Self {
        self.dynamic_segment = false;
        self
    }

    pub(crate) fn omit_tag(mut self, tag: i32) -> Self {
        self.omitted.push(tag);
        self
    }

    /// Adds an entry just before `DT_NULL`.
    pub(crate) fn extra_dyn(mut self, tag: i32, value: u32) -> Self {
        self.extra.push((tag, value));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let order = self.machine.byte_order();

        // Strings and symbols
        let mut strtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for (name, _) in &self.symbols {
            name_offsets.push(strtab.len() as u32);
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
        }
        let nchain = self.symbols.len() as u32 + 1;

        // Segment layout, all relative to vaddr 0
        let dyn_count = self.dynamic_entries(&Offsets::default()).len();
        let dynamic = align4(self.payload.len());
        let strtab_addr = dynamic + dyn_count * ELF32_DYN_SIZE;
        let symtab = align4(strtab_addr + strtab.len());
        let hash = symtab + nchain as usize * ELF32_SYM_SIZE;
        let rela = hash + 8 + (self.buckets as usize + nchain as usize) * 4;
        let jmprel = rela + self.rela.len() * ELF32_RELA_SIZE;
        let seg_len = jmprel + self.jmprel.len() * ELF32_RELA_SIZE;

        let offsets = Offsets {
            strtab: strtab_addr as u32,
            strsz: strtab.len() as u32,
            symtab: symtab as u32,
            hash: hash as u32,
            rela: rela as u32,
            jmprel: jmprel as u32,
        };

        let mut seg = Vec::with_capacity(seg_len);
        seg.extend_from_slice(&self.payload);
        pad4(&mut seg);
        for (tag, value) in self.dynamic_entries(&offsets) {
            put_u32(&mut seg, order, tag as u32);
            put_u32(&mut seg, order, value);
        }
        seg.extend_from_slice(&strtab);
        pad4(&mut seg);

        // Null symbol first
        seg.extend_from_slice(&[0; ELF32_SYM_SIZE]);
        for ((_, value), &name) in self.symbols.iter().zip(&name_offsets) {
            put_u32(&mut seg, order, name);
            put_u32(&mut seg, order, *value);
            seg.extend_from_slice(&[0; 8]);
        }

        let (buckets, chain) = self.hash_arrays(nchain);
        put_u32(&mut seg, order, self.buckets);
        put_u32(&mut seg, order, nchain);
        for word in buckets.iter().chain(&chain) {
            put_u32(&mut seg, order, *word);
        }

        for rela in self.rela.iter().chain(&self.jmprel) {
            put_u32(&mut seg, order, rela.offset);
            put_u32(&mut seg, order, (rela.sym << 8) | rela.ty as u32);
            put_u32(&mut seg, order, rela.addend as u32);
        }
        debug_assert_eq!(seg.len(), seg_len);

        // Headers
        let phnum: u16 = if self.dynamic_segment { 2 } else { 1 };
        let mut out = Vec::with_capacity(SEGMENT_OFFSET + seg_len);
        out.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, order.ident(), 1, 0, 0]);
        out.resize(16, 0);
        put_u16(&mut out, order, 3); // ET_DYN
        put_u16(&mut out, order, self.machine.code());
        put_u32(&mut out, order, 1); // e_version
        put_u32(&mut out, order, 0); // e_entry
        put_u32(&mut out, order, ELF32_EHDR_SIZE as u32); // e_phoff
        put_u32(&mut out, order, 0); // e_shoff
        put_u32(&mut out, order, 0); // e_flags
        put_u16(&mut out, order, ELF32_EHDR_SIZE as u16);
        put_u16(&mut out, order, ELF32_PHDR_SIZE as u16);
        put_u16(&mut out, order, phnum);
        put_u16(&mut out, order, 0);
        put_u16(&mut out, order, 0);
        put_u16(&mut out, order, 0);
        debug_assert_eq!(out.len(), ELF32_EHDR_SIZE);

        let filesz = seg_len as u32;
        let load = [PT_LOAD, SEGMENT_OFFSET as u32, 0, 0, filesz, filesz + self.bss, 7, 4];
        for word in load {
            put_u32(&mut out, order, word);
        }
        if self.dynamic_segment {
            let size = (dyn_count * ELF32_DYN_SIZE) as u32;
            let file_offset = (SEGMENT_OFFSET + dynamic) as u32;
            let phdr = [PT_DYNAMIC, file_offset, dynamic as u32, 0, size, size, 6, 4];
            for word in phdr {
                put_u32(&mut out, order, word);
            }
        }

        out.resize(SEGMENT_OFFSET, 0);
        out.extend_from_slice(&seg);
        out
    }

    fn dynamic_entries(&self, at: &Offsets) -> Vec<(i32, u32)> {
        let rela_size = (self.rela.len() * ELF32_RELA_SIZE) as u32;
        let jmprel_size = (self.jmprel.len() * ELF32_RELA_SIZE) as u32;
        let mut entries = vec![
            (DT_STRTAB, at.strtab),
            (DT_STRSZ, self.strsz.unwrap_or(at.strsz)),
            (DT_SYMTAB, at.symtab),
            (DT_SYMENT, ELF32_SYM_SIZE as u32),
            (DT_HASH, at.hash),
            (DT_RELA, at.rela),
            (DT_RELASZ, rela_size),
            (DT_RELAENT, ELF32_RELA_SIZE as u32),
            (DT_JMPREL, at.jmprel),
            (DT_PLTRELSZ, jmprel_size),
            (DT_PLTREL, DT_RELA as u32),
        ];
        if let Some(init) = self.init {
            entries.push((DT_INIT, init));
        }
        entries.retain(|(tag, _)| !self.omitted.contains(tag));
        entries.extend_from_slice(&self.extra);
        entries.push((DT_NULL, 0));
        entries
    }

    fn hash_arrays(&self, nchain: u32) -> (Vec<u32>, Vec<u32>) {
        let mut buckets = vec![0u32; self.buckets as usize];
        let mut chain = vec![0u32; nchain as usize];

        if self.cyclic_chain {
            let last = nchain - 1;
            for index in 1..nchain {
                chain[index as usize] = if index == last { 1 } else { index + 1 };
            }
            buckets.fill(if last > 0 { 1 } else { 0 });
            return (buckets, chain);
        }

        if self.buckets == 0 {
            return (buckets, chain);
        }
        for (i, (name, _)) in self.symbols.iter().enumerate() {
            let index = i as u32 + 1;
            let bucket = (elf_hash(name.as_bytes()) % self.buckets) as usize;
            chain[index as usize] = buckets[bucket];
            buckets[bucket] = index;
        }
        (buckets, chain)
    }
}

#[derive(Debug, Default)]
struct Offsets {
    strtab: u32,
    strsz: u32,
    symtab: u32,
    hash: u32,
    rela: u32,
    jmprel: u32,
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn pad4(out: &mut Vec<u8>) {
    out.resize(align4(out.len()), 0);
}

fn put_u16(out: &mut Vec<u8>, order: ByteOrder, value: u16) {
    let bytes = match order {
        ByteOrder::Little => value.to_le_bytes(),
        ByteOrder::Big => value.to_be_bytes(),
    };
    out.extend_from_slice(&bytes);
}

fn put_u32(out: &mut Vec<u8>, order: ByteOrder, value: u32) {
    out.extend_from_slice(&order.u32_bytes(value));
}
