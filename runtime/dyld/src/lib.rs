//! # S-DYLD: Runtime Loader for ELF32 Shared Objects
//!
//! S-DYLD loads position-independent ELF32 shared objects into memory the
//! caller already owns and relocates them for the address that memory sits
//! at. It is meant for firmware that runs loadable modules without an MMU,
//! a filesystem or a heap of its own.
//!
//! ## Load Pipeline
//!
//! 1. **Header**: magic, class, byte order, version, OS/ABI, `ET_DYN` and
//!    the machine of this build
//! 2. **Segments**: every `PT_LOAD` segment is copied to `base + p_vaddr`
//! 3. **Dynamic section**: string, symbol and hash tables plus the `Rela`
//!    tables are located
//! 4. **Relocations**: `DT_RELA` then `DT_JMPREL`, in table order
//!
//! Symbol references are resolved against the image's own `DT_HASH` table
//! first and the caller's [`Resolver`] second.
//!
//! ## Supported Targets
//!
//! | Machine    | `e_machine` | Byte order | Relocations                      |
//! |------------|-------------|------------|----------------------------------|
//! | OpenRISC   | 92          | big        | NONE, 32, GLOB_DAT, JMP_SLOT, RELATIVE |
//! | RISC-V 32  | 243         | little     | NONE, 32, JUMP_SLOT, RELATIVE    |
//!
//! ## Example
//!
//! ```ignore
//! static EXPORTS: &[Export] = &[Export::new("putchar", putchar as usize as u32)];
//!
//! let image = splax_dyld::load(elf_bytes, &mut module_ram, MODULE_BASE, &mut ExportTable::new(EXPORTS))?;
//! let main = splax_dyld::lookup("main", &image).ok_or(Error::NoEntry)?;
//! ```

#![no_std]

extern crate alloc;

pub mod arch;
pub mod bytes;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod hash;
pub mod header;
pub mod image;
pub mod loader;
pub mod reloc;
pub mod resolve;
pub mod segment;

#[cfg(test)]
mod testutil;

pub use arch::{Machine, RelocKind};
pub use config::LoaderConfig;
pub use error::LoadError;
pub use hash::elf_hash;
pub use image::LoadedImage;
pub use loader::Loader;
pub use resolve::{Export, ExportTable, NoImports, Resolver};

/// Linear address in the 32-bit target address space.
pub type Addr = u32;

/// Loads `image` into `dest` (which starts at `base`) with the default
/// configuration.
///
/// See [`Loader::load`].
pub fn load<'m, R: Resolver + ?Sized>(
    image: &[u8],
    dest: &'m mut [u8],
    base: Addr,
    resolver: &mut R,
) -> Result<LoadedImage<'m>, LoadError> {
    Loader::default().load(image, dest, base, resolver)
}

/// Resolves `name` among the symbols `image` defines.
///
/// Returns `base + st_value`, or `None` when the name is absent or its
/// value is 0.
pub fn lookup(name: &str, image: &LoadedImage<'_>) -> Option<Addr> {
    image.lookup(name)
}
