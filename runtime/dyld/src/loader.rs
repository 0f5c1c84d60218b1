//! # Load Orchestrator
//!
//! Runs the stages of a load in order: header validation, segment copy,
//! dynamic section parsing, then the general and PLT relocation tables.
//! The first failing stage ends the load.

use crate::bytes::{Reader, Writer};
use crate::config::LoaderConfig;
use crate::dynamic::DynamicInfo;
use crate::error::LoadError;
use crate::header::Elf32Header;
use crate::image::{LoadedImage, Tables};
use crate::reloc::{self, RelocContext};
use crate::resolve::Resolver;
use crate::segment;
use crate::Addr;

/// Loads ELF32 shared objects for one machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    /// Create a loader.
    pub const fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load `image` into `dest` and relocate it for `base`.
    ///
    /// `dest[0]` is the byte at linear address `base`; the image's virtual
    /// address `v` ends up at `dest[v]`. Symbols the image does not define
    /// are looked up through `resolver`.
    ///
    /// On error `dest` may hold copied segments and some applied
    /// relocations. It must not be executed.
    pub fn load<'m, R: Resolver + ?Sized>(
        &self,
        image: &[u8],
        dest: &'m mut [u8],
        base: Addr,
        resolver: &mut R,
    ) -> Result<LoadedImage<'m>, LoadError> {
        log::debug!(
            "dyld: loading {} byte image at {:#x} ({}, {} byte region)",
            image.len(),
            base,
            self.config.machine.name(),
            dest.len()
        );

        match self.load_inner(image, dest, base, resolver) {
            Ok(loaded) => {
                log::debug!("dyld: image at {:#x} ready", base);
                Ok(loaded)
            }
            Err(err) => {
                log::warn!("dyld: load at {:#x} failed: {}", base, err);
                Err(err)
            }
        }
    }

    /// Load `image` into the `len` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be valid for writes, must not be accessed
    /// through any other path while the returned image is alive, and `base`
    /// must fit in an [`Addr`].
    pub unsafe fn load_raw<'m, R: Resolver + ?Sized>(
        &self,
        image: &[u8],
        base: *mut u8,
        len: usize,
        resolver: &mut R,
    ) -> Result<LoadedImage<'m>, LoadError> {
        let addr = Addr::try_from(base as usize).map_err(|_| LoadError::OutOfBounds("base address"))?;
        // SAFETY: the caller guarantees the region is valid and exclusive.
        let dest = unsafe { core::slice::from_raw_parts_mut(base, len) };
        self.load(image, dest, addr, resolver)
    }

    fn load_inner<'m, R: Resolver + ?Sized>(
        &self,
        image: &[u8],
        dest: &'m mut [u8],
        base: Addr,
        resolver: &mut R,
    ) -> Result<LoadedImage<'m>, LoadError> {
        let machine = self.config.machine;
        let order = machine.byte_order();

        // Validate the header before touching the destination
        let header = Elf32Header::parse(image, machine)?;
        let file = Reader::new(image, order);

        // Copy segments
        let mut mem = Writer::new(dest, order);
        let segments = segment::load_segments(&header, file, &mut mem, self.config.zero_fill_bss)?;
        let dynamic = segments.dynamic.ok_or(LoadError::MissingDynamicSegment)?;

        // Parse dynamic section
        let info = DynamicInfo::parse(file, dynamic)?;
        let tables = Tables::locate(&info, mem.reader())?;
        let rela = info.rela_region(mem.len())?;
        let jmprel = info.jmprel_region(mem.len())?;

        // Perform relocations
        let mut ctx = RelocContext {
            machine,
            base,
            tables: &tables,
            resolver,
        };
        let applied = reloc::apply_all(rela, &mut mem, &mut ctx)?;
        let plt_applied = reloc::apply_all(jmprel, &mut mem, &mut ctx)?;
        log::debug!(
            "dyld: {} segments, {} + {} relocations",
            segments.loaded,
            applied,
            plt_applied
        );

        let init = info.init.map(|offset| base.wrapping_add(offset));
        Ok(LoadedImage::new(mem.into_inner(), order, base, tables, init))
    }
}
