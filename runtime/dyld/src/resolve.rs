//! # External Symbol Resolution
//!
//! Symbols an image does not define itself are handed to a [`Resolver`].
//! Typically this is the firmware's own exported API, shared by every image
//! it loads.

use crate::Addr;

/// Resolves symbol names the loaded image does not define.
pub trait Resolver {
    /// Returns the address of `name`, or `None` if there is no definition.
    ///
    /// `Some(0)` is treated like `None`.
    fn resolve(&mut self, name: &str) -> Option<Addr>;
}

impl<F> Resolver for F
where
    F: FnMut(&str) -> Option<Addr>,
{
    fn resolve(&mut self, name: &str) -> Option<Addr> {
        self(name)
    }
}

/// Asks `resolver` for `name`, folding the 0 sentinel into `None`.
pub(crate) fn resolve_external<R: Resolver + ?Sized>(resolver: &mut R, name: &str) -> Option<Addr> {
    let addr = resolver.resolve(name).filter(|&addr| addr != 0);
    log::trace!("dyld: external {} -> {:?}", name, addr);
    addr
}

/// Resolver for self-contained images: nothing is defined outside.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImports;

impl Resolver for NoImports {
    fn resolve(&mut self, _name: &str) -> Option<Addr> {
        None
    }
}

/// One exported symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Export {
    /// Symbol name.
    pub name: &'static str,
    /// Absolute address.
    pub addr: Addr,
}

impl Export {
    /// Creates an export entry.
    pub const fn new(name: &'static str, addr: Addr) -> Self {
        Self { name, addr }
    }
}

/// A fixed table of exported symbols, searched linearly.
///
/// ```ignore
/// static EXPORTS: &[Export] = &[
///     Export::new("putchar", putchar as usize as u32),
///     Export::new("now_us", now_us as usize as u32),
/// ];
///
/// let mut exports = ExportTable::new(EXPORTS);
/// let image = splax_dyld::load(elf, &mut memory, base, &mut exports)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExportTable<'a> {
    exports: &'a [Export],
}

impl<'a> ExportTable<'a> {
    /// Wraps `exports`.
    pub const fn new(exports: &'a [Export]) -> Self {
        Self { exports }
    }

    /// Looks up `name`.
    pub fn get(&self, name: &str) -> Option<Addr> {
        self.exports
            .iter()
            .find(|export| export.name == name)
            .map(|export| export.addr)
    }

    /// Number of exports.
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

impl Resolver for ExportTable<'_> {
    fn resolve(&mut self, name: &str) -> Option<Addr> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static EXPORTS: [Export; 2] = [Export::new("putchar", 0x4000_0100), Export::new("zero", 0)];

    #[test]
    fn test_export_table() {
        let mut table = ExportTable::new(&EXPORTS);
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("putchar"), Some(0x4000_0100));
        assert_eq!(table.resolve("getchar"), None);
        assert_eq!(resolve_external(&mut table, "putchar"), Some(0x4000_0100));
    }

    #[test]
    fn test_zero_is_no_definition() {
        let mut table = ExportTable::new(&EXPORTS);
        assert_eq!(table.resolve("zero"), Some(0));
        assert_eq!(resolve_external(&mut table, "zero"), None);
    }

    #[test]
    fn test_closure_resolver() {
        let mut resolver = |name: &str| -> Option<Addr> { (name == "abort").then_some(0x10) };
        assert_eq!(resolve_external(&mut resolver, "abort"), Some(0x10));
        assert_eq!(resolve_external(&mut resolver, "exit"), None);
        assert_eq!(NoImports.resolve("abort"), None);
    }

    #[test]
    fn test_dyn_resolver() {
        let mut table = ExportTable::new(&EXPORTS);
        let resolver: &mut dyn Resolver = &mut table;
        assert_eq!(resolve_external(resolver, "putchar"), Some(0x4000_0100));
    }
}
