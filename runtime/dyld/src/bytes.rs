//! # Bounds-Checked Binary Access
//!
//! Every ELF structure is read through a [`Reader`] and every patch of the
//! destination memory goes through a [`Writer`]. Both check offsets and
//! lengths against the buffer they wrap before touching it, so a malformed
//! image produces [`LoadError::OutOfBounds`] instead of a wild access.

use crate::error::LoadError;

// =============================================================================
// Byte Order
// =============================================================================

/// Data encoding of an ELF object (`EI_DATA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `ELFDATA2LSB`.
    Little,
    /// `ELFDATA2MSB`.
    Big,
}

impl ByteOrder {
    /// Returns the `EI_DATA` identification byte for this encoding.
    pub const fn ident(self) -> u8 {
        match self {
            ByteOrder::Little => 1,
            ByteOrder::Big => 2,
        }
    }

    /// Decodes a `u16`.
    pub fn u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }

    /// Decodes a `u32`.
    pub fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Encodes a `u32`.
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

// =============================================================================
// Region
// =============================================================================

/// A byte range inside a buffer, as start + length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    /// Offset of the first byte.
    pub start: usize,
    /// Length in bytes.
    pub len: usize,
}

impl Region {
    /// Creates a region without checking it against any buffer.
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// Creates a region, failing unless it lies inside a buffer of `total` bytes.
    pub fn within(
        start: usize,
        len: usize,
        total: usize,
        what: &'static str,
    ) -> Result<Self, LoadError> {
        match start.checked_add(len) {
            Some(end) if end <= total => Ok(Self { start, len }),
            _ => Err(LoadError::OutOfBounds(what)),
        }
    }

    /// One past the last byte, or `None` on overflow.
    pub fn end(&self) -> Option<usize> {
        self.start.checked_add(self.len)
    }

    /// Borrows the bytes of this region from `data`.
    pub fn slice<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        data.get(self.start..self.end()?)
    }

    /// Number of whole `entry_size`-byte records in the region.
    pub fn count(&self, entry_size: usize) -> usize {
        self.len.checked_div(entry_size).unwrap_or(0)
    }

    /// The region of record `index`, if the whole record fits.
    pub fn entry(&self, index: usize, entry_size: usize) -> Option<Region> {
        let offset = index.checked_mul(entry_size)?;
        if offset.checked_add(entry_size)? > self.len {
            return None;
        }
        Some(Region::new(self.start + offset, entry_size))
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Reads fixed-width fields from a byte buffer in one byte order.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    /// Wraps `data`.
    pub const fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self { data, order }
    }

    /// Length of the wrapped buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the wrapped buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows `len` bytes at `offset`.
    pub fn bytes(&self, offset: usize, len: usize, what: &'static str) -> Result<&'a [u8], LoadError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(LoadError::OutOfBounds(what))
    }

    fn array<const N: usize>(&self, offset: usize, what: &'static str) -> Result<[u8; N], LoadError> {
        self.bytes(offset, N, what)?
            .try_into()
            .map_err(|_| LoadError::OutOfBounds(what))
    }

    /// Reads a byte.
    pub fn u8(&self, offset: usize, what: &'static str) -> Result<u8, LoadError> {
        self.data.get(offset).copied().ok_or(LoadError::OutOfBounds(what))
    }

    /// Reads a `u16`.
    pub fn u16(&self, offset: usize, what: &'static str) -> Result<u16, LoadError> {
        Ok(self.order.u16(self.array(offset, what)?))
    }

    /// Reads a `u32`.
    pub fn u32(&self, offset: usize, what: &'static str) -> Result<u32, LoadError> {
        Ok(self.order.u32(self.array(offset, what)?))
    }

    /// Reads an `i32`.
    pub fn i32(&self, offset: usize, what: &'static str) -> Result<i32, LoadError> {
        Ok(self.u32(offset, what)? as i32)
    }

    /// Borrows the NUL-terminated string at `offset` inside `table`,
    /// without the terminator. The terminator must lie inside `table`.
    pub fn c_str(&self, table: Region, offset: usize) -> Option<&'a [u8]> {
        let rest = table.slice(self.data)?.get(offset..)?;
        let len = rest.iter().position(|&b| b == 0)?;
        Some(&rest[..len])
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Mutable counterpart of [`Reader`] over the destination memory.
#[derive(Debug)]
pub struct Writer<'a> {
    data: &'a mut [u8],
    order: ByteOrder,
}

impl<'a> Writer<'a> {
    /// Wraps `data`.
    pub fn new(data: &'a mut [u8], order: ByteOrder) -> Self {
        Self { data, order }
    }

    /// Length of the wrapped buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the wrapped buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A reader over the current contents.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(self.data, self.order)
    }

    fn window(&mut self, offset: usize, len: usize, what: &'static str) -> Result<&mut [u8], LoadError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get_mut(offset..end))
            .ok_or(LoadError::OutOfBounds(what))
    }

    /// Copies `src` to `offset`.
    pub fn copy_from(&mut self, offset: usize, src: &[u8], what: &'static str) -> Result<(), LoadError> {
        self.window(offset, src.len(), what)?.copy_from_slice(src);
        Ok(())
    }

    /// Zeroes `len` bytes at `offset`.
    pub fn zero(&mut self, offset: usize, len: usize, what: &'static str) -> Result<(), LoadError> {
        self.window(offset, len, what)?.fill(0);
        Ok(())
    }

    /// Stores a `u32` at `offset`.
    pub fn put_u32(&mut self, offset: usize, value: u32, what: &'static str) -> Result<(), LoadError> {
        let bytes = self.order.u32_bytes(value);
        self.copy_from(offset, &bytes, what)
    }

    /// Gives the buffer back.
    pub fn into_inner(self) -> &'a mut [u8] {
        self.data
    }
}
