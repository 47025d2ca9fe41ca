//! Metadata heaps: `#Strings`, `#US`, `#Blob` and `#GUID`

use crate::writer::ByteWriter;
use rustc_hash::FxHashMap;

/// Identifier heap of NUL-terminated UTF-8 strings
#[derive(Debug)]
pub struct StringHeap {
    data: Vec<u8>,
    offsets: FxHashMap<String, u32>,
}

impl Default for StringHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl StringHeap {
    /// Heap holding only the empty string at offset 0
    pub fn new() -> Self {
        Self {
            data: vec![0],
            offsets: FxHashMap::default(),
        }
    }

    /// Offset of `text`, adding it when new; the empty string is 0
    pub fn intern(&mut self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        if let Some(&offset) = self.offsets.get(text) {
            return offset;
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(text.as_bytes());
        self.data.push(0);
        self.offsets.insert(text.to_string(), offset);
        offset
    }

    /// Stream bytes, padded to 4
    pub fn finish(&self) -> Vec<u8> {
        padded(&self.data)
    }

    /// Whether indexes need 4 bytes
    pub fn is_wide(&self) -> bool {
        self.data.len() >= 0x10000
    }
}

/// User string heap for `ldstr` literals, stored as UTF-16
#[derive(Debug)]
pub struct UserStringHeap {
    data: ByteWriter,
    offsets: FxHashMap<String, u32>,
}

impl Default for UserStringHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStringHeap {
    /// Heap with the mandatory empty entry
    pub fn new() -> Self {
        let mut data = ByteWriter::new();
        data.emit_u8(0);
        Self {
            data,
            offsets: FxHashMap::default(),
        }
    }

    /// Offset of `text`, adding it when new
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(text) {
            return offset;
        }
        let offset = self.data.offset() as u32;
        let units: Vec<u16> = text.encode_utf16().collect();
        self.data.emit_compressed_u32(units.len() as u32 * 2 + 1);
        for unit in &units {
            self.data.emit_u16(*unit);
        }
        // Terminal byte: set when any character needs more than
        // ordinary 8-bit handling
        let special = units.iter().any(|&u| {
            u > 0xFF
                || matches!(u, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D | 0x7F)
        });
        self.data.emit_u8(u8::from(special));
        self.offsets.insert(text.to_string(), offset);
        offset
    }

    /// Stream bytes, padded to 4
    pub fn finish(&self) -> Vec<u8> {
        padded(self.data.buffer())
    }
}

/// Blob heap of length-prefixed byte strings
#[derive(Debug)]
pub struct BlobHeap {
    data: ByteWriter,
    offsets: FxHashMap<Vec<u8>, u32>,
}

impl Default for BlobHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobHeap {
    /// Heap holding only the empty blob at offset 0
    pub fn new() -> Self {
        let mut data = ByteWriter::new();
        data.emit_u8(0);
        Self {
            data,
            offsets: FxHashMap::default(),
        }
    }

    /// Offset of `blob`, adding it when new; the empty blob is 0
    pub fn intern(&mut self, blob: &[u8]) -> u32 {
        if blob.is_empty() {
            return 0;
        }
        if let Some(&offset) = self.offsets.get(blob) {
            return offset;
        }
        let offset = self.data.offset() as u32;
        self.data.emit_compressed_u32(blob.len() as u32);
        self.data.emit_bytes(blob);
        self.offsets.insert(blob.to_vec(), offset);
        offset
    }

    /// Stream bytes, padded to 4
    pub fn finish(&self) -> Vec<u8> {
        padded(self.data.buffer())
    }

    /// Whether indexes need 4 bytes
    pub fn is_wide(&self) -> bool {
        self.data.offset() >= 0x10000
    }
}

/// GUID heap; indexes are 1-based
#[derive(Debug, Default)]
pub struct GuidHeap {
    guids: Vec<[u8; 16]>,
}

impl GuidHeap {
    /// Empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a GUID and return its 1-based index
    pub fn add(&mut self, guid: [u8; 16]) -> u32 {
        self.guids.push(guid);
        self.guids.len() as u32
    }

    /// Stream bytes
    pub fn finish(&self) -> Vec<u8> {
        self.guids.iter().flatten().copied().collect()
    }

    /// Whether indexes need 4 bytes
    pub fn is_wide(&self) -> bool {
        self.guids.len() >= 0x10000
    }
}

fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(crate::writer::align_up(out.len(), 4), 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_are_deduplicated() {
        let mut heap = StringHeap::new();
        let main = heap.intern("Main");
        assert_eq!(main, 1);
        assert_eq!(heap.intern("Main"), main);
        assert_eq!(heap.intern(""), 0);
        assert_eq!(heap.intern("Program"), 6);
        let bytes = heap.finish();
        assert_eq!(&bytes[..6], b"\0Main\0");
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_user_string_layout() {
        let mut heap = UserStringHeap::new();
        let offset = heap.intern("hi");
        assert_eq!(offset, 1);
        let bytes = heap.finish();
        assert_eq!(&bytes[..7], &[0x00, 0x05, b'h', 0x00, b'i', 0x00, 0x00]);
    }

    #[test]
    fn test_user_string_special_flag() {
        let mut heap = UserStringHeap::new();
        heap.intern("it's");
        let bytes = heap.finish();
        // prefix 9, four UTF-16 units, flag
        assert_eq!(bytes[1], 9);
        assert_eq!(bytes[10], 1);
    }

    #[test]
    fn test_blob_prefix() {
        let mut heap = BlobHeap::new();
        let sig = heap.intern(&[0x00, 0x00, 0x01]);
        assert_eq!(sig, 1);
        assert_eq!(heap.intern(&[0x00, 0x00, 0x01]), 1);
        assert_eq!(&heap.finish()[..5], &[0x00, 0x03, 0x00, 0x00, 0x01]);
    }
}
