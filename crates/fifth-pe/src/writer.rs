//! Little-endian byte buffer with patching and alignment helpers

/// Growable output buffer
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a writer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Current length
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Basic Emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a signed byte
    pub fn emit_i8(&mut self, value: i8) {
        self.buffer.push(value as u8);
    }

    /// Emit a 16-bit unsigned integer
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit unsigned integer
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit signed integer
    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit unsigned integer
    pub fn emit_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit signed integer
    pub fn emit_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit float
    pub fn emit_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit float
    pub fn emit_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit raw bytes
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a heap or table index in 2 or 4 bytes
    pub fn emit_index(&mut self, value: u32, wide: bool) {
        if wide {
            self.emit_u32(value);
        } else {
            self.emit_u16(value as u16);
        }
    }

    /// Emit an unsigned integer in the compressed signature encoding
    /// (1, 2 or 4 bytes, big-endian)
    pub fn emit_compressed_u32(&mut self, value: u32) {
        if value < 0x80 {
            self.emit_u8(value as u8);
        } else if value < 0x4000 {
            self.emit_bytes(&(0x8000 | value as u16).to_be_bytes());
        } else {
            self.emit_bytes(&(0xC000_0000 | value).to_be_bytes());
        }
    }

    // ===== Layout =====

    /// Pad with zeros to a multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        let len = align_up(self.buffer.len(), alignment);
        self.buffer.resize(len, 0);
    }

    /// Pad with zeros up to `len`
    pub fn pad_to(&mut self, len: usize) {
        if self.buffer.len() < len {
            self.buffer.resize(len, 0);
        }
    }

    /// Overwrite four bytes at `at`
    pub fn patch_u32(&mut self, at: usize, value: u32) {
        self.buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Overwrite four bytes at `at` with a signed value
    pub fn patch_i32(&mut self, at: usize, value: i32) {
        self.buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Round `value` up to a multiple of `alignment`
pub fn align_up(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_integers() {
        let mut w = ByteWriter::new();
        w.emit_compressed_u32(0x03);
        w.emit_compressed_u32(0x80);
        w.emit_compressed_u32(0x2E57);
        w.emit_compressed_u32(0x4000);
        assert_eq!(
            w.buffer(),
            &[0x03, 0x80, 0x80, 0xAE, 0x57, 0xC0, 0x00, 0x40, 0x00]
        );
    }

    #[test]
    fn test_alignment_and_patching() {
        let mut w = ByteWriter::new();
        w.emit_u8(1);
        w.align(4);
        assert_eq!(w.offset(), 4);
        w.emit_u32(0);
        w.patch_u32(4, 0xDEAD_BEEF);
        assert_eq!(&w.buffer()[4..8], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(align_up(0x201, 0x200), 0x400);
        assert_eq!(align_up(0x200, 0x200), 0x200);
    }
}
