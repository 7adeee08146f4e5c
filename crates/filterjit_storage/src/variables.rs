//! The scalar variable table.

/// Width of one variable slot.
const SLOT: usize = 8;

/// Flat table of 8-byte variable slots.
///
/// Narrow values occupy the low bytes of their slot; the rest stays zero.
/// Setting a slot past the end grows the table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Variables {
    bytes: Vec<u8>,
}

impl Variables {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / SLOT
    }

    /// Returns true if there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw table.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn write(&mut self, index: usize, le: &[u8]) {
        let start = index * SLOT;
        if self.bytes.len() < start + SLOT {
            self.bytes.resize(start + SLOT, 0);
        }
        let slot = &mut self.bytes[start..start + SLOT];
        slot.fill(0);
        slot[..le.len()].copy_from_slice(le);
    }

    /// Stores an `i8` in slot `index`.
    pub fn set_i8(&mut self, index: usize, value: i8) {
        self.write(index, &value.to_le_bytes());
    }

    /// Stores an `i16` in slot `index`.
    pub fn set_i16(&mut self, index: usize, value: i16) {
        self.write(index, &value.to_le_bytes());
    }

    /// Stores an `i32` in slot `index`.
    pub fn set_i32(&mut self, index: usize, value: i32) {
        self.write(index, &value.to_le_bytes());
    }

    /// Stores an `i64` in slot `index`.
    pub fn set_i64(&mut self, index: usize, value: i64) {
        self.write(index, &value.to_le_bytes());
    }

    /// Stores an `f32` in slot `index`.
    pub fn set_f32(&mut self, index: usize, value: f32) {
        self.write(index, &value.to_le_bytes());
    }

    /// Stores an `f64` in slot `index`.
    pub fn set_f64(&mut self, index: usize, value: f64) {
        self.write(index, &value.to_le_bytes());
    }
}
