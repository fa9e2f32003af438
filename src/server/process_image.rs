//! In-memory process image backing the holding registers.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Holding-register bank for one server context.
///
/// Registers that were never written read as zero, like a freshly powered
/// device. Interior mutability so connection handlers can share one image
/// behind an `Arc`.
#[derive(Debug, Default)]
pub struct ProcessImage {
    holding: RwLock<HashMap<u16, u16>>,
}

impl ProcessImage {
    /// Create an empty process image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `quantity` holding registers starting at `address`.
    ///
    /// The caller validates that the range fits the address space.
    #[must_use]
    pub fn read_holding(&self, address: u16, quantity: u16) -> Vec<u16> {
        let holding = self.holding.read();
        (0..quantity)
            .map(|offset| holding.get(&(address + offset)).copied().unwrap_or(0))
            .collect()
    }

    /// Write one holding register.
    pub fn write_holding(&self, address: u16, value: u16) {
        self.holding.write().insert(address, value);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_registers_read_as_zero() {
        let image = ProcessImage::new();
        assert_eq!(image.read_holding(100, 3), vec![0, 0, 0]);
    }

    #[test]
    fn written_value_reads_back() {
        let image = ProcessImage::new();
        image.write_holding(42, 0xbeef);
        assert_eq!(image.read_holding(42, 1), vec![0xbeef]);
    }

    #[test]
    fn reads_span_written_and_unwritten_registers() {
        let image = ProcessImage::new();
        image.write_holding(11, 7);
        assert_eq!(image.read_holding(10, 3), vec![0, 7, 0]);
    }

    #[test]
    fn rewrite_overwrites() {
        let image = ProcessImage::new();
        image.write_holding(5, 1);
        image.write_holding(5, 2);
        assert_eq!(image.read_holding(5, 1), vec![2]);
    }
}
