//! Guest memory access.

/// Accessor for the emulated console's memory.
///
/// Addresses are guest physical addresses. Slices run from `address` to the end
/// of the mapped region; `None` means the address is not backed by memory.
/// Words are stored in guest (big-endian) byte order.
pub trait GuestMemory {
    fn slice(&self, address: u32) -> Option<&[u8]>;
    fn slice_mut(&mut self, address: u32) -> Option<&mut [u8]>;

    fn read_u32(&self, address: u32) -> Option<u32> {
        let bytes = self.slice(address)?.get(..4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Returns `false` when fewer than 4 bytes are mapped at `address`.
    fn write_u32(&mut self, address: u32, value: u32) -> bool {
        match self.slice_mut(address).and_then(|s| s.get_mut(..4)) {
            Some(bytes) => {
                bytes.copy_from_slice(&value.to_be_bytes());
                true
            }
            None => false,
        }
    }
}

/// Flat RAM mapped at `base`.
#[derive(Debug, Clone)]
pub struct GuestRam {
    base: u32,
    bytes: Vec<u8>,
}

impl GuestRam {
    pub fn new(base: u32, size: usize) -> Self {
        Self { base, bytes: vec![0; size] }
    }

    pub fn from_bytes(base: u32, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copies `data` into RAM at `address`; out-of-range bytes are dropped.
    pub fn write(&mut self, address: u32, data: &[u8]) {
        if let Some(dst) = self.slice_mut(address) {
            let n = dst.len().min(data.len());
            dst[..n].copy_from_slice(&data[..n]);
        }
    }

    fn offset(&self, address: u32) -> Option<usize> {
        let off = address.checked_sub(self.base)? as usize;
        (off < self.bytes.len()).then_some(off)
    }
}

impl GuestMemory for GuestRam {
    fn slice(&self, address: u32) -> Option<&[u8]> {
        let off = self.offset(address)?;
        Some(&self.bytes[off..])
    }

    fn slice_mut(&mut self, address: u32) -> Option<&mut [u8]> {
        let off = self.offset(address)?;
        Some(&mut self.bytes[off..])
    }
}
