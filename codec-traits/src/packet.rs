use alloc::vec::Vec;

/// One unit of compressed output.
///
/// A session owns a single packet slot and the backend overwrites it on
/// every successful drain, so a borrow of the slot is only valid until the
/// next session call. Clone the payload before releasing the borrow if it
/// must outlive the slot.
#[derive(Clone, Debug, Default)]
pub struct PacketBuffer {
    pub data: Vec<u8>,
    pub pts: i64,
    /// True if the packet begins an independently decodable unit.
    pub key: bool,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidates the slot contents ahead of reuse, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.pts = 0;
        self.key = false;
    }
}
