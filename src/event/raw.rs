/// A "raw" implementation-specific event, identified by its event select
/// code and unit mask as listed in the vendor's PMU reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Raw {
    /// Event select code, up to 12 bits.
    pub code: u16,
    /// Unit mask.
    pub unit_mask: u8,
}

impl Raw {
    pub const fn new(code: u16, unit_mask: u8) -> Self {
        Self { code, unit_mask }
    }

    /// The `perf_event_attr::config` value.
    ///
    /// Event select bits 7:0 go to config bits 7:0, the unit mask to 15:8
    /// and event select bits 11:8 to 35:32.
    pub const fn config(&self) -> u64 {
        let code = self.code as u64;
        ((code & 0xf00) << 24) | ((self.unit_mask as u64) << 8) | (code & 0xff)
    }
}
