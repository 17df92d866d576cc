
pub mod raw;

use std::ops::Deref;

use arrayvec::ArrayVec;
pub use raw::Raw;

use crate::config::Priv;
use crate::error::{Error, Result};

/// Upper bound on catalog size, and so on the number of count columns in a row.
pub const MAX_EVENTS: usize = 8;

/// Column name of the leading timestamp field in every row.
pub const TIMESTAMP_COLUMN: &str = "Timestamp(ms)";

/// What one counter column measures.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventDefinition {
    pub raw: Raw,
    pub exclude: Priv,
    pub column: String,
}

impl EventDefinition {
    pub fn new(code: u16, unit_mask: u8, column: impl Into<String>) -> Self {
        Self {
            raw: Raw::new(code, unit_mask),
            exclude: Priv::default(),
            column: column.into(),
        }
    }
}

/// Ordered, fixed list of events.
///
/// The order is the column order of every row written to the sink, so a
/// catalog is never mutated once monitoring starts.
#[derive(Clone, Debug, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<EventDefinition>", into = "Vec<EventDefinition>")
)]
pub struct Catalog {
    events: ArrayVec<EventDefinition, MAX_EVENTS>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, def: EventDefinition) -> Result<()> {
        if def.column.is_empty() || def.column.contains([',', '\n', '\r']) {
            return Err(Error::Catalog(format!(
                "column name {:?} cannot be written as a csv field",
                def.column
            )));
        }
        if self.events.iter().any(|it| it.column == def.column) {
            return Err(Error::Catalog(format!("duplicate column {:?}", def.column)));
        }
        self.events
            .try_push(def)
            .map_err(|_| Error::Catalog(format!("more than {} events", MAX_EVENTS)))
    }

    /// Column names in row order, excluding the timestamp.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|it| it.column.as_str())
    }

    /// The sink header line, without the trailing newline.
    pub fn header(&self) -> String {
        let mut header = String::from(TIMESTAMP_COLUMN);
        for column in self.columns() {
            header.push(',');
            header.push_str(column);
        }
        header
    }

    /// AMD Zen load/store events used to spot cache and TLB probing.
    pub fn reference() -> Self {
        let mut catalog = Self::new();
        let defs = [
            // ls_l1_d_tlb_miss.all
            EventDefinition::new(0x45, 0xff, "L1 DTLB Misses"),
            // ls_tablewalker.dside
            EventDefinition::new(0x46, 0x03, "Tablewalker D-side"),
            // ls_inef_sw_pref.data_pipe_sw_pf_dc_hit
            EventDefinition::new(0x52, 0x01, "Software Prefetch DC Hit"),
            // ls_mab_alloc.stores
            EventDefinition::new(0x41, 0x02, "LS MAB Alloc Stores"),
            // ls_dc_accesses
            EventDefinition::new(0x40, 0x01, "LS DC Accesses"),
        ];
        for def in defs {
            // Names are distinct, csv-safe and fewer than `MAX_EVENTS`.
            catalog.events.push(def);
        }
        catalog
    }
}

impl Deref for Catalog {
    type Target = [EventDefinition];

    fn deref(&self) -> &Self::Target {
        &self.events
    }
}

impl TryFrom<Vec<EventDefinition>> for Catalog {
    type Error = Error;

    fn try_from(defs: Vec<EventDefinition>) -> Result<Self> {
        let mut catalog = Self::new();
        for def in defs {
            catalog.push(def)?;
        }
        Ok(catalog)
    }
}

impl From<Catalog> for Vec<EventDefinition> {
    fn from(catalog: Catalog) -> Self {
        catalog.events.into_iter().collect()
    }
}
