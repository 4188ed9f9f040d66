//! Data model shared by every pipeline stage.
//!
//! Page regions and raw rows flow out of location and extraction; logical
//! and canonical records flow out of reassembly and normalization. All types
//! serialize with serde so results can be handed to export collaborators
//! unchanged.

mod record;
mod region;
mod stats;

pub use record::{CanonicalRecord, FundInfo, FundRequest, HoldingsTable, Provenance, RawRecord};
pub use region::{Area, DocumentId, DocumentKey, ExtractionMode, PageSet, RawRow, TableRegion};
pub use stats::TableStats;
