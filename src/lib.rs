//! Statistical disclosure control for published aggregate counts.
//!
//! Weekly counts tables are merged into coarser buckets, small cells are
//! redacted (with complementary suppression so they cannot be recovered from
//! group totals), survivors are rounded, and percentages are derived only
//! from publishable values. See [`pipeline::publish`].

pub mod cli;
pub mod error;
pub mod inference;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod privacy;
pub mod readers;
pub mod table;
pub mod types;

pub use error::Error;
pub use pipeline::{publish, Publication};
pub use table::{CountRow, CountsTable, PopulationSizes};
pub use types::{Cell, Denominator, RedactionStrategy, Result, SdcConfig};
