//! Split-aware reading of ORC files.
//!
//! An [`OrcFormatFile`] binds a byte stream to a stripe decoder. For each
//! byte-range split it vends a [`StripeStreamReader`] that reads only the stripes
//! starting inside the split, one stripe at a time, and reconciles the decoded
//! columns with the requested schema (column order, casts, null-filled missing
//! columns).

pub mod cancel;
pub mod decoder;
pub mod format_file;
pub mod missing_values;
pub mod options;
pub mod projection;
pub mod split;
pub mod stripe_reader;

#[cfg(test)]
mod tests;

pub use cancel::CancellationToken;
pub use decoder::{BoundDecoder, StripeBatchSource, StripeDecoder};
pub use format_file::{FormatFile, OrcFormatFile, SplitReader};
pub use missing_values::MissingValues;
pub use options::ReaderOptions;
pub use projection::{ColumnPlan, ColumnSource};
pub use split::{SplitRange, StripeSelection, TilingIssue};
pub use stripe_reader::{ReaderBatch, ReaderState, ReaderStats, StripeStreamReader};
