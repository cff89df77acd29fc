//! Seam to the stripe decode library.
//!
//! The reader never interprets stripe contents. A [`StripeDecoder`] is bound once
//! per read session to the file and the column plan, and then opens one
//! [`StripeBatchSource`] per selected stripe over a view of the file that ends
//! exactly at the stripe boundaries.

use std::sync::Arc;

use arrow_array::RecordBatch;
use orcsplit_common::Result;
use orcsplit_format::{StripeCatalog, StripeInformation};
use orcsplit_io::{ReadAt, SlicedFile};

use crate::projection::ColumnPlan;

/// Factory of decode sessions; shared by all readers of a file.
pub trait StripeDecoder: Send + Sync + 'static {
    /// Binds the decoder to `file` for the columns in `plan.indices_to_decode`.
    ///
    /// Fails with an open error when the file cannot be decoded at all, e.g.
    /// because of an unsupported stream encoding.
    fn bind(
        &self,
        file: Arc<dyn ReadAt>,
        catalog: Arc<StripeCatalog>,
        plan: &ColumnPlan,
        batch_size: usize,
    ) -> Result<Box<dyn BoundDecoder>>;
}

/// Decode session of one reader.
pub trait BoundDecoder: Send {
    /// Opens a batch source over one stripe.
    ///
    /// `stripe_data` covers exactly `stripe.byte_range()`: position `0` of the
    /// slice is the first byte of the stripe.
    fn open_stripe(
        &mut self,
        stripe: &StripeInformation,
        stripe_data: SlicedFile<Arc<dyn ReadAt>>,
    ) -> Result<Box<dyn StripeBatchSource>>;
}

/// Batches decoded from one stripe, in the stripe's row order.
pub trait StripeBatchSource: Send {
    /// Returns the next batch, `None` when the stripe is exhausted.
    ///
    /// Columns follow the plan's `indices_to_decode` (the plan's
    /// `decoded_schema`); column names and nullability are not relied upon.
    fn next_batch(&mut self) -> Result<Option<RecordBatch>>;
}
