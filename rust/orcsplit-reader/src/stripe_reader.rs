//! Stripe-by-stripe batch reader of one split.

use std::{fmt, iter::FusedIterator, sync::Arc};

use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions, new_null_array};
use arrow_schema::{Schema, SchemaRef};
use orcsplit_common::{Result, error::Error, try_or_ret_some_err};
use orcsplit_format::{StripeCatalog, StripeInformation};
use orcsplit_io::{ReadAt, SlicedFile};

use crate::{
    cancel::CancellationToken,
    decoder::{BoundDecoder, StripeBatchSource, StripeDecoder},
    missing_values::MissingValues,
    projection::{ColumnPlan, ColumnSource},
    split::{SplitRange, StripeSelection},
};

/// Lifecycle of a [`StripeStreamReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Created, decoder not bound yet.
    Unopened,
    /// Streaming batches.
    Ready,
    /// All selected stripes were read.
    Exhausted,
    /// Closed or cancelled; terminal.
    Closed,
    /// A stripe failed to open or decode, or the iterator failed to bind the
    /// decoder; terminal.
    Failed,
}

/// One batch of output rows.
#[derive(Debug, Clone)]
pub struct ReaderBatch {
    /// Columns in requested order.
    pub batch: RecordBatch,
    /// Synthesized cells of `batch`.
    pub missing: MissingValues,
    /// File-wide ordinal of the stripe the rows come from.
    pub stripe_index: u64,
    /// File-level row number of the first row of `batch`.
    pub row_offset: u64,
}

impl ReaderBatch {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// File-level row numbers covered by the batch.
    pub fn row_range(&self) -> std::ops::Range<u64> {
        self.row_offset..self.row_offset + self.batch.num_rows() as u64
    }
}

/// Counters of one read session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub stripes_opened: u64,
    pub batches: u64,
    pub rows: u64,
}

/// Pull-based reader of the stripes selected for one split.
///
/// Batches are produced in ascending stripe order, one stripe at a time: the
/// batch source of a stripe is dropped before the next stripe is opened, and
/// each source only sees the bytes of its own stripe. The reader is driven by a
/// single thread; other threads may only cancel it through its
/// [`CancellationToken`].
pub struct StripeStreamReader {
    file: Arc<dyn ReadAt>,
    catalog: Arc<StripeCatalog>,
    decoder: Arc<dyn StripeDecoder>,
    split: SplitRange,
    selection: StripeSelection,
    plan: ColumnPlan,
    batch_size: usize,
    state: ReaderState,
    bound: Option<Box<dyn BoundDecoder>>,
    next_stripe: usize,
    current: Option<CurrentStripe>,
    cancel: CancellationToken,
    stats: ReaderStats,
}

impl StripeStreamReader {
    pub(crate) fn new(
        file: Arc<dyn ReadAt>,
        catalog: Arc<StripeCatalog>,
        decoder: Arc<dyn StripeDecoder>,
        split: SplitRange,
        selection: StripeSelection,
        plan: ColumnPlan,
        batch_size: usize,
    ) -> StripeStreamReader {
        StripeStreamReader {
            file,
            catalog,
            decoder,
            split,
            selection,
            plan,
            batch_size,
            state: ReaderState::Unopened,
            bound: None,
            next_stripe: 0,
            current: None,
            cancel: CancellationToken::new(),
            stats: ReaderStats::default(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn split(&self) -> SplitRange {
        self.split
    }

    pub fn selection(&self) -> &StripeSelection {
        &self.selection
    }

    pub fn plan(&self) -> &ColumnPlan {
        &self.plan
    }

    /// Schema of the emitted batches.
    pub fn output_schema(&self) -> SchemaRef {
        self.plan.output_schema.clone()
    }

    pub fn catalog(&self) -> &Arc<StripeCatalog> {
        &self.catalog
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Token that cancels this reader from any thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Binds the decoder: `Unopened` to `Ready`.
    ///
    /// A plan without decoded columns never consults the decoder, so nothing is
    /// bound in that case.
    pub fn open(&mut self) -> Result<()> {
        if self.state != ReaderState::Unopened {
            return Err(Error::invalid_operation(format!(
                "open in state {:?}",
                self.state
            )));
        }
        if !self.plan.is_count_only() {
            let bound = self
                .decoder
                .bind(
                    self.file.clone(),
                    self.catalog.clone(),
                    &self.plan,
                    self.batch_size,
                )
                .inspect_err(|e| log::warn!("failed to bind stripe decoder: {e}"))?;
            self.bound = Some(bound);
        }
        self.state = ReaderState::Ready;
        log::debug!(
            "opened reader for split {}: {} of {} stripes, {} columns decoded, {} missing",
            self.split,
            self.selection.stripes.len(),
            self.selection.total_stripes,
            self.plan.indices_to_decode.len(),
            self.plan.missing_positions.len()
        );
        Ok(())
    }

    /// Returns the next batch, or `None` at the end of the stream.
    ///
    /// After cancellation the first call fails with a cancelled error and later
    /// calls return `None`. An error while opening or decoding a stripe fails
    /// the reader: later calls are invalid operations.
    pub fn next_batch(&mut self) -> Result<Option<ReaderBatch>> {
        match self.state {
            ReaderState::Failed => {
                return Err(Error::invalid_operation("next_batch on a failed reader"));
            }
            ReaderState::Closed => return Ok(None),
            _ => (),
        }
        if self.cancel.is_cancelled() {
            return self.cancelled();
        }
        match self.state {
            ReaderState::Unopened => {
                return Err(Error::invalid_operation("next_batch before open"));
            }
            ReaderState::Exhausted => return Ok(None),
            _ => (),
        }

        loop {
            if let Some(current) = self.current.as_mut() {
                match current.source.next_batch() {
                    Ok(Some(decoded)) if decoded.num_rows() == 0 => continue,
                    Ok(Some(decoded)) => {
                        let stripe = current.stripe;
                        let row_offset = stripe.start_row + current.rows_emitted;
                        current.rows_emitted += decoded.num_rows() as u64;
                        let batch = self
                            .assemble(decoded, &stripe, row_offset)
                            .map_err(|e| self.fail(&stripe, e))?;
                        return Ok(Some(batch));
                    }
                    Ok(None) => {
                        log::debug!(
                            "finished stripe {} ({} rows)",
                            current.stripe.index,
                            current.rows_emitted
                        );
                        self.current = None;
                    }
                    Err(e) => {
                        let stripe = current.stripe;
                        return Err(self.fail(&stripe, e));
                    }
                }
            }

            if self.cancel.is_cancelled() {
                return self.cancelled();
            }
            let Some(&stripe) = self.selection.stripes.get(self.next_stripe) else {
                self.state = ReaderState::Exhausted;
                log::debug!(
                    "split {} exhausted: {} batches, {} rows",
                    self.split,
                    self.stats.batches,
                    self.stats.rows
                );
                return Ok(None);
            };
            self.next_stripe += 1;
            let source = self
                .open_stripe(&stripe)
                .map_err(|e| self.fail(&stripe, e))?;
            self.current = Some(CurrentStripe {
                stripe,
                source,
                rows_emitted: 0,
            });
        }
    }

    /// Rewinds to the first selected stripe: `Ready`/`Exhausted` to `Ready`.
    pub fn reset(&mut self) -> Result<()> {
        match self.state {
            ReaderState::Ready | ReaderState::Exhausted => (),
            state => {
                return Err(Error::invalid_operation(format!("reset in state {state:?}")));
            }
        }
        self.current = None;
        self.next_stripe = 0;
        self.state = ReaderState::Ready;
        Ok(())
    }

    /// Releases the decoder and moves to `Closed`.
    pub fn close(&mut self) {
        self.release();
        self.state = ReaderState::Closed;
    }

    fn open_stripe(&mut self, stripe: &StripeInformation) -> Result<StripeSource> {
        self.stats.stripes_opened += 1;
        log::debug!(
            "opening stripe {} at {}..{} ({} rows)",
            stripe.index,
            stripe.offset,
            stripe.end_offset(),
            stripe.num_rows
        );
        match self.bound.as_mut() {
            None => Ok(StripeSource::CountOnly {
                remaining: stripe.num_rows,
                batch_size: self.batch_size as u64,
            }),
            Some(bound) => {
                let stripe_data = SlicedFile::new(self.file.clone(), stripe.byte_range());
                Ok(StripeSource::Decoded(bound.open_stripe(stripe, stripe_data)?))
            }
        }
    }

    fn assemble(
        &mut self,
        decoded: RecordBatch,
        stripe: &StripeInformation,
        row_offset: u64,
    ) -> Result<ReaderBatch> {
        let num_rows = decoded.num_rows();
        if decoded.num_columns() != self.plan.indices_to_decode.len() {
            return Err(Error::open(
                format!("stripe {}", stripe.index),
                format!(
                    "decoder produced {} columns, expected {}",
                    decoded.num_columns(),
                    self.plan.indices_to_decode.len()
                ),
            ));
        }

        let schema = &self.plan.output_schema;
        let mut columns = Vec::<ArrayRef>::with_capacity(schema.fields().len());
        for (field, source) in schema.fields().iter().zip(&self.plan.sources) {
            let column = match *source {
                ColumnSource::Decoded(pos) => {
                    let array = decoded.column(pos);
                    if array.data_type() == field.data_type() {
                        array.clone()
                    } else {
                        arrow_cast::cast(array, field.data_type())
                            .map_err(|e| Error::arrow(format!("cast of '{}'", field.name()), e))?
                    }
                }
                ColumnSource::Missing => new_null_array(field.data_type(), num_rows),
            };
            columns.push(column);
        }
        let batch = RecordBatch::try_new_with_options(
            schema.clone(),
            columns,
            &RecordBatchOptions::new()
                .with_match_field_names(false)
                .with_row_count(Some(num_rows)),
        )
        .map_err(|e| Error::arrow(format!("batch of stripe {}", stripe.index), e))?;

        self.stats.batches += 1;
        self.stats.rows += num_rows as u64;
        log::trace!(
            "batch of {num_rows} rows from stripe {} at row {row_offset}",
            stripe.index
        );
        Ok(ReaderBatch {
            batch,
            missing: MissingValues::new(
                num_rows,
                schema.fields().len(),
                &self.plan.missing_positions,
            ),
            stripe_index: stripe.index,
            row_offset,
        })
    }

    fn cancelled(&mut self) -> Result<Option<ReaderBatch>> {
        log::warn!(
            "read of split {} cancelled after {} batches",
            self.split,
            self.stats.batches
        );
        self.close();
        Err(Error::cancelled())
    }

    fn fail(&mut self, stripe: &StripeInformation, e: Error) -> Error {
        log::warn!("stripe {} of split {} failed: {e}", stripe.index, self.split);
        self.release();
        self.state = ReaderState::Failed;
        e
    }

    fn release(&mut self) {
        self.current = None;
        self.bound = None;
    }
}

impl fmt::Debug for StripeStreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeStreamReader")
            .field("split", &self.split)
            .field("stripes", &self.selection.indices())
            .field("total_stripes", &self.selection.total_stripes)
            .field("state", &self.state)
            .field("next_stripe", &self.next_stripe)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Opens the reader on the first poll. The first error ends the iteration:
/// once the reader is failed, closed or exhausted, `next` returns `None` until
/// an explicit [`StripeStreamReader::reset`].
impl Iterator for StripeStreamReader {
    type Item = Result<ReaderBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            ReaderState::Failed | ReaderState::Closed | ReaderState::Exhausted => return None,
            ReaderState::Unopened => {
                let opened = self.open().inspect_err(|_| self.state = ReaderState::Failed);
                try_or_ret_some_err!(opened);
            }
            ReaderState::Ready => (),
        }
        self.next_batch().transpose()
    }
}

impl FusedIterator for StripeStreamReader {}

struct CurrentStripe {
    stripe: StripeInformation,
    source: StripeSource,
    rows_emitted: u64,
}

enum StripeSource {
    Decoded(Box<dyn StripeBatchSource>),
    /// Row-count-only batches for plans without decoded columns.
    CountOnly { remaining: u64, batch_size: u64 },
}

impl StripeSource {
    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        match self {
            StripeSource::Decoded(source) => source.next_batch(),
            StripeSource::CountOnly {
                remaining,
                batch_size,
            } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                let rows = (*remaining).min(*batch_size);
                *remaining -= rows;
                let batch = RecordBatch::try_new_with_options(
                    Arc::new(Schema::empty()),
                    Vec::new(),
                    &RecordBatchOptions::new().with_row_count(Some(rows as usize)),
                )?;
                Ok(Some(batch))
            }
        }
    }
}
