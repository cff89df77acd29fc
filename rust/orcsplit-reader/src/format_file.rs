//! Per-file entry point for split reads.

use std::sync::{Arc, Mutex};

use arrow_schema::SchemaRef;
use orcsplit_common::{Result, error::Error};
use orcsplit_format::StripeCatalog;
use orcsplit_io::ReadAt;

use crate::{
    decoder::StripeDecoder,
    options::ReaderOptions,
    projection,
    split::{self, SplitRange, StripeSelection},
    stripe_reader::{ReaderBatch, StripeStreamReader},
};

/// Batch reader of one split, independent of the file format.
pub trait SplitReader: Iterator<Item = Result<ReaderBatch>> + Send {
    fn open(&mut self) -> Result<()>;

    fn next_batch(&mut self) -> Result<Option<ReaderBatch>>;

    fn reset(&mut self) -> Result<()>;

    fn cancel(&self);

    fn close(&mut self);

    fn output_schema(&self) -> SchemaRef;
}

/// Capabilities of a split-readable file format.
pub trait FormatFile: Send + Sync {
    /// Short format identifier, e.g. `"orc"`.
    fn file_format(&self) -> &'static str;

    /// Whether the file can be read as several independent byte-range splits.
    /// When `false`, callers read the whole file with a single reader.
    fn supports_split(&self) -> bool;

    fn create_reader(
        &self,
        split: SplitRange,
        requested: SchemaRef,
    ) -> Result<Box<dyn SplitReader>>;

    /// Row count of the whole file.
    fn total_rows(&self) -> Result<u64>;
}

#[derive(Default)]
struct CachedMetadata {
    catalog: Option<Arc<StripeCatalog>>,
    total_rows: Option<u64>,
}

/// ORC file bound to a byte stream and a stripe decoder.
///
/// The stripe catalog is parsed on first use and shared by every reader created
/// from this instance, as is the total row count. Both are computed under one
/// lock; a failed computation caches nothing, so every caller observes the same
/// failure until a computation succeeds.
pub struct OrcFormatFile {
    file: Arc<dyn ReadAt>,
    decoder: Arc<dyn StripeDecoder>,
    options: ReaderOptions,
    cache: Mutex<CachedMetadata>,
}

impl OrcFormatFile {
    pub fn new(
        file: Arc<dyn ReadAt>,
        decoder: Arc<dyn StripeDecoder>,
        options: ReaderOptions,
    ) -> Result<OrcFormatFile> {
        options.validate()?;
        Ok(OrcFormatFile {
            file,
            decoder,
            options,
            cache: Default::default(),
        })
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Returns the stripe catalog, parsing the file tail on first use.
    pub fn catalog(&self) -> Result<Arc<StripeCatalog>> {
        let mut cache = self.lock_cache()?;
        Self::establish_catalog(&mut cache, &self.file, self.options.tail_cache_size)
    }

    /// Returns the sum of the stripe row counts of the whole file.
    pub fn total_rows(&self) -> Result<u64> {
        let mut cache = self.lock_cache()?;
        if let Some(total_rows) = cache.total_rows {
            return Ok(total_rows);
        }
        let catalog =
            Self::establish_catalog(&mut cache, &self.file, self.options.tail_cache_size)?;
        let total_rows = catalog
            .stripes()
            .iter()
            .map(|stripe| stripe.num_rows)
            .sum::<u64>();
        cache.total_rows = Some(total_rows);
        Ok(total_rows)
    }

    /// Stripes selected by `split`.
    pub fn select_stripes(&self, split: SplitRange) -> Result<StripeSelection> {
        let catalog = self.catalog()?;
        Ok(split::select_stripes(catalog.stripes(), split))
    }

    /// Creates an unopened reader of `split` producing the `requested` columns.
    ///
    /// The catalog, stripe selection and column plan are computed here, so
    /// format and schema errors surface before any stripe is read.
    pub fn open_for_split(
        &self,
        split: SplitRange,
        requested: SchemaRef,
    ) -> Result<StripeStreamReader> {
        let catalog = self.catalog()?;
        let selection = split::select_stripes(catalog.stripes(), split);
        let plan = projection::project(catalog.schema(), &requested, &self.options)?;
        if !plan.missing_positions.is_empty() {
            log::warn!(
                "columns {:?} are not in the file; reading them as nulls",
                plan.missing_names()
            );
        }
        Ok(StripeStreamReader::new(
            self.file.clone(),
            catalog,
            self.decoder.clone(),
            split,
            selection,
            plan,
            self.options.batch_size,
        ))
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, CachedMetadata>> {
        self.cache
            .lock()
            .map_err(|_| Error::invalid_operation("metadata cache lock poisoned"))
    }

    fn establish_catalog(
        cache: &mut CachedMetadata,
        file: &Arc<dyn ReadAt>,
        tail_cache_size: u64,
    ) -> Result<Arc<StripeCatalog>> {
        if let Some(catalog) = cache.catalog.as_ref() {
            return Ok(catalog.clone());
        }
        let catalog = Arc::new(
            StripeCatalog::parse_with_tail_cache(file, tail_cache_size)
                .inspect_err(|e| log::warn!("failed to parse ORC file tail: {e}"))?,
        );
        cache.catalog = Some(catalog.clone());
        Ok(catalog)
    }
}

impl FormatFile for OrcFormatFile {
    fn file_format(&self) -> &'static str {
        "orc"
    }

    fn supports_split(&self) -> bool {
        true
    }

    fn create_reader(
        &self,
        split: SplitRange,
        requested: SchemaRef,
    ) -> Result<Box<dyn SplitReader>> {
        Ok(Box::new(self.open_for_split(split, requested)?))
    }

    fn total_rows(&self) -> Result<u64> {
        OrcFormatFile::total_rows(self)
    }
}

impl SplitReader for StripeStreamReader {
    fn open(&mut self) -> Result<()> {
        StripeStreamReader::open(self)
    }

    fn next_batch(&mut self) -> Result<Option<ReaderBatch>> {
        StripeStreamReader::next_batch(self)
    }

    fn reset(&mut self) -> Result<()> {
        StripeStreamReader::reset(self)
    }

    fn cancel(&self) {
        StripeStreamReader::cancel(self)
    }

    fn close(&mut self) {
        StripeStreamReader::close(self)
    }

    fn output_schema(&self) -> SchemaRef {
        StripeStreamReader::output_schema(self)
    }
}
