//! Stripe decoder over the newline-delimited JSON payloads written by
//! `orcsplit_testkit::orc_file`.

use std::{
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use bytes::Bytes;
use orcsplit_common::{Result, error::Error};
use orcsplit_format::{StripeCatalog, StripeInformation};
use orcsplit_io::{ReadAt, SlicedFile};
use orcsplit_testkit::{data_gen, orc_file::OrcFileBuilder, orc_file::RawStripe};

use crate::{
    BoundDecoder, OrcFormatFile, ReaderOptions, StripeBatchSource, StripeDecoder,
    projection::ColumnPlan,
};

pub type PullHook = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
pub struct DecoderStats {
    pub binds: AtomicUsize,
    pub stripe_opens: AtomicUsize,
    pub pulls: AtomicUsize,
}

impl DecoderStats {
    pub fn stripe_opens(&self) -> usize {
        self.stripe_opens.load(Ordering::SeqCst)
    }

    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }
}

#[derive(Default, Clone)]
pub struct JsonStripeDecoder {
    pub stats: Arc<DecoderStats>,
    pub pull_hook: Option<PullHook>,
    pub fail_bind: bool,
}

impl JsonStripeDecoder {
    pub fn with_pull_hook(hook: PullHook) -> JsonStripeDecoder {
        JsonStripeDecoder {
            pull_hook: Some(hook),
            ..Default::default()
        }
    }
}

impl StripeDecoder for JsonStripeDecoder {
    fn bind(
        &self,
        _file: Arc<dyn ReadAt>,
        _catalog: Arc<StripeCatalog>,
        plan: &ColumnPlan,
        batch_size: usize,
    ) -> Result<Box<dyn BoundDecoder>> {
        if self.fail_bind {
            return Err(Error::open("file", "unsupported stream encoding"));
        }
        assert!(!plan.indices_to_decode.is_empty());
        self.stats.binds.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(JsonBoundDecoder {
            schema: plan.decoded_schema.clone(),
            batch_size,
            stats: self.stats.clone(),
            pull_hook: self.pull_hook.clone(),
        }))
    }
}

struct JsonBoundDecoder {
    schema: SchemaRef,
    batch_size: usize,
    stats: Arc<DecoderStats>,
    pull_hook: Option<PullHook>,
}

impl BoundDecoder for JsonBoundDecoder {
    fn open_stripe(
        &mut self,
        stripe: &StripeInformation,
        stripe_data: SlicedFile<Arc<dyn ReadAt>>,
    ) -> Result<Box<dyn StripeBatchSource>> {
        assert_eq!(stripe_data.slice_size(), stripe.length);
        assert_eq!(stripe_data.slice_range(), stripe.byte_range());
        self.stats.stripe_opens.fetch_add(1, Ordering::SeqCst);
        let payload = stripe_data
            .read_all()
            .map_err(|e| Error::io(format!("stripe {}", stripe.index), e))?;
        let reader = arrow_json::ReaderBuilder::new(self.schema.clone())
            .with_batch_size(self.batch_size)
            .build(Cursor::new(payload))
            .map_err(|e| Error::open(format!("stripe {}", stripe.index), e.to_string()))?;
        Ok(Box::new(JsonBatchSource {
            stripe_index: stripe.index,
            reader,
            stats: self.stats.clone(),
            pull_hook: self.pull_hook.clone(),
        }))
    }
}

struct JsonBatchSource {
    stripe_index: u64,
    reader: arrow_json::Reader<Cursor<Bytes>>,
    stats: Arc<DecoderStats>,
    pull_hook: Option<PullHook>,
}

impl StripeBatchSource for JsonBatchSource {
    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        self.stats.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.pull_hook {
            hook(self.stripe_index);
        }
        self.reader
            .next()
            .transpose()
            .map_err(|e| Error::arrow(format!("decode of stripe {}", self.stripe_index), e))
    }
}

/// File with `id`/`name` stripes of the given row counts; ids are the file
/// row numbers. Stripes are padded to at least `min_stripe_len` bytes.
pub fn id_name_file(stripe_rows: &[usize], min_stripe_len: usize) -> Vec<u8> {
    let mut builder = OrcFileBuilder::from_arrow_schema(&data_gen::id_name_schema()).unwrap();
    let mut next_id = 0i64;
    for &rows in stripe_rows {
        let batch = data_gen::id_name_batch(next_id, rows);
        builder.add_raw_stripe(
            RawStripe::from_batch(&batch)
                .unwrap()
                .with_min_length(min_stripe_len),
        );
        next_id += rows as i64;
    }
    builder.finish()
}

pub fn format_file(
    file: impl ReadAt,
    decoder: JsonStripeDecoder,
    options: ReaderOptions,
) -> OrcFormatFile {
    OrcFormatFile::new(Arc::new(file), Arc::new(decoder), options).unwrap()
}
