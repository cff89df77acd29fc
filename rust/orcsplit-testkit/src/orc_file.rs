//! Writer of ORC-tailed test files.

use std::io::Write;

use arrow_array::RecordBatch;
use arrow_schema::{DataType, Schema};
use orcsplit_format::{
    DEFAULT_COMPRESSION_BLOCK_SIZE, ORC_MAGIC,
    compression::{CHUNK_HEADER_SIZE, MAX_CHUNK_LEN},
    proto::{self, CompressionKind, TypeKind},
};
use prost::Message;

/// Content of one stripe.
#[derive(Debug, Clone)]
pub struct RawStripe {
    num_rows: u64,
    payload: Vec<u8>,
    declared_length: Option<u64>,
}

impl RawStripe {
    /// Stripe with the given payload bytes and declared row count.
    pub fn new(num_rows: u64, payload: Vec<u8>) -> RawStripe {
        RawStripe {
            num_rows,
            payload,
            declared_length: None,
        }
    }

    /// Stripe of `length` blank bytes. Carries no decodable rows; useful when
    /// only the file layout matters.
    pub fn padded(num_rows: u64, length: usize) -> RawStripe {
        RawStripe::new(num_rows, vec![b' '; length])
    }

    /// Stripe whose payload isn't valid JSON.
    pub fn corrupt(num_rows: u64) -> RawStripe {
        RawStripe::new(num_rows, b"{\"id\": 1, \"name\": [broken\n".to_vec())
    }

    /// Stripe holding the rows of `batch` as newline-delimited JSON.
    pub fn from_batch(batch: &RecordBatch) -> anyhow::Result<RawStripe> {
        let mut writer = arrow_json::LineDelimitedWriter::new(Vec::new());
        writer.write(batch)?;
        writer.finish()?;
        Ok(RawStripe::new(batch.num_rows() as u64, writer.into_inner()))
    }

    /// Pads the payload with newlines up to `min_length` bytes.
    pub fn with_min_length(mut self, min_length: usize) -> RawStripe {
        if self.payload.len() < min_length {
            self.payload.resize(min_length, b'\n');
        }
        self
    }

    /// Overrides the stripe length recorded in the footer, without changing the
    /// bytes actually written.
    pub fn declared_length(mut self, length: u64) -> RawStripe {
        self.declared_length = Some(length);
        self
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Builds an in-memory ORC file: `"ORC"`, the stripes back to back, then the
/// footer, PostScript and PostScript length byte.
///
/// The footer is compressed with ZSTD or ZLIB when requested; any other codec
/// is recorded in the PostScript and the footer is stored as "original"
/// (uncompressed) chunks, which is a valid encoding for every codec.
#[derive(Debug, Clone)]
pub struct OrcFileBuilder {
    columns: Vec<(String, TypeKind)>,
    stripes: Vec<RawStripe>,
    compression: CompressionKind,
    compression_block_size: u64,
    user_metadata: Vec<(String, Vec<u8>)>,
    footer_row_count: Option<u64>,
}

impl Default for OrcFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrcFileBuilder {
    pub fn new() -> OrcFileBuilder {
        OrcFileBuilder {
            columns: Vec::new(),
            stripes: Vec::new(),
            compression: CompressionKind::None,
            compression_block_size: DEFAULT_COMPRESSION_BLOCK_SIZE,
            user_metadata: Vec::new(),
            footer_row_count: None,
        }
    }

    /// Creates a builder whose top-level columns mirror the Arrow schema.
    pub fn from_arrow_schema(schema: &Schema) -> anyhow::Result<OrcFileBuilder> {
        let mut builder = OrcFileBuilder::new();
        for field in schema.fields() {
            let kind = match field.data_type() {
                DataType::Boolean => TypeKind::Boolean,
                DataType::Int8 => TypeKind::Byte,
                DataType::Int16 => TypeKind::Short,
                DataType::Int32 => TypeKind::Int,
                DataType::Int64 => TypeKind::Long,
                DataType::Float32 => TypeKind::Float,
                DataType::Float64 => TypeKind::Double,
                DataType::Utf8 => TypeKind::String,
                DataType::Binary => TypeKind::Binary,
                DataType::Date32 => TypeKind::Date,
                other => anyhow::bail!("no ORC test mapping for {other}"),
            };
            builder = builder.column(field.name(), kind);
        }
        Ok(builder)
    }

    /// Appends a primitive top-level column.
    pub fn column(mut self, name: &str, kind: TypeKind) -> OrcFileBuilder {
        self.columns.push((name.to_string(), kind));
        self
    }

    pub fn compression(mut self, compression: CompressionKind) -> OrcFileBuilder {
        self.compression = compression;
        self
    }

    pub fn user_metadata(mut self, name: &str, value: &[u8]) -> OrcFileBuilder {
        self.user_metadata.push((name.to_string(), value.to_vec()));
        self
    }

    /// Overrides the footer's `numberOfRows` (by default the sum of stripe rows).
    pub fn footer_row_count(mut self, rows: u64) -> OrcFileBuilder {
        self.footer_row_count = Some(rows);
        self
    }

    pub fn add_raw_stripe(&mut self, stripe: RawStripe) {
        self.stripes.push(stripe);
    }

    /// Appends a stripe holding the rows of `batch`.
    pub fn add_batch(&mut self, batch: &RecordBatch) -> anyhow::Result<()> {
        self.add_raw_stripe(RawStripe::from_batch(batch)?);
        Ok(())
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Produces the file bytes.
    pub fn finish(&self) -> Vec<u8> {
        let mut file = ORC_MAGIC.to_vec();
        let mut stripes = Vec::with_capacity(self.stripes.len());
        for stripe in &self.stripes {
            let offset = file.len() as u64;
            file.extend_from_slice(&stripe.payload);
            stripes.push(proto::StripeInformation {
                offset: Some(offset),
                index_length: Some(0),
                data_length: Some(
                    stripe
                        .declared_length
                        .unwrap_or(stripe.payload.len() as u64),
                ),
                footer_length: Some(0),
                number_of_rows: Some(stripe.num_rows),
            });
        }
        let content_length = file.len() as u64 - ORC_MAGIC.len() as u64;

        let footer = proto::Footer {
            header_length: Some(ORC_MAGIC.len() as u64),
            content_length: Some(content_length),
            stripes,
            types: self.types(),
            metadata: self
                .user_metadata
                .iter()
                .map(|(name, value)| proto::UserMetadataItem {
                    name: Some(name.clone()),
                    value: Some(value.clone()),
                })
                .collect(),
            number_of_rows: Some(
                self.footer_row_count
                    .unwrap_or_else(|| self.stripes.iter().map(|s| s.num_rows).sum()),
            ),
            row_index_stride: Some(10_000),
            writer: Some(1),
        };
        let footer = compress_stream(self.compression, &footer.encode_to_vec());
        file.extend_from_slice(&footer);

        let postscript = proto::PostScript {
            footer_length: Some(footer.len() as u64),
            compression: Some(self.compression as i32),
            compression_block_size: Some(self.compression_block_size),
            version: vec![0, 12],
            metadata_length: Some(0),
            writer_version: Some(9),
            stripe_statistics_length: None,
            magic: Some("ORC".to_string()),
        }
        .encode_to_vec();
        assert!(postscript.len() <= u8::MAX as usize);
        file.extend_from_slice(&postscript);
        file.push(postscript.len() as u8);
        file
    }

    /// Writes the file to a new temporary file.
    pub fn write_temp_file(&self) -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&self.finish())?;
        file.flush()?;
        Ok(file)
    }

    fn types(&self) -> Vec<proto::Type> {
        let root = proto::Type {
            kind: Some(TypeKind::Struct as i32),
            subtypes: (1..=self.columns.len() as u32).collect(),
            field_names: self.columns.iter().map(|(name, _)| name.clone()).collect(),
            ..Default::default()
        };
        std::iter::once(root)
            .chain(self.columns.iter().map(|&(_, kind)| proto::Type {
                kind: Some(kind as i32),
                ..Default::default()
            }))
            .collect()
    }
}

/// Encodes `data` as a compressed ORC stream of the given codec.
pub fn compress_stream(kind: CompressionKind, data: &[u8]) -> Vec<u8> {
    match kind {
        CompressionKind::None => data.to_vec(),
        CompressionKind::Zstd => {
            let compressed = zstd::stream::encode_all(data, 3).expect("zstd encode");
            chunk(&compressed, false)
        }
        CompressionKind::Zlib => {
            let mut encoder =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).expect("deflate write");
            chunk(&encoder.finish().expect("deflate finish"), false)
        }
        _ => data
            .chunks(MAX_CHUNK_LEN)
            .flat_map(|part| chunk(part, true))
            .collect(),
    }
}

fn chunk(payload: &[u8], is_original: bool) -> Vec<u8> {
    assert!(payload.len() <= MAX_CHUNK_LEN);
    let header = ((payload.len() as u32) << 1) | is_original as u32;
    let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.to_le_bytes()[..CHUNK_HEADER_SIZE]);
    out.extend_from_slice(payload);
    out
}
