//! Stripe catalog: the file-level metadata needed to plan split reads.

use std::{ops::Range, sync::Arc};

use bytes::Bytes;
use orcsplit_common::{Result, error::Error, verify_data};
use orcsplit_io::{PrecachedReadAt, ReadAt};
use prost::Message;

use crate::{
    DEFAULT_TAIL_CACHE_SIZE, ORC_MAGIC, POSTSCRIPT_LEN_SIZE,
    compression::CompressionCodec,
    proto::{self, CompressionKind},
    schema::FileSchema,
};

/// Location and size of a single stripe.
///
/// `index` is the stripe's ordinal within the whole file, regardless of which
/// stripes a given split selects; `start_row` is the file-level position of the
/// stripe's first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StripeInformation {
    pub index: u64,
    pub offset: u64,
    pub length: u64,
    pub num_rows: u64,
    pub start_row: u64,
}

impl StripeInformation {
    /// Byte range of the stripe within the file.
    pub fn byte_range(&self) -> Range<u64> {
        self.offset..self.end_offset()
    }

    pub fn end_offset(&self) -> u64 {
        self.offset + self.length
    }

    /// File-level row positions covered by the stripe.
    pub fn row_range(&self) -> Range<u64> {
        self.start_row..self.start_row + self.num_rows
    }
}

/// Parsed file tail.
///
/// Immutable once parsed; the result is deterministic for a given file and
/// can be shared between any number of readers of that file.
#[derive(Debug, Clone)]
pub struct StripeCatalog {
    stripes: Vec<StripeInformation>,
    schema: FileSchema,
    file_size: u64,
    footer_range: Range<u64>,
    compression: CompressionCodec,
    writer_version: Option<u32>,
    format_version: Vec<u32>,
    row_index_stride: Option<u32>,
    user_metadata: Vec<(String, Bytes)>,
    total_rows: u64,
}

impl StripeCatalog {
    /// Parses the tail of the file, pre-fetching the default suffix size.
    pub fn parse(reader: &Arc<dyn ReadAt>) -> Result<StripeCatalog> {
        Self::parse_with_tail_cache(reader, DEFAULT_TAIL_CACHE_SIZE)
    }

    /// Parses the tail of the file.
    ///
    /// One read of the last `tail_cache_size` bytes is issued; a second read is
    /// needed only when the footer doesn't fit into that suffix. `ReadAt` is
    /// positional, so no stream position is left behind for other users of
    /// `reader`.
    ///
    /// # Errors
    ///
    /// Returns a format error when the file is truncated or the tail is
    /// unreadable or internally inconsistent.
    pub fn parse_with_tail_cache(
        reader: &Arc<dyn ReadAt>,
        tail_cache_size: u64,
    ) -> Result<StripeCatalog> {
        let tail = PrecachedReadAt::from_suffix(reader.clone(), tail_cache_size.max(256))
            .map_err(|e| Error::io("file tail", e))?;
        let file_size = tail.object_size();
        verify_data!(
            "minimal file size",
            file_size > ORC_MAGIC.len() as u64 + POSTSCRIPT_LEN_SIZE
        );

        let ps_len = read_exact(&tail, file_size - 1..file_size, "postscript length")?[0] as u64;
        verify_data!("postscript length", ps_len > 0);
        verify_data!(
            "postscript length",
            ps_len + POSTSCRIPT_LEN_SIZE + (ORC_MAGIC.len() as u64) < file_size
        );
        let ps_start = file_size - POSTSCRIPT_LEN_SIZE - ps_len;
        let ps_bytes = read_exact(&tail, ps_start..file_size - 1, "postscript")?;
        let postscript = decode_message::<proto::PostScript>(ps_bytes, "postscript")?;
        verify_data!(
            "postscript magic",
            postscript.magic.as_deref().map(str::as_bytes) == Some(ORC_MAGIC.as_slice())
        );

        let compression_kind = postscript.compression.unwrap_or_default();
        let compression_kind = CompressionKind::try_from(compression_kind).map_err(|_| {
            Error::invalid_format(
                "compression",
                format!("unsupported codec {compression_kind}"),
            )
        })?;
        let compression =
            CompressionCodec::new(compression_kind, postscript.compression_block_size)?;

        let footer_len = postscript.footer_length.unwrap_or_default();
        let metadata_len = postscript.metadata_length.unwrap_or_default();
        verify_data!("footer length", footer_len > 0);
        let tail_len = footer_len
            .checked_add(metadata_len)
            .ok_or_else(|| Error::invalid_format("footer length", "overflow"))?;
        verify_data!(
            "footer length",
            tail_len <= ps_start - ORC_MAGIC.len() as u64
        );
        let footer_start = ps_start - footer_len;
        let data_end = footer_start - metadata_len;

        if footer_start < tail.precached_range().start {
            log::debug!(
                "ORC footer ({footer_len} bytes) exceeds the {} bytes tail cache",
                tail.precached_range().end - tail.precached_range().start
            );
        }
        let footer_bytes = read_exact(&tail, footer_start..ps_start, "footer")?;
        let footer_bytes = compression.decompress(&footer_bytes)?;
        let footer = decode_message::<proto::Footer>(footer_bytes, "footer")?;

        let stripes = build_stripes(&footer.stripes, data_end)?;
        let total_rows = stripes
            .last()
            .map(|stripe| stripe.start_row + stripe.num_rows)
            .unwrap_or(0);
        if let Some(footer_rows) = footer.number_of_rows {
            if footer_rows != total_rows {
                return Err(Error::invalid_format(
                    "footer row count",
                    format!("footer declares {footer_rows} rows, stripes hold {total_rows}"),
                ));
            }
        }

        let schema = FileSchema::from_types(&footer.types)?;
        let user_metadata = footer
            .metadata
            .into_iter()
            .map(|item| {
                (
                    item.name.unwrap_or_default(),
                    Bytes::from(item.value.unwrap_or_default()),
                )
            })
            .collect();

        log::debug!(
            "parsed ORC tail: {} stripes, {} rows, {} columns, compression {}",
            stripes.len(),
            total_rows,
            schema.len(),
            compression.kind().name()
        );

        Ok(StripeCatalog {
            stripes,
            schema,
            file_size,
            footer_range: footer_start..ps_start,
            compression,
            writer_version: postscript.writer_version,
            format_version: postscript.version,
            row_index_stride: footer.row_index_stride,
            user_metadata,
            total_rows,
        })
    }

    /// All stripes of the file in offset order.
    pub fn stripes(&self) -> &[StripeInformation] {
        &self.stripes
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Sum of the row counts of all stripes.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Byte range of the (possibly compressed) footer.
    pub fn footer_range(&self) -> Range<u64> {
        self.footer_range.clone()
    }

    pub fn compression(&self) -> &CompressionCodec {
        &self.compression
    }

    pub fn writer_version(&self) -> Option<u32> {
        self.writer_version
    }

    /// File format version as `[major, minor]`, empty for very old files.
    pub fn format_version(&self) -> &[u32] {
        &self.format_version
    }

    pub fn row_index_stride(&self) -> Option<u32> {
        self.row_index_stride
    }

    pub fn user_metadata(&self) -> &[(String, Bytes)] {
        &self.user_metadata
    }
}

fn read_exact<R: ReadAt>(reader: &R, range: Range<u64>, element: &str) -> Result<Bytes> {
    let expected = range.end - range.start;
    let bytes = reader
        .read_at(range)
        .map_err(|e| Error::io(element.to_string(), e))?;
    if bytes.len() as u64 != expected {
        return Err(Error::invalid_format(
            element,
            format!("truncated: expected {expected} bytes, got {}", bytes.len()),
        ));
    }
    Ok(bytes)
}

fn decode_message<M>(bytes: Bytes, element: &str) -> Result<M>
where
    M: Message + Default,
{
    M::decode(bytes).map_err(|e| Error::invalid_format(element, e.to_string()))
}

fn build_stripes(stripes: &[proto::StripeInformation], data_end: u64) -> Result<Vec<StripeInformation>> {
    let mut result = Vec::<StripeInformation>::with_capacity(stripes.len());
    let mut next_row = 0u64;
    let mut min_offset = ORC_MAGIC.len() as u64;
    for (index, stripe) in stripes.iter().enumerate() {
        let offset = stripe.offset.unwrap_or_default();
        let length = [stripe.index_length, stripe.data_length, stripe.footer_length]
            .into_iter()
            .try_fold(0u64, |acc, len| acc.checked_add(len.unwrap_or_default()))
            .ok_or_else(|| Error::invalid_format("stripe length", "overflow"))?;
        let num_rows = stripe.number_of_rows.unwrap_or_default();
        let end = offset
            .checked_add(length)
            .ok_or_else(|| Error::invalid_format("stripe offset", "overflow"))?;

        if offset < min_offset || end > data_end {
            return Err(Error::invalid_format(
                "stripe layout",
                format!(
                    "stripe {index} at {offset}..{end} is out of order, overlapping \
                     or outside of the data area ..{data_end}"
                ),
            ));
        }

        result.push(StripeInformation {
            index: index as u64,
            offset,
            length,
            num_rows,
            start_row: next_row,
        });
        next_row = next_row
            .checked_add(num_rows)
            .ok_or_else(|| Error::invalid_format("stripe row count", "overflow"))?;
        min_offset = end;
    }
    Ok(result)
}
