//! Decoding of ORC compressed streams.
//!
//! Every compressed ORC stream (including the footer) is a sequence of chunks,
//! each preceded by a 3-byte little-endian header `(chunk_len << 1) | is_original`.
//! Original chunks are stored verbatim; the others hold one compressed block of at
//! most `compression_block_size` decompressed bytes.

use std::io::Read;

use bytes::Bytes;
use orcsplit_common::{Result, error::Error, verify_data};

use crate::{DEFAULT_COMPRESSION_BLOCK_SIZE, proto::CompressionKind};

/// Size of the header that precedes every chunk of a compressed stream.
pub const CHUNK_HEADER_SIZE: usize = 3;

/// Largest chunk length expressible in the 23 bits of a chunk header.
pub const MAX_CHUNK_LEN: usize = (1 << 23) - 1;

/// Stream decompressor for a single codec.
#[derive(Debug, Clone, Copy)]
pub struct CompressionCodec {
    kind: CompressionKind,
    block_size: u64,
}

impl CompressionCodec {
    /// Creates a codec for the given kind.
    ///
    /// Fails with a format error for codecs this reader cannot decode (LZO).
    pub fn new(kind: CompressionKind, block_size: Option<u64>) -> Result<CompressionCodec> {
        if kind == CompressionKind::Lzo {
            return Err(Error::invalid_format(
                "compression",
                "unsupported codec LZO",
            ));
        }
        let block_size = block_size
            .filter(|&size| size != 0)
            .unwrap_or(DEFAULT_COMPRESSION_BLOCK_SIZE);
        verify_data!("compression block size", block_size <= i32::MAX as u64);
        Ok(CompressionCodec { kind, block_size })
    }

    pub fn kind(&self) -> CompressionKind {
        self.kind
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Decompresses a complete stream.
    pub fn decompress(&self, input: &Bytes) -> Result<Bytes> {
        if self.kind == CompressionKind::None {
            return Ok(input.clone());
        }

        let mut output = Vec::with_capacity(input.len() * 2);
        let mut pos = 0usize;
        while pos < input.len() {
            verify_data!(
                "compression chunk header",
                pos + CHUNK_HEADER_SIZE <= input.len()
            );
            let header = u32::from(input[pos])
                | (u32::from(input[pos + 1]) << 8)
                | (u32::from(input[pos + 2]) << 16);
            pos += CHUNK_HEADER_SIZE;

            let is_original = header & 1 == 1;
            let chunk_len = (header >> 1) as usize;
            verify_data!("compression chunk length", pos + chunk_len <= input.len());
            let chunk = &input[pos..pos + chunk_len];
            pos += chunk_len;

            if is_original {
                output.extend_from_slice(chunk);
            } else {
                self.decompress_chunk(chunk, &mut output)?;
            }
        }
        Ok(output.into())
    }

    fn decompress_chunk(&self, chunk: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let start_len = output.len();
        // Streaming decoders stop one byte past the block size, enough to detect
        // an oversized chunk without inflating all of it.
        let limit = self.block_size + 1;
        match self.kind {
            CompressionKind::None => output.extend_from_slice(chunk),
            CompressionKind::Zlib => {
                flate2::read::DeflateDecoder::new(chunk)
                    .take(limit)
                    .read_to_end(output)
                    .map_err(|e| Error::io("Failed to decompress ZLIB chunk", e))?;
            }
            CompressionKind::Snappy => {
                let len = snap::raw::decompress_len(chunk)
                    .map_err(|e| Error::invalid_format("SNAPPY chunk", e.to_string()))?;
                verify_data!("decompressed chunk size", len as u64 <= self.block_size);
                let decoded = snap::raw::Decoder::new()
                    .decompress_vec(chunk)
                    .map_err(|e| Error::invalid_format("SNAPPY chunk", e.to_string()))?;
                output.extend_from_slice(&decoded);
            }
            CompressionKind::Lz4 => {
                let decoded = lz4::block::decompress(chunk, Some(self.block_size as i32))
                    .map_err(|e| Error::io("Failed to decompress LZ4 chunk", e))?;
                output.extend_from_slice(&decoded);
            }
            CompressionKind::Zstd => {
                zstd::stream::read::Decoder::new(chunk)
                    .map_err(|e| Error::io("Failed to create ZSTD decoder", e))?
                    .take(limit)
                    .read_to_end(output)
                    .map_err(|e| Error::io("Failed to decompress ZSTD chunk", e))?;
            }
            CompressionKind::Lzo => {
                return Err(Error::invalid_format("compression", "unsupported codec LZO"));
            }
        }
        verify_data!(
            "decompressed chunk size",
            (output.len() - start_len) as u64 <= self.block_size
        );
        Ok(())
    }
}
