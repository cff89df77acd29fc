//! ORC file tail access.
//!
//! Parses the PostScript and Footer found at the end of an ORC file into a
//! [`StripeCatalog`]: the ordered stripe list with cumulative row positions,
//! the top-level file schema and a few file-level properties. Stripe contents
//! are never touched here.

pub mod catalog;
pub mod compression;
pub mod proto;
pub mod schema;

pub use catalog::{StripeCatalog, StripeInformation};
pub use compression::CompressionCodec;
pub use proto::{CompressionKind, TypeKind};
pub use schema::{FileColumn, FileSchema};

/// Magic bytes at the start of every ORC file and in the PostScript.
pub const ORC_MAGIC: &[u8; 3] = b"ORC";

/// The PostScript length is stored in the single last byte of the file.
pub const POSTSCRIPT_LEN_SIZE: u64 = 1;

/// Default size of the file suffix fetched up front when parsing the tail.
pub const DEFAULT_TAIL_CACHE_SIZE: u64 = 16 * 1024;

/// Compression block size assumed when the PostScript doesn't declare one.
pub const DEFAULT_COMPRESSION_BLOCK_SIZE: u64 = 256 * 1024;
