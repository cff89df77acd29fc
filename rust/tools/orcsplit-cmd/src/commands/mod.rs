//! Command implementations for orcsplit-cmd

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use orcsplit_common::error::Error;
use orcsplit_format::StripeCatalog;
use orcsplit_io::{FileReader, ReadAt};
use orcsplit_reader::{
    BoundDecoder, OrcFormatFile, ReaderOptions, StripeDecoder, projection::ColumnPlan,
};

use crate::utils::validate_file_exists;

pub mod count;
pub mod inspect;
pub mod splits;

/// Loads reader options from a JSON file, or returns the defaults.
pub fn load_options(config: Option<&Path>) -> Result<ReaderOptions> {
    let Some(path) = config else {
        return Ok(ReaderOptions::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let options: ReaderOptions = serde_json::from_str(&json)
        .with_context(|| format!("Invalid reader options in {}", path.display()))?;
    options.validate()?;
    log::debug!("reader options: {options:?}");
    Ok(options)
}

/// Opens an ORC file for metadata-only access.
pub fn open_format_file(path: &str, options: ReaderOptions) -> Result<OrcFormatFile> {
    validate_file_exists(path)?;
    let reader = FileReader::open(path).with_context(|| format!("Failed to open {path}"))?;
    Ok(OrcFormatFile::new(
        Arc::new(reader),
        Arc::new(MetadataOnlyDecoder),
        options,
    )?)
}

/// The commands only read stripe metadata and row counts, which never
/// requires decoding stripe contents.
struct MetadataOnlyDecoder;

impl StripeDecoder for MetadataOnlyDecoder {
    fn bind(
        &self,
        _file: Arc<dyn ReadAt>,
        _catalog: Arc<StripeCatalog>,
        _plan: &ColumnPlan,
        _batch_size: usize,
    ) -> orcsplit_common::Result<Box<dyn BoundDecoder>> {
        Err(Error::not_implemented("stripe decoding in orcsplit-cmd"))
    }
}

/// Writes a temp file of `id`/`name` stripes with the given row counts.
#[cfg(test)]
pub(crate) fn write_test_file(stripe_rows: &[usize]) -> tempfile::NamedTempFile {
    use orcsplit_testkit::{data_gen, orc_file::OrcFileBuilder};

    let mut builder = OrcFileBuilder::from_arrow_schema(&data_gen::id_name_schema()).unwrap();
    let mut first_id = 0;
    for &rows in stripe_rows {
        builder
            .add_batch(&data_gen::id_name_batch(first_id, rows))
            .unwrap();
        first_id += rows as i64;
    }
    builder.write_temp_file().unwrap()
}
