//! Count command implementation

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_schema::Schema;
use orcsplit_reader::{OrcFormatFile, ReaderOptions, SplitRange};

use crate::commands::open_format_file;

pub fn run(file: String, start: u64, length: Option<u64>, options: ReaderOptions) -> Result<()> {
    let format_file = open_format_file(&file, options)?;
    let file_size = format_file.catalog()?.file_size();
    let split = SplitRange::new(
        start,
        length.unwrap_or_else(|| file_size.saturating_sub(start)),
    );
    let rows = count_rows(&format_file, split)?;
    println!("{rows}");
    Ok(())
}

/// Reads `split` without decoding any column and returns its row count.
fn count_rows(format_file: &OrcFormatFile, split: SplitRange) -> Result<u64> {
    let mut reader = format_file
        .open_for_split(split, Arc::new(Schema::empty()))
        .with_context(|| format!("Failed to open split {split}"))?;
    reader.open()?;
    let mut rows = 0u64;
    while let Some(batch) = reader.next_batch()? {
        rows += batch.num_rows() as u64;
    }
    reader.close();

    let expected = reader.selection().row_count();
    if rows != expected {
        anyhow::bail!("Split {split} produced {rows} rows, its stripes declare {expected}");
    }
    log::info!(
        "split {split}: {rows} rows in {} of {} stripes",
        reader.selection().stripes.len(),
        reader.selection().total_stripes
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use orcsplit_reader::SplitRange;

    use super::count_rows;
    use crate::commands::{open_format_file, write_test_file};

    #[test]
    fn test_count_rows() {
        let file = write_test_file(&[4, 7, 9]);
        let format_file =
            open_format_file(file.path().to_str().unwrap(), Default::default()).unwrap();
        let catalog = format_file.catalog().unwrap();
        let file_size = catalog.file_size();

        assert_eq!(
            count_rows(&format_file, SplitRange::whole_file(file_size)).unwrap(),
            20
        );
        let second = catalog.stripes()[1];
        assert_eq!(
            count_rows(&format_file, SplitRange::new(second.offset, second.length)).unwrap(),
            7
        );
        assert_eq!(count_rows(&format_file, SplitRange::new(0, 0)).unwrap(), 0);
    }

    #[test]
    fn test_run_with_small_batches() {
        let file = write_test_file(&[5, 5]);
        let options = orcsplit_reader::ReaderOptions::default().with_batch_size(2);
        super::run(file.path().to_str().unwrap().to_string(), 0, None, options).unwrap();
    }
}
